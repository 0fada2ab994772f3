//! Turning a [`ValidatedResult`] into an HTTP response.
//!
//! | outcome                               | status |
//! |---------------------------------------|--------|
//! | success, payload                      | 200    |
//! | success, no payload                   | 204    |
//! | not authorized                        | 403    |
//! | not found                             | 404    |
//! | validation messages                   | 400    |
//! | unsuccessful without a reason         | 204    |

use crate::file::FileResponse;
use crate::validated::ValidatedResult;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

const PROBLEM_JSON: &str = "application/problem+json";
const OCTET_STREAM: &str = "application/octet-stream";

/// Which rule produced a response; attached to the response extensions for the group filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultOutcome {
    Payload,
    NoContent,
    NotAuthorized,
    NotFound,
    Invalid,
    Unspecified,
}

/// Status code for an outcome, ignoring whether a payload is present.
pub fn status_code<T>(result: &ValidatedResult<T>) -> StatusCode {
    if result.is_not_authorized() {
        StatusCode::FORBIDDEN
    } else if result.is_not_found() {
        StatusCode::NOT_FOUND
    } else if !result.messages().is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::NO_CONTENT
    }
}

/// Body of a 400 response.
#[derive(Debug, Serialize)]
pub struct ValidationProblem<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub errors: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> ValidationProblem<'a> {
    pub fn new(status: StatusCode, errors: &'a BTreeMap<String, Vec<String>>) -> Self {
        ValidationProblem {
            kind: "https://tools.ietf.org/html/rfc9110#section-15.5.1",
            title: "One or more validation errors occurred.",
            status: status.as_u16(),
            errors,
        }
    }
}

/// Payloads a successful result can carry.
pub trait ResultPayload {
    fn into_payload_response(self) -> Response;
}

impl<T: Serialize> ResultPayload for T {
    fn into_payload_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl ResultPayload for FileResponse {
    fn into_payload_response(self) -> Response {
        let content_type = self.content_type.as_deref().unwrap_or(OCTET_STREAM);
        let mut response = Response::new(Body::from(self.content));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap_or(HeaderValue::from_static(OCTET_STREAM)),
        );
        if let Some(name) = self.filename.as_deref() {
            match HeaderValue::from_str(&content_disposition(name)) {
                Ok(value) => {
                    headers.insert(header::CONTENT_DISPOSITION, value);
                }
                Err(err) => tracing::warn!(filename = %name, error = %err, "content disposition dropped"),
            }
        }
        response
    }
}

/// `attachment` disposition with a quoted ASCII `filename`. Names that do not survive as
/// ASCII also get an RFC 6266 `filename*` carrying the UTF-8 name percent-encoded.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() || c.is_ascii_control() => '_',
            c => c,
        })
        .collect();
    if fallback == filename {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

/// Render the outcome of a handler call.
pub fn to_http_result<T: ResultPayload>(result: ValidatedResult<T>) -> Response {
    let status = status_code(&result);
    let (outcome, mut response) = if result.is_successful() {
        match result.into_result() {
            Some(payload) => (ResultOutcome::Payload, payload.into_payload_response()),
            None => (ResultOutcome::NoContent, status.into_response()),
        }
    } else {
        match status {
            StatusCode::FORBIDDEN => (ResultOutcome::NotAuthorized, status.into_response()),
            StatusCode::NOT_FOUND => (ResultOutcome::NotFound, status.into_response()),
            StatusCode::BAD_REQUEST => {
                let problem = ValidationProblem::new(status, result.messages());
                let mut response = (status, Json(problem)).into_response();
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
                (ResultOutcome::Invalid, response)
            }
            _ => (ResultOutcome::Unspecified, status.into_response()),
        }
    };
    response.extensions_mut().insert(outcome);
    response
}

impl<T: ResultPayload> IntoResponse for ValidatedResult<T> {
    fn into_response(self) -> Response {
        to_http_result(self)
    }
}

/// Response filter attached once per filtered route group (`axum::middleware::map_response`).
/// Guarantees 204 responses carry no body and logs the outcome.
pub async fn validated_result_filter(response: Response) -> Response {
    let status = response.status();
    match response.extensions().get::<ResultOutcome>() {
        Some(ResultOutcome::Unspecified) => {
            tracing::warn!(status = %status, "unsuccessful result without reason, returning no content")
        }
        Some(outcome) => tracing::debug!(?outcome, status = %status, "validated result"),
        None => {}
    }
    if status == StatusCode::NO_CONTENT {
        let (parts, _) = response.into_parts();
        return Response::from_parts(parts, Body::empty());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_with_payload_is_200() {
        let response = ValidatedResult::ok(vec![1, 2]).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([1, 2]));
    }

    #[test]
    fn success_without_payload_is_204() {
        let response = ValidatedResult::<String>::success().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.extensions().get::<ResultOutcome>(), Some(&ResultOutcome::NoContent));
    }

    #[test]
    fn flags_take_precedence_over_messages() {
        let forbidden = ValidatedResult::<String>::not_authorized().with_message("x", "y");
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);

        let missing = ValidatedResult::<String>::not_found().with_message("x", "y");
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn messages_become_validation_problem() {
        let response = ValidatedResult::<String>::invalid("name", "required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], PROBLEM_JSON);
        let body = body_json(response).await;
        assert_eq!(body["status"], 400);
        assert_eq!(body["errors"]["name"][0], "required");
    }

    #[test]
    fn unsuccessful_without_reason_falls_back_to_204() {
        let response = ValidatedResult::<String>::failed().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.extensions().get::<ResultOutcome>(), Some(&ResultOutcome::Unspecified));
    }

    #[tokio::test]
    async fn file_payload_is_attachment() {
        let file = FileResponse::new(b"a,b".to_vec(), Some("q1:report.csv"), Some("text/csv"));
        let response = ValidatedResult::ok(file).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"q1_report.csv\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"a,b");
    }

    #[test]
    fn non_ascii_filename_keeps_an_encoded_disposition() {
        let response = ValidatedResult::ok(FileResponse::new(b"%PDF".to_vec(), Some("résumé.pdf"), None)).into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], OCTET_STREAM);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }

    #[test]
    fn disposition_escapes_quotes_in_unsanitised_names() {
        assert_eq!(content_disposition("a\"b.txt"), "attachment; filename=\"a_b.txt\"; filename*=UTF-8''a%22b.txt");
        assert_eq!(content_disposition("plain.txt"), "attachment; filename=\"plain.txt\"");
    }

    #[tokio::test]
    async fn filter_strips_no_content_body() {
        let response = (StatusCode::NO_CONTENT, "leftover").into_response();
        let filtered = validated_result_filter(response).await;
        let bytes = to_bytes(filtered.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
