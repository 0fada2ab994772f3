//! Outcome type returned by handlers and the handler trait itself.

use crate::error::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Expected failures travel inside the [`ValidatedResult`]; `Err` is reserved for
/// infrastructure problems (missing services, storage failures).
pub type HandlerResult<T> = Result<ValidatedResult<T>, AppError>;

/// Success or failure of a handler call, with the reason for failure.
///
/// Validation messages are grouped by field name; an empty key is used for messages that do
/// not belong to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedResult<T> {
    is_successful: bool,
    result: Option<T>,
    messages: BTreeMap<String, Vec<String>>,
    is_not_found: bool,
    is_not_authorized: bool,
}

impl<T> Default for ValidatedResult<T> {
    fn default() -> Self {
        ValidatedResult::success()
    }
}

impl<T> ValidatedResult<T> {
    /// Successful with a payload.
    pub fn ok(result: T) -> Self {
        ValidatedResult {
            result: Some(result),
            ..Self::success()
        }
    }

    /// Successful without a payload.
    pub fn success() -> Self {
        ValidatedResult {
            is_successful: true,
            result: None,
            messages: BTreeMap::new(),
            is_not_found: false,
            is_not_authorized: false,
        }
    }

    /// Unsuccessful with no reason attached.
    pub fn failed() -> Self {
        ValidatedResult {
            is_successful: false,
            ..Self::success()
        }
    }

    pub fn not_found() -> Self {
        ValidatedResult {
            is_not_found: true,
            ..Self::failed()
        }
    }

    pub fn not_authorized() -> Self {
        ValidatedResult {
            is_not_authorized: true,
            ..Self::failed()
        }
    }

    /// Unsuccessful with one validation message.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failed().with_message(field, message)
    }

    /// Add a validation message; marks the result unsuccessful.
    pub fn with_message(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_message(field, message);
        self
    }

    pub fn add_message(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.is_successful = false;
        self.messages.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_successful(&self) -> bool {
        self.is_successful
    }

    pub fn is_not_found(&self) -> bool {
        self.is_not_found
    }

    pub fn is_not_authorized(&self) -> bool {
        self.is_not_authorized
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }

    pub fn messages(&self) -> &BTreeMap<String, Vec<String>> {
        &self.messages
    }

    /// Transform the payload, keeping the outcome flags and messages.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ValidatedResult<U> {
        ValidatedResult {
            is_successful: self.is_successful,
            result: self.result.map(f),
            messages: self.messages,
            is_not_found: self.is_not_found,
            is_not_authorized: self.is_not_authorized,
        }
    }
}

/// Executes one request shape and reports a validated outcome.
///
/// Routes depend on `dyn ValidatedHandler<Req, Res>`; the wiring pass registers a generic
/// implementation for every such dependency it recognises.
#[async_trait]
pub trait ValidatedHandler<Req, Res>: Send + Sync
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    async fn handle(&self, request: Req) -> HandlerResult<Res>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_make_result_unsuccessful() {
        let result = ValidatedResult::<i32>::ok(1).with_message("name", "required");
        assert!(!result.is_successful());
        assert_eq!(result.messages()["name"], vec!["required".to_string()]);
    }

    #[test]
    fn messages_group_by_field() {
        let mut result = ValidatedResult::<()>::invalid("name", "required");
        result.add_message("name", "too short");
        result.add_message("", "general");
        assert_eq!(result.messages().len(), 2);
        assert_eq!(result.messages()["name"].len(), 2);
    }

    #[test]
    fn map_keeps_flags() {
        let result = ValidatedResult::<i32>::not_found().map(|n| n.to_string());
        assert!(result.is_not_found());
        assert!(result.result().is_none());

        let result = ValidatedResult::ok(2).map(|n| n * 10);
        assert_eq!(result.into_result(), Some(20));
    }
}
