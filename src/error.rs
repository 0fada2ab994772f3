//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup configuration mistakes: duplicate registrations, missing collaborators.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("entity already registered: {0}")]
    DuplicateEntity(&'static str),
    #[error("domain type {domain} is already mapped to entity {entity}")]
    DuplicateDomainMapping {
        domain: &'static str,
        entity: &'static str,
    },
    #[error("required service not registered: {0}")]
    MissingService(&'static str),
    #[error("invalid option {name}: {message}")]
    InvalidOption { name: &'static str, message: String },
}

/// Container resolution failures.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("service not registered: {0}")]
    NotFound(&'static str),
    #[error("type mismatch in container for {0}")]
    TypeMismatch(&'static str),
    #[error("no type mapping from {from} to {to}")]
    MissingMapping { from: &'static str, to: &'static str },
}

/// Failures reported by an entity store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key type {actual} does not match entity key {expected}")]
    KeyMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("value of type {actual} passed where {expected} was expected")]
    ValueMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Service(_) => (StatusCode::INTERNAL_SERVER_ERROR, "service_error"),
            AppError::Store(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
