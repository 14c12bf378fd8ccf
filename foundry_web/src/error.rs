use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use alerts::AlertError;
use catalog::CatalogError;
use executor::ExecutorError;
use serde_json::json;
use thiserror::Error;

/// Error returned by every handler; rendered as `{ "error": message }`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        if self.status.is_server_error() {
            log::error!("request failed: {}", self.message);
        }
        HttpResponse::build(self.status).json(json!({ "error": self.message }))
    }
}

fn catalog_status(err: &CatalogError) -> StatusCode {
    match err {
        CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
        CatalogError::Duplicate { .. } => StatusCode::CONFLICT,
        CatalogError::InvalidSpec { .. }
        | CatalogError::SerdeJson { .. }
        | CatalogError::SerdeYaml { .. } => StatusCode::BAD_REQUEST,
        CatalogError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self::new(catalog_status(&err), err.message())
    }
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        match &err {
            ExecutorError::JobNotFound { .. } | ExecutorError::RunNotFound { .. } => {
                Self::not_found(err.message())
            }
            ExecutorError::NoSources { .. } | ExecutorError::InvalidTransition { .. } => {
                Self::bad_request(err.message())
            }
            ExecutorError::Catalog { source, .. } => {
                Self::new(catalog_status(source), source.message())
            }
            ExecutorError::Store { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.message())
            }
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        match &err {
            AlertError::NotFound { .. } => Self::not_found(err.message()),
            AlertError::Io { .. } => Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.message()),
        }
    }
}
