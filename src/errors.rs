use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use crate::sync::SyncError;

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    Unauthorized,
    BadRequest(String),
    SyncInProgress(String),
    Internal(String),
    NotFound,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Unauthorized => write!(f, "Unauthorized"),
            AppError::BadRequest(e) => write!(f, "Bad request: {e}"),
            AppError::SyncInProgress(e) => write!(f, "{e}"),
            AppError::Internal(e) => write!(f, "Internal error: {e}"),
            AppError::NotFound => write!(f, "Not found"),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::SyncInProgress(_) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Db(_) | AppError::Internal(_) => {
                log::error!("{self}");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Db(e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::AlreadyRunning { .. } => AppError::SyncInProgress(e.to_string()),
            SyncError::Store(e) => AppError::Db(e),
        }
    }
}
