// Handler error type and its conversion into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::backend::BackendError;

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    Unauthorized(String),
    // Page requests without a usable session are sent to the login page
    LoginRequired,
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Backend(BackendError),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<BackendError> for AppError {
    fn from(error: BackendError) -> Self {
        AppError::Backend(error)
    }
}

impl From<askama::Error> for AppError {
    fn from(error: askama::Error) -> Self {
        AppError::InternalServerError(anyhow::Error::new(error).context("Failed to render template"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized access attempt: {}", message);
                (StatusCode::UNAUTHORIZED, message)
            }
            AppError::LoginRequired => {
                tracing::info!("No active session, redirecting to login.");
                return Redirect::to("/login").into_response();
            }
            AppError::Forbidden(message) => {
                tracing::warn!("Forbidden: {}", message);
                (StatusCode::FORBIDDEN, message)
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                let status = match e.status() {
                    Some(StatusCode::UNAUTHORIZED) => StatusCode::UNAUTHORIZED,
                    Some(StatusCode::NOT_FOUND) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.user_message())
            }
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
