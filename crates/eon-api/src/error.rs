use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use eon_backend::BackendError;
use eon_client::{BoardError, SelectionError};
use eon_types::api::ErrorResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Answered with a redirect to the sign-in page.
    #[error("Sign in required")]
    SignInRequired,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::SignInRequired => return Redirect::to("/signin").into_response(),
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Backend(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::Validation(e) => ApiError::Validation(e.to_string()),
            BoardError::SignInRequired => ApiError::SignInRequired,
            e @ BoardError::NotAuthor(_) => ApiError::Forbidden(e.to_string()),
            e @ BoardError::UnknownItem(_) => ApiError::NotFound(e.to_string()),
            BoardError::Backend { message, .. } => ApiError::Backend(message),
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(err: SelectionError) -> Self {
        match err {
            e @ (SelectionError::UnknownSpark(_) | SelectionError::LimitReached { .. }) => {
                ApiError::Validation(e.to_string())
            }
            e @ SelectionError::Storage(_) => ApiError::Internal(e.to_string()),
            e @ SelectionError::Backend(_) => ApiError::Backend(e.to_string()),
        }
    }
}

/// Only sign-out lets a raw backend failure through.
impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
