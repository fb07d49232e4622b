use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::auth::{
    dto::{ErrorResponse, STATUS_NOT_OK},
    validation::FieldErrors,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Register/login input rejected before any state change.
    #[error("Validation error")]
    Validation(FieldErrors),

    /// Unknown email and wrong password share this variant so they cannot be told apart.
    #[error("Email & Password does not match with our record.")]
    InvalidCredentials,

    #[error("Unauthenticated.")]
    Unauthenticated,

    /// Change-password input rejected; reported with the generic validation status.
    #[error("Validation error")]
    PasswordValidation(FieldErrors),

    #[error("{0}")]
    Unexpected(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::InvalidCredentials | AuthError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::PasswordValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (message, errors) = match self {
            AuthError::Validation(errors) | AuthError::PasswordValidation(errors) => {
                ("Validation error".to_string(), Some(errors))
            }
            AuthError::Unexpected(e) => {
                let message = format!("{e:#}");
                error!(error = %message, "unexpected failure");
                (message, None)
            }
            other => (other.to_string(), None),
        };

        (
            status,
            Json(ErrorResponse {
                status: STATUS_NOT_OK,
                message,
                errors,
            }),
        )
            .into_response()
    }
}
