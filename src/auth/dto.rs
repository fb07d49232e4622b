use serde::{Deserialize, Serialize};

use crate::auth::{repo_types::User, validation::FieldErrors};

pub const STATUS_OK: &str = "OK";
pub const STATUS_NOT_OK: &str = "NOTOK";
pub const STATUS_SUCCESS: &str = "Success";

/// Request body for user registration. Fields are optional so that absent ones
/// surface as validation messages instead of deserialisation failures.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for changing the caller's password.
#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(alias = "new_password")]
    pub password: Option<String>,
    #[serde(alias = "new_password_confirmation")]
    pub password_confirmation: Option<String>,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub status: &'static str,
    pub message: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub status: &'static str,
    pub message: String,
    pub user: User,
}

/// Failure envelope; `errors` is present only for validation failures.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}
