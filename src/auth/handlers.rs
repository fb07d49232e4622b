use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            ChangePasswordRequest, LoginRequest, MessageResponse, RegisterRequest, TokenResponse,
            UserResponse, STATUS_OK, STATUS_SUCCESS,
        },
        error::AuthError,
        extractors::AuthUser,
        services::AuthService,
    },
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/change-password", post(change_password))
}

/// An unreadable body is treated as an empty form so every field reports as missing.
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable request body");
            T::default()
        }
    }
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
    let (_, token) = auth.register(body_or_default(payload)).await?;
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            status: STATUS_OK,
            message: "User Created Successfully".into(),
            token,
        }),
    ))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AuthError> {
    let (_, token) = auth.login(body_or_default(payload)).await?;
    Ok(Json(TokenResponse {
        status: STATUS_OK,
        message: "User Logged In Successfully".into(),
        token,
    }))
}

#[instrument(skip_all)]
pub async fn logout(
    State(auth): State<AuthService>,
    AuthUser(user): AuthUser,
) -> Result<Json<MessageResponse>, AuthError> {
    auth.logout(&user).await?;
    Ok(Json(MessageResponse {
        status: STATUS_SUCCESS,
        message: "User Logged Out Successfully".into(),
    }))
}

#[instrument(skip_all)]
pub async fn me(State(auth): State<AuthService>, AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(UserResponse {
        status: STATUS_SUCCESS,
        message: "User Profile".into(),
        user: auth.current_user(user),
    })
}

#[instrument(skip_all)]
pub async fn change_password(
    State(auth): State<AuthService>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthError> {
    auth.change_password(&user, body_or_default(payload)).await?;
    Ok(Json(MessageResponse {
        status: STATUS_SUCCESS,
        message: "Password Changed Successfully".into(),
    }))
}
