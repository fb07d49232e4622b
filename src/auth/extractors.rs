use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use crate::auth::{error::AuthError, repo_types::User, services::AuthService};

/// The authenticated caller, resolved from the `Authorization: Bearer` header and
/// handed to handlers as an argument.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                warn!("missing Authorization header");
                AuthError::Unauthenticated
            })?;

        let token = bearer_token(auth).ok_or_else(|| {
            warn!("invalid auth scheme");
            AuthError::Unauthenticated
        })?;

        let service = AuthService::from_ref(state);
        let user = service.authenticate(token).await?;
        Ok(AuthUser(user))
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}
