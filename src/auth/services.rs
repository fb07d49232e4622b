use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{ChangePasswordRequest, LoginRequest, RegisterRequest},
        error::AuthError,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{TokenStore, UserStore},
        repo_types::User,
        validation::FieldErrors,
    },
    state::AppState,
};

/// Register, login, logout, current-user and change-password over the user and token stores.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    jwt: JwtKeys,
    token_name: String,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email.map(|e| e.trim().to_lowercase())
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        jwt: JwtKeys,
        token_name: impl Into<String>,
    ) -> Self {
        Self {
            users,
            tokens,
            jwt,
            token_name: token_name.into(),
        }
    }

    /// Persists a token row for the user and signs the bearer string for it.
    async fn issue_token(&self, user: &User) -> anyhow::Result<String> {
        let row = self.tokens.create(user.id, &self.token_name).await?;
        self.jwt.sign(&row)
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<(User, String), AuthError> {
        let name = req.name.map(|n| n.trim().to_string());
        let email = normalize_email(req.email);

        let mut errors = FieldErrors::default();
        let name = errors.required("name", name.as_deref());
        let email = errors.required("email", email.as_deref());
        if errors.email("email", email) {
            if let Some(email) = email {
                if self.users.find_by_email(email).await?.is_some() {
                    errors.taken("email");
                }
            }
        }
        let password = errors.required("password", req.password.as_deref());

        if !errors.is_empty() {
            warn!(?errors, "register validation failed");
            return Err(AuthError::Validation(errors));
        }
        let (Some(name), Some(email), Some(password)) = (name, email, password) else {
            return Err(AuthError::Validation(errors));
        };

        let hash = hash_password(password)?;
        let user = self.users.create(name, email, &hash).await?;
        let token = self.issue_token(&user).await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok((user, token))
    }

    pub async fn login(&self, req: LoginRequest) -> Result<(User, String), AuthError> {
        let email = normalize_email(req.email);

        let mut errors = FieldErrors::default();
        let email = errors.required("email", email.as_deref());
        errors.email("email", email);
        let password = errors.required("password", req.password.as_deref());

        if !errors.is_empty() {
            warn!(?errors, "login validation failed");
            return Err(AuthError::Validation(errors));
        }
        let (Some(email), Some(password)) = (email, password) else {
            return Err(AuthError::Validation(errors));
        };

        let Some(user) = self.users.find_by_email(email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(&user).await?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok((user, token))
    }

    /// Resolves a bearer string to its user. The token must verify and still have its row.
    pub async fn authenticate(&self, bearer: &str) -> Result<User, AuthError> {
        let claims = self.jwt.verify(bearer).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AuthError::Unauthenticated
        })?;

        let row = match self.tokens.find(claims.jti).await? {
            Some(row) if row.user_id == claims.sub => row,
            _ => {
                warn!(token_id = %claims.jti, "token revoked or unknown");
                return Err(AuthError::Unauthenticated);
            }
        };

        let Some(user) = self.users.find_by_id(row.user_id).await? else {
            warn!(user_id = %row.user_id, "token owner no longer exists");
            return Err(AuthError::Unauthenticated);
        };

        self.tokens.touch(row.id).await?;
        Ok(user)
    }

    /// Revokes every token of the caller, not only the one used for this request.
    pub async fn logout(&self, user: &User) -> Result<u64, AuthError> {
        let revoked = self.tokens.revoke_all(user.id).await?;
        info!(user_id = %user.id, revoked, "user logged out");
        Ok(revoked)
    }

    pub fn current_user(&self, user: User) -> User {
        user
    }

    pub async fn change_password(
        &self,
        user: &User,
        req: ChangePasswordRequest,
    ) -> Result<(), AuthError> {
        let mut errors = FieldErrors::default();
        let password = errors.required("password", req.password.as_deref());
        errors.confirmed("password", password, req.password_confirmation.as_deref());

        if !errors.is_empty() {
            warn!(user_id = %user.id, ?errors, "change password validation failed");
            return Err(AuthError::PasswordValidation(errors));
        }
        let Some(password) = password else {
            return Err(AuthError::PasswordValidation(errors));
        };

        let hash = hash_password(password)?;
        self.users.update_password(user.id, &hash).await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }
}
