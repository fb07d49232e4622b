use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{AuthToken, User};

/// Persistence for user records. Email uniqueness is enforced by the backing store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create(&self, name: &str, email: &str, password_hash: &str) -> anyhow::Result<User>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
}

/// Persistence for issued bearer tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create(&self, user_id: Uuid, name: &str) -> anyhow::Result<AuthToken>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<AuthToken>>;
    async fn touch(&self, id: Uuid) -> anyhow::Result<()>;
    /// Deletes every token of the user, returning how many were removed.
    async fn revoke_all(&self, user_id: Uuid) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(&self, name: &str, email: &str, password_hash: &str) -> anyhow::Result<User> {
        // A concurrent registration with the same email loses here on the unique constraint.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await
        .context("update password")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("user {id} not found");
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn create(&self, user_id: Uuid, name: &str) -> anyhow::Result<AuthToken> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (id, user_id, name)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, name, created_at, last_used_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .context("insert auth token")?;
        Ok(token)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<AuthToken>> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT id, user_id, name, created_at, last_used_at
              FROM auth_tokens
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find auth token")?;
        Ok(token)
    }

    async fn touch(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE auth_tokens SET last_used_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("touch auth token")?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("revoke auth tokens")?;
        Ok(result.rows_affected())
    }
}
