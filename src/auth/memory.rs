//! In-process stores used when no `DATABASE_URL` is configured, and by the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{TokenStore, UserStore},
    repo_types::{AuthToken, User},
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, name: &str, email: &str, password_hash: &str) -> anyhow::Result<User> {
        // Check and insert under one write lock, like a unique index would.
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            anyhow::bail!("duplicate key value violates unique constraint \"users_email_key\"");
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("user {id} not found"))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}

#[cfg(test)]
impl MemoryUserStore {
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

/// Lets a duplicate slip past the uniqueness pre-check, the way a concurrent
/// registration landing between lookup and insert would. Inserts still enforce it.
#[cfg(test)]
#[derive(Default)]
pub struct BlindLookupUserStore(pub MemoryUserStore);

#[cfg(test)]
#[async_trait]
impl UserStore for BlindLookupUserStore {
    async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
        Ok(None)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.0.find_by_id(id).await
    }

    async fn create(&self, name: &str, email: &str, password_hash: &str) -> anyhow::Result<User> {
        self.0.create(name, email, password_hash).await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        self.0.update_password(id, password_hash).await
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<Uuid, AuthToken>>,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn create(&self, user_id: Uuid, name: &str) -> anyhow::Result<AuthToken> {
        let token = AuthToken {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
            last_used_at: None,
        };
        self.tokens.write().await.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<AuthToken>> {
        Ok(self.tokens.read().await.get(&id).cloned())
    }

    async fn touch(&self, id: Uuid) -> anyhow::Result<()> {
        if let Some(token) = self.tokens.write().await.get_mut(&id) {
            token.last_used_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
impl MemoryTokenStore {
    pub async fn count(&self) -> usize {
        self.tokens.read().await.len()
    }
}
