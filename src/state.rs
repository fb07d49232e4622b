use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::{
    jwt::JwtKeys,
    memory::{MemoryTokenStore, MemoryUserStore},
    repo::{PgTokenStore, PgUserStore, TokenStore, UserStore},
    services::AuthService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (users, tokens): (Arc<dyn UserStore>, Arc<dyn TokenStore>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    let db = PgPoolOptions::new()
                        .max_connections(config.max_connections)
                        .connect(url)
                        .await
                        .context("connect to database")?;
                    sqlx::migrate!("./migrations")
                        .run(&db)
                        .await
                        .context("run migrations")?;
                    info!("using postgres store");
                    (
                        Arc::new(PgUserStore::new(db.clone())),
                        Arc::new(PgTokenStore::new(db)),
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; users and tokens are kept in memory");
                    (
                        Arc::new(MemoryUserStore::default()),
                        Arc::new(MemoryTokenStore::default()),
                    )
                }
            };

        Ok(Self::from_parts(config, users, tokens))
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let auth = AuthService::new(
            users,
            tokens,
            JwtKeys::from(&config.jwt),
            config.token_name.clone(),
        );
        Self {
            config: Arc::new(config),
            auth,
        }
    }

    /// In-memory state with fixed test keys.
    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(
            Arc::new(MemoryUserStore::default()),
            Arc::new(MemoryTokenStore::default()),
        )
    }

    #[cfg(test)]
    pub fn fake_with(users: Arc<dyn UserStore>, tokens: Arc<dyn TokenStore>) -> Self {
        let config = AppConfig {
            database_url: None,
            max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: None,
            },
            token_name: "API_TOKEN".into(),
            host: "127.0.0.1".into(),
            port: 0,
        };
        Self::from_parts(config, users, tokens)
    }
}
