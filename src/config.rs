use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// `None` means tokens stay valid until revoked.
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub token_name: String,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "authapi".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "authapi-users".into()),
            ttl_minutes: lookup("JWT_TTL_MINUTES")
                .map(|v| parse_ttl_minutes(&v))
                .transpose()?,
        };

        Ok(Self {
            database_url,
            max_connections,
            jwt,
            token_name: lookup("TOKEN_NAME").unwrap_or_else(|| "API_TOKEN".into()),
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
        })
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

/// Longest accepted token lifetime: ten years.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

fn parse_ttl_minutes(v: &str) -> anyhow::Result<i64> {
    let minutes = v
        .parse::<i64>()
        .with_context(|| format!("JWT_TTL_MINUTES is not a number: {v}"))?;
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}");
    }
    Ok(minutes)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => v
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {v}")),
        None => Ok(default),
    }
}
