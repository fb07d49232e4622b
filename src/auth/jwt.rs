use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{claims::Claims, repo_types::AuthToken},
    config::JwtConfig,
};

/// Signing and verification keys plus the claims policy applied to every token.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Option<Duration>,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg
                .ttl_minutes
                .map(|m| Duration::from_secs((m.max(0) as u64).saturating_mul(60))),
        }
    }
}

impl JwtKeys {
    /// Signs a bearer token for an already persisted token row.
    pub fn sign(&self, token: &AuthToken) -> anyhow::Result<String> {
        self.sign_at(token, OffsetDateTime::now_utc())
    }

    fn sign_at(&self, token: &AuthToken, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = match self.ttl {
            Some(ttl) => {
                let expires = i64::try_from(ttl.as_secs())
                    .ok()
                    .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
                    .ok_or_else(|| anyhow::anyhow!("token lifetime of {ttl:?} is out of range"))?;
                Some(expires.unix_timestamp() as usize)
            }
            None => None,
        };
        let claims = Claims {
            sub: token.user_id,
            jti: token.id,
            name: token.name.clone(),
            iat: now.unix_timestamp() as usize,
            exp,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let jwt = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %token.user_id, token_id = %token.id, "jwt signed");
        Ok(jwt)
    }

    /// Checks signature, issuer, audience and expiry. Revocation is checked by the caller.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        if self.ttl.is_some() {
            validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        } else {
            validation.set_required_spec_claims(&["sub", "iss", "aud"]);
        }
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, token_id = %data.claims.jti, "jwt verified");
        Ok(data.claims)
    }
}
