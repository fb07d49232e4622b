use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,    // user ID
    pub jti: Uuid,    // auth_tokens row; gone once revoked
    pub name: String, // token label, e.g. "API_TOKEN"
    pub iat: usize,   // issued at (unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>, // expires at, absent when tokens live until revoked
    pub iss: String,
    pub aud: String,
}
