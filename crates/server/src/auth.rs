use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::OwnerId;

pub const SESSION_ISSUER: &str = "flashdeck";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    exp: i64,
    iat: i64,
}

pub fn mint_session_token(
    cfg: &SessionConfig,
    user_id: &OwnerId,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        iss: SESSION_ISSUER.to_string(),
        sub: user_id.as_str().to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

/// Returns the identity carried by a valid, unexpired token.
pub fn verify_session_token(cfg: &SessionConfig, token: &str) -> Option<OwnerId> {
    let mut validation = Validation::default();
    validation.set_issuer(&[SESSION_ISSUER]);
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .ok()?;
    Some(OwnerId(decoded.claims.sub))
}

/// Resolves the caller from an `Authorization: Bearer` header. A missing or
/// invalid token means an anonymous caller.
pub fn caller_from_headers(cfg: &SessionConfig, headers: &HeaderMap) -> Option<OwnerId> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    verify_session_token(cfg, token)
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
