//! Bearer-token authentication.
//!
//! Access tokens are HS256 JWTs whose `sub` claim is the user's UUID.

use crate::errors::{UploadError, UploadResult};
use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use uuid::Uuid;

pub const TOKEN_ISSUER: &str = "media-uploads";

/// The only claim the service reads. `exp` and `iss` are checked by
/// `jsonwebtoken` against the raw token.
#[derive(Debug, Deserialize)]
struct Subject {
    sub: String,
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn extract_bearer_token(headers: &HeaderMap) -> UploadResult<&str> {
    let invalid = |reason: &str| UploadError::MissingOrInvalidCredential(reason.into());
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| invalid("missing authorization header"))?
        .to_str()
        .map_err(|_| invalid("malformed authorization header"))?;

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(invalid("authorization header is not a bearer token")),
    }
}

#[derive(Clone)]
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Extract and validate the bearer token of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> UploadResult<Uuid> {
        self.validate(extract_bearer_token(headers)?)
    }

    /// Check signature, issuer and expiry; return the actor id.
    pub fn validate(&self, token: &str) -> UploadResult<Uuid> {
        let data = decode::<Subject>(token, &self.key, &self.validation)
            .map_err(|e| UploadError::MissingOrInvalidCredential(e.to_string()))?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| {
            UploadError::MissingOrInvalidCredential("subject is not a user id".into())
        })
    }
}

/// Mint a token the way the account service does. Test-only.
#[cfg(test)]
pub(crate) fn issue_token(secret: &str, user_id: Uuid, ttl: chrono::Duration) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    #[derive(serde::Serialize)]
    struct Claims {
        iss: &'static str,
        sub: String,
        iat: i64,
        exp: i64,
    }

    let now = chrono::Utc::now();
    let claims = Claims {
        iss: TOKEN_ISSUER,
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
