//! Verification of access tokens minted by the account service.
//!
//! Only the caller id is read. Current tokens carry it in `sub`; tokens from
//! older account-service releases carry it as `userId`, and both are accepted.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mockup_core::types::DbId;
use mockup_pipeline::config::env_parse;
use serde::{Deserialize, Serialize};

/// Shortest accepted HMAC secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const DEFAULT_LEEWAY_SECS: u64 = 60;

/// The claims this service reads. Anything else in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "userId")]
    pub sub: DbId,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the account service.
    pub secret: String,
    /// Clock skew tolerated when checking `exp` (default: `60`).
    pub leeway_secs: u64,
}

impl JwtConfig {
    /// | Env Var           | Default                      |
    /// |-------------------|------------------------------|
    /// | `JWT_SECRET`      | required, at least 32 bytes  |
    /// | `JWT_LEEWAY_SECS` | `60`                         |
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        assert!(
            secret.len() >= MIN_SECRET_LEN,
            "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"
        );
        Self {
            secret,
            leeway_secs: env_parse("JWT_LEEWAY_SECS", DEFAULT_LEEWAY_SECS),
        }
    }
}

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// HS256 verifier. The key and validation rules are built once at startup.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// The caller id carried by `token`.
    pub fn verify(&self, token: &str) -> Result<DbId, TokenError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}
