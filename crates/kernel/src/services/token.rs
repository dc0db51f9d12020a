//! Signed login tokens (HS256 JWT).

use anyhow::{Context, Result};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// JWT claims.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies login tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_secs: i64,
}

impl TokenService {
    /// `secret` must be at least 32 bytes; the config loader enforces this.
    pub fn new(secret: &[u8], lifetime_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            lifetime_secs: lifetime_days.saturating_mul(24 * 60 * 60),
        }
    }

    /// Sign a token for `user_id`.
    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.lifetime_secs),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("failed to encode token")
    }

    /// Verify signature and expiry, returning the user id.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .context("invalid token")?;
        data.claims
            .sub
            .parse()
            .context("token subject is not a user id")
    }
}
