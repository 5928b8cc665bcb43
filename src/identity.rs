//! Bearer credential → user id.
//!
//! Tokens are HS256 JWTs whose `sub` claim is the user id. Signature and
//! expiry are always verified; there is no unverified mode. Anything that
//! does not verify is an [`AuthError`].

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims this service reads from an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub struct Identity {
    key: DecodingKey,
    validation: Validation,
}

impl Identity {
    /// Verify tokens signed with `secret`. When `audience` is set, the `aud`
    /// claim must match it.
    pub fn hs256(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Identity {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Resolve an `Authorization` header value to a user id.
    pub fn resolve(&self, authorization: Option<&str>) -> Result<String, AuthError> {
        let header = authorization.ok_or(AuthError::MissingCredential)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let user_id = data.claims.sub.trim();
        if user_id.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        Ok(user_id.to_string())
    }
}
