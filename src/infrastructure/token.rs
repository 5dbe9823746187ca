use crate::domain::ports::TokenIssuer;
use crate::domain::{Principal, Role, UserId};
use crate::error::{Error, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: UserId,
    role: Role,
    iat: i64,
    exp: i64,
}

/// HS256 JSON Web Token issuer.
pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, user_id: UserId, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Internal(format!("failed to sign token: {e}")))
    }

    fn verify(&self, token: &str) -> Result<Principal> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| Error::InvalidToken(e.to_string()))?;
        Ok(Principal {
            user_id: data.claims.user_id,
            role: data.claims.role,
        })
    }
}
