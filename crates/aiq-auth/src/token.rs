//! Bearer token issuance and decoding.
//!
//! Tokens carry `{user_id, type, jti, iat, exp, email}`, signed HS256. Every
//! issuance mints a fresh `jti` so a single token can be revoked individually
//! via the blacklist without affecting its sibling.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens under one HMAC secret loaded from the
/// environment at startup (no hardcoded default).
pub struct TokenIssuer {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: String, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Self {
        Self {
            secret,
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    fn ttl_for(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Issues a new signed token of the given type, with a fresh `jti`.
    pub fn issue(
        &self,
        user_id: i64,
        email: &str,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let jti = Uuid::new_v4().to_string();
        let expires_at = now + self.ttl_for(token_type);
        let claims = Claims {
            user_id,
            token_type,
            jti: jti.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            email: email.to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::HashError(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            issued_at: now,
            expires_at,
        })
    }

    /// Issues a fresh access/refresh pair for a login or registration.
    pub fn issue_pair(
        &self,
        user_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<(IssuedToken, IssuedToken), AuthError> {
        let access = self.issue(user_id, email, TokenType::Access, now)?;
        let refresh = self.issue(user_id, email, TokenType::Refresh, now)?;
        Ok((access, refresh))
    }

    /// Decodes and signature-verifies a token without checking its type.
    /// Returns `None` on any decode failure (bad signature, malformed,
    /// expired) -- a caller never needs to distinguish these.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|data| data.claims)
    }

    pub fn verify_type(claims: &Claims, expected: TokenType) -> bool {
        claims.token_type == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret-key-at-least-32-bytes-long".into(), 30, 7)
    }

    #[test]
    fn issues_and_decodes_roundtrip() {
        let issuer = issuer();
        let now = Utc::now();
        let issued = issuer
            .issue(42, "user@example.com", TokenType::Access, now)
            .unwrap();
        let claims = issuer.decode(&issued.token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn each_issuance_gets_a_fresh_jti() {
        let issuer = issuer();
        let now = Utc::now();
        let a = issuer.issue(1, "a@example.com", TokenType::Access, now).unwrap();
        let b = issuer.issue(1, "a@example.com", TokenType::Access, now).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn rejects_token_signed_with_wrong_secret() {
        let issuer_a = TokenIssuer::new("secret-a-is-long-enough-for-hmac".into(), 30, 7);
        let issuer_b = TokenIssuer::new("secret-b-is-long-enough-for-hmac".into(), 30, 7);
        let issued = issuer_a
            .issue(1, "a@example.com", TokenType::Access, Utc::now())
            .unwrap();
        assert!(issuer_b.decode(&issued.token).is_none());
    }

    #[test]
    fn rejects_expired_token() {
        let issuer = issuer();
        let past = Utc::now() - Duration::days(365);
        let issued = issuer
            .issue(1, "a@example.com", TokenType::Access, past)
            .unwrap();
        assert!(issuer.decode(&issued.token).is_none());
    }

    #[test]
    fn verify_type_distinguishes_access_and_refresh() {
        let issuer = issuer();
        let (access, refresh) = issuer
            .issue_pair(1, "a@example.com", Utc::now())
            .unwrap();
        let access_claims = issuer.decode(&access.token).unwrap();
        let refresh_claims = issuer.decode(&refresh.token).unwrap();
        assert!(TokenIssuer::verify_type(&access_claims, TokenType::Access));
        assert!(!TokenIssuer::verify_type(&access_claims, TokenType::Refresh));
        assert!(TokenIssuer::verify_type(&refresh_claims, TokenType::Refresh));
    }

    #[test]
    fn access_and_refresh_have_different_lifetimes() {
        let issuer = issuer();
        let now = Utc::now();
        let (access, refresh) = issuer.issue_pair(1, "a@example.com", now).unwrap();
        assert!(refresh.expires_at > access.expires_at);
    }
}
