//! Auth gateway: decode → type check → blacklist → user
//! lookup → revocation-epoch check, in that order. Each stage can
//! short-circuit with an audited failure; nothing later is consulted once
//! an earlier stage rejects the token.

use std::future::Future;
use std::pin::Pin;

use aiq_core::User;
use chrono::{DateTime, Utc};

use crate::audit::SecurityAuditLogger;
use crate::blacklist::{FailOpenBlacklist, TokenBlacklist};
use crate::error::AuthError;
use crate::token::{Claims, TokenIssuer, TokenType};

/// Looks up a user by id. Kept as a narrow trait (rather than a dependency
/// on a concrete store) so this crate stays storage-agnostic.
pub trait UserLookup: Send + Sync {
    fn find_by_id<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>, AuthError>> + Send + 'a>>;
}

pub struct AuthGateway<'a, B: TokenBlacklist> {
    issuer: &'a TokenIssuer,
    blacklist: &'a FailOpenBlacklist<B>,
    audit: &'a SecurityAuditLogger,
}

impl<'a, B: TokenBlacklist> AuthGateway<'a, B> {
    pub fn new(
        issuer: &'a TokenIssuer,
        blacklist: &'a FailOpenBlacklist<B>,
        audit: &'a SecurityAuditLogger,
    ) -> Self {
        Self {
            issuer,
            blacklist,
            audit,
        }
    }

    /// Decodes and validates a token, returning the verified claims without
    /// performing a user lookup. Used where only the principal's identity
    /// is needed (e.g. rate-limit key derivation).
    pub async fn validate_token(
        &self,
        token: &str,
        expected_type: TokenType,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let claims = self.issuer.decode(token).ok_or_else(|| {
            self.audit
                .log_token_validation_failure("invalid_signature_or_format", ip, None);
            match expected_type {
                TokenType::Access => AuthError::InvalidToken,
                TokenType::Refresh => AuthError::InvalidRefreshToken,
            }
        })?;

        if !TokenIssuer::verify_type(&claims, expected_type) {
            self.audit.log_token_validation_failure(
                "invalid_token_type",
                ip,
                Some(&claims.jti),
            );
            return Err(AuthError::WrongTokenType {
                expected: match expected_type {
                    TokenType::Access => "access",
                    TokenType::Refresh => "refresh",
                },
            });
        }

        if self.blacklist.is_revoked(&claims.jti, now).await {
            tracing::warn!(jti = %&claims.jti[..8.min(claims.jti.len())], "attempt to use revoked token");
            self.audit
                .log_token_validation_failure("token_revoked", ip, Some(&claims.jti));
            return Err(AuthError::TokenRevoked);
        }

        Ok(claims)
    }

    /// Full gateway pass: validates the token, then enforces the
    /// user-level revocation epoch (logout-all) against a freshly looked
    /// up user record.
    pub async fn authenticate(
        &self,
        token: &str,
        expected_type: TokenType,
        ip: &str,
        users: &dyn UserLookup,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let claims = self.validate_token(token, expected_type, ip, now).await?;

        let user = users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token_iat = DateTime::from_timestamp(claims.iat, 0);
        if user.token_revoked_before.is_some() && token_iat.is_none() {
            self.audit.log_token_validation_failure(
                "missing_iat_with_revocation_epoch",
                ip,
                Some(&claims.jti),
            );
            return Err(AuthError::TokenRevoked);
        }
        if user.token_issued_before_revocation(token_iat) {
            tracing::warn!(user_id = user.id, "token issued before revocation epoch");
            self.audit.log_token_validation_failure(
                "token_revoked_by_logout_all",
                ip,
                Some(&claims.jti),
            );
            return Err(AuthError::TokenRevoked);
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::InMemoryBlacklist;
    use aiq_core::{Demographics, User};
    use std::sync::Mutex;

    struct StaticUsers(Mutex<Vec<User>>);

    impl UserLookup for StaticUsers {
        fn find_by_id<'a>(
            &'a self,
            user_id: i64,
        ) -> Pin<Box<dyn Future<Output = Result<Option<User>, AuthError>> + Send + 'a>> {
            let found = self.0.lock().unwrap().iter().find(|u| u.id == user_id).cloned();
            Box::pin(async move { Ok(found) })
        }
    }

    fn test_user(id: i64, revoked_before: Option<DateTime<Utc>>) -> User {
        User {
            id,
            email: "user@example.com".into(),
            password_hash: "hash".into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            demographics: Demographics::default(),
            token_revoked_before: revoked_before,
            push_token: None,
            push_enabled: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn accepts_valid_unrevoked_token() {
        let issuer = TokenIssuer::new("a-secret-key-long-enough-for-hmac".into(), 30, 7);
        let blacklist = FailOpenBlacklist::new(InMemoryBlacklist::new());
        let audit = SecurityAuditLogger::new();
        let gateway = AuthGateway::new(&issuer, &blacklist, &audit);
        let users = StaticUsers(Mutex::new(vec![test_user(1, None)]));

        let now = Utc::now();
        let issued = issuer.issue(1, "user@example.com", TokenType::Access, now).unwrap();
        let user = gateway
            .authenticate(&issued.token, TokenType::Access, "127.0.0.1", &users, now)
            .await
            .unwrap();
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn rejects_token_of_wrong_type() {
        let issuer = TokenIssuer::new("a-secret-key-long-enough-for-hmac".into(), 30, 7);
        let blacklist = FailOpenBlacklist::new(InMemoryBlacklist::new());
        let audit = SecurityAuditLogger::new();
        let gateway = AuthGateway::new(&issuer, &blacklist, &audit);
        let users = StaticUsers(Mutex::new(vec![test_user(1, None)]));

        let now = Utc::now();
        let issued = issuer.issue(1, "user@example.com", TokenType::Refresh, now).unwrap();
        let result = gateway
            .authenticate(&issued.token, TokenType::Access, "127.0.0.1", &users, now)
            .await;
        assert!(matches!(result, Err(AuthError::WrongTokenType { .. })));
    }

    #[tokio::test]
    async fn rejects_revoked_token() {
        let issuer = TokenIssuer::new("a-secret-key-long-enough-for-hmac".into(), 30, 7);
        let blacklist = FailOpenBlacklist::new(InMemoryBlacklist::new());
        let audit = SecurityAuditLogger::new();
        let gateway = AuthGateway::new(&issuer, &blacklist, &audit);
        let users = StaticUsers(Mutex::new(vec![test_user(1, None)]));

        let now = Utc::now();
        let issued = issuer.issue(1, "user@example.com", TokenType::Access, now).unwrap();
        let claims = issuer.decode(&issued.token).unwrap();
        blacklist.revoke(&claims.jti, issued.expires_at, now).await;

        let result = gateway
            .authenticate(&issued.token, TokenType::Access, "127.0.0.1", &users, now)
            .await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn rejects_token_issued_before_logout_all_epoch() {
        let issuer = TokenIssuer::new("a-secret-key-long-enough-for-hmac".into(), 30, 7);
        let blacklist = FailOpenBlacklist::new(InMemoryBlacklist::new());
        let audit = SecurityAuditLogger::new();
        let gateway = AuthGateway::new(&issuer, &blacklist, &audit);

        let now = Utc::now();
        let issued = issuer.issue(1, "user@example.com", TokenType::Access, now).unwrap();

        // logout-all happens strictly after token issuance
        let revoked_before = now + chrono::Duration::seconds(5);
        let users = StaticUsers(Mutex::new(vec![test_user(1, Some(revoked_before))]));

        let result = gateway
            .authenticate(&issued.token, TokenType::Access, "127.0.0.1", &users, now + chrono::Duration::seconds(10))
            .await;
        assert!(matches!(result, Err(AuthError::TokenRevoked)));
    }

    #[tokio::test]
    async fn accepts_token_issued_after_logout_all_epoch() {
        let issuer = TokenIssuer::new("a-secret-key-long-enough-for-hmac".into(), 30, 7);
        let blacklist = FailOpenBlacklist::new(InMemoryBlacklist::new());
        let audit = SecurityAuditLogger::new();
        let gateway = AuthGateway::new(&issuer, &blacklist, &audit);

        let revoked_before = Utc::now();
        let now = revoked_before + chrono::Duration::seconds(5);
        let issued = issuer.issue(1, "user@example.com", TokenType::Access, now).unwrap();
        let users = StaticUsers(Mutex::new(vec![test_user(1, Some(revoked_before))]));

        let user = gateway
            .authenticate(&issued.token, TokenType::Access, "127.0.0.1", &users, now)
            .await
            .unwrap();
        assert_eq!(user.id, 1);
    }

    #[tokio::test]
    async fn rejects_unknown_user() {
        let issuer = TokenIssuer::new("a-secret-key-long-enough-for-hmac".into(), 30, 7);
        let blacklist = FailOpenBlacklist::new(InMemoryBlacklist::new());
        let audit = SecurityAuditLogger::new();
        let gateway = AuthGateway::new(&issuer, &blacklist, &audit);
        let users = StaticUsers(Mutex::new(vec![]));

        let now = Utc::now();
        let issued = issuer.issue(1, "user@example.com", TokenType::Access, now).unwrap();
        let result = gateway
            .authenticate(&issued.token, TokenType::Access, "127.0.0.1", &users, now)
            .await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }
}
