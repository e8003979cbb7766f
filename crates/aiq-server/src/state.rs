//! Process-wide application state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use aiq_auth::{
    AuthError, FailOpenBlacklist, InMemoryBlacklist, RemoteBlacklist, SecurityAuditLogger,
    TokenBlacklist, TokenIssuer, UserLookup,
};
use aiq_core::User;
use aiq_ratelimit::strategy::StrategyState;
use aiq_ratelimit::{InMemoryStore, Policy, RateLimitError, RateLimitStore, RateLimiter, RemoteStore};
use aiq_store::{
    InMemoryItemBank, InMemoryResetTokenStore, InMemoryResponseLog, InMemorySessionStore,
    InMemoryUserDirectory, ItemBank, ReliabilityStore, ResponseLog, SessionStore, UserDirectory,
};
use chrono::{DateTime, Utc};

use crate::settings::{RateLimitStorageKind, RateLimitStrategyKind, Settings};

/// Enum-dispatch over the two `RateLimitStore` backends so `AppState` stays
/// a single concrete, `Clone` type (axum's `State<T>` requires `T: Clone`).
pub enum AnyRateLimitStore {
    Memory(InMemoryStore),
    Remote(RemoteStore),
}

impl RateLimitStore for AnyRateLimitStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StrategyState>, RateLimitError>> + Send + 'a>> {
        match self {
            AnyRateLimitStore::Memory(s) => s.get(key),
            AnyRateLimitStore::Remote(s) => s.get(key),
        }
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        state: StrategyState,
    ) -> Pin<Box<dyn Future<Output = Result<(), RateLimitError>> + Send + 'a>> {
        match self {
            AnyRateLimitStore::Memory(s) => s.set(key, state),
            AnyRateLimitStore::Remote(s) => s.set(key, state),
        }
    }
}

/// Enum-dispatch over the two `TokenBlacklist` backends, same reasoning as
/// `AnyRateLimitStore` above.
pub enum AnyBlacklist {
    Memory(InMemoryBlacklist),
    Remote(RemoteBlacklist),
}

impl TokenBlacklist for AnyBlacklist {
    fn revoke<'a>(
        &'a self,
        jti: &'a str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<(), aiq_auth::BlacklistError>> + Send + 'a>> {
        match self {
            AnyBlacklist::Memory(b) => b.revoke(jti, expires_at, now),
            AnyBlacklist::Remote(b) => b.revoke(jti, expires_at, now),
        }
    }

    fn is_revoked<'a>(
        &'a self,
        jti: &'a str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<bool, aiq_auth::BlacklistError>> + Send + 'a>> {
        match self {
            AnyBlacklist::Memory(b) => b.is_revoked(jti, now),
            AnyBlacklist::Remote(b) => b.is_revoked(jti, now),
        }
    }

    fn backend_name(&self) -> &str {
        match self {
            AnyBlacklist::Memory(b) => b.backend_name(),
            AnyBlacklist::Remote(b) => b.backend_name(),
        }
    }
}

/// Adapts the store crate's `UserDirectory` to the auth crate's narrower
/// `UserLookup`, translating storage failures into the one auth-side error
/// variant reserved for that purpose. Lives here rather than in `aiq-auth`
/// because `aiq-store` already depends on `aiq-auth` (for `ResetToken`,
/// `BlacklistError`, ...); the reverse dependency would cycle.
pub struct DirectoryUserLookup {
    directory: Arc<dyn UserDirectory>,
}

impl DirectoryUserLookup {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

impl UserLookup for DirectoryUserLookup {
    fn find_by_id<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>, AuthError>> + Send + 'a>> {
        Box::pin(async move {
            self.directory
                .find_by_id(user_id)
                .await
                .map_err(|err| AuthError::StoreUnavailable(err.to_string()))
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub item_bank: Arc<dyn ItemBank>,
    pub response_log: Arc<dyn ResponseLog>,
    pub session_store: Arc<dyn SessionStore>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub reliability_store: Arc<dyn ReliabilityStore>,
    pub reset_tokens: Arc<InMemoryResetTokenStore>,
    pub token_issuer: Arc<TokenIssuer>,
    pub blacklist: Arc<FailOpenBlacklist<AnyBlacklist>>,
    pub audit: Arc<SecurityAuditLogger>,
    pub rate_limiter: Arc<RateLimiter<AnyRateLimitStore>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let settings = Arc::new(settings);

        let rate_store = match settings.rate_limit_storage {
            RateLimitStorageKind::Memory => AnyRateLimitStore::Memory(InMemoryStore::new()),
            RateLimitStorageKind::Shared => {
                let url = settings
                    .rate_limit_shared_url
                    .clone()
                    .expect("RATE_LIMIT_SHARED_URL must be set when RATE_LIMIT_STORAGE=shared");
                AnyRateLimitStore::Remote(RemoteStore::new(url))
            }
        };
        let blacklist_backend = match settings.rate_limit_storage {
            RateLimitStorageKind::Memory => AnyBlacklist::Memory(InMemoryBlacklist::new()),
            RateLimitStorageKind::Shared => {
                let url = settings
                    .rate_limit_shared_url
                    .clone()
                    .expect("RATE_LIMIT_SHARED_URL must be set when RATE_LIMIT_STORAGE=shared");
                AnyBlacklist::Remote(RemoteBlacklist::new(url))
            }
        };

        let strategy = match settings.rate_limit_strategy {
            RateLimitStrategyKind::TokenBucket => aiq_ratelimit::Strategy::TokenBucket,
            RateLimitStrategyKind::SlidingWindow => aiq_ratelimit::Strategy::SlidingWindow,
            RateLimitStrategyKind::FixedWindow => aiq_ratelimit::Strategy::FixedWindow,
        };
        let default_policy = Policy {
            limit: settings.rate_limit_default_limit,
            window_seconds: settings.rate_limit_default_window.as_secs() as u32,
        };
        let rate_limiter = RateLimiter::new(
            rate_store,
            strategy,
            default_policy,
            settings.rate_limit_enabled,
        )
        .with_skip_list(["/v1/health"]);

        Self {
            item_bank: Arc::new(InMemoryItemBank::new(Vec::new())),
            response_log: Arc::new(InMemoryResponseLog::new()),
            session_store: Arc::new(InMemorySessionStore::new()),
            user_directory: Arc::new(InMemoryUserDirectory::new()),
            reliability_store: Arc::new(aiq_store::InMemoryReliabilityStore::new()),
            reset_tokens: Arc::new(InMemoryResetTokenStore::new()),
            token_issuer: Arc::new(TokenIssuer::new(
                settings.jwt_secret_key.clone(),
                settings.access_token_expire_minutes,
                settings.refresh_token_expire_days,
            )),
            blacklist: Arc::new(FailOpenBlacklist::new(blacklist_backend)),
            audit: Arc::new(SecurityAuditLogger::new()),
            rate_limiter: Arc::new(rate_limiter),
            settings,
        }
    }

    pub fn user_lookup(&self) -> DirectoryUserLookup {
        DirectoryUserLookup::new(self.user_directory.clone())
    }
}
