//! User directory: identity, credentials, and the
//! per-user revocation epoch used by logout-all.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use aiq_core::User;
use chrono::{DateTime, Utc};

use crate::error::StoreError;

pub trait UserDirectory: Send + Sync {
    fn find_by_id<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>, StoreError>> + Send + 'a>>;

    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>, StoreError>> + Send + 'a>>;

    fn create<'a>(
        &'a self,
        user: User,
    ) -> Pin<Box<dyn Future<Output = Result<User, StoreError>> + Send + 'a>>;

    /// Advances `token_revoked_before` to `now`; the only mutator besides
    /// credential change. Monotonic: never moves backward.
    fn advance_revocation<'a>(
        &'a self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn update_password_hash<'a>(
        &'a self,
        user_id: i64,
        password_hash: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    /// Every user that has ever logged out everywhere, for the admin
    /// forensic view correlating revocation with password resets.
    fn list_revoked<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<User>, StoreError>> + Send + 'a>>;
}

fn fold_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<i64, User>>,
    next_id: RwLock<i64>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_id<'a>(
        &'a self,
        id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>, StoreError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.users.read().unwrap().get(&id).cloned()) })
    }

    fn find_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<User>, StoreError>> + Send + 'a>> {
        let folded = fold_email(email);
        Box::pin(async move {
            Ok(self
                .users
                .read()
                .unwrap()
                .values()
                .find(|u| fold_email(&u.email) == folded)
                .cloned())
        })
    }

    fn create<'a>(
        &'a self,
        mut user: User,
    ) -> Pin<Box<dyn Future<Output = Result<User, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let folded = fold_email(&user.email);
            let mut users = self.users.write().unwrap();
            if users.values().any(|u| fold_email(&u.email) == folded) {
                return Err(StoreError::EmailExists(user.email));
            }
            let mut next_id = self.next_id.write().unwrap();
            *next_id += 1;
            user.id = *next_id;
            user.email = folded;
            users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    fn advance_revocation<'a>(
        &'a self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut users = self.users.write().unwrap();
            let user = users
                .get_mut(&user_id)
                .ok_or(StoreError::UserNotFound(user_id))?;
            if user.token_revoked_before.map(|prev| now > prev).unwrap_or(true) {
                user.token_revoked_before = Some(now);
            }
            Ok(())
        })
    }

    fn update_password_hash<'a>(
        &'a self,
        user_id: i64,
        password_hash: String,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut users = self.users.write().unwrap();
            let user = users
                .get_mut(&user_id)
                .ok_or(StoreError::UserNotFound(user_id))?;
            user.password_hash = password_hash;
            Ok(())
        })
    }

    fn list_revoked<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<User>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self
                .users
                .read()
                .unwrap()
                .values()
                .filter(|u| u.token_revoked_before.is_some())
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiq_core::Demographics;

    fn new_user(email: &str) -> User {
        User {
            id: 0,
            email: email.into(),
            password_hash: "hash".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            demographics: Demographics::default(),
            token_revoked_before: None,
            push_token: None,
            push_enabled: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_find_by_folded_email() {
        let dir = InMemoryUserDirectory::new();
        dir.create(new_user("Alice@Example.com")).await.unwrap();
        let found = dir.find_by_email("alice@example.com").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let dir = InMemoryUserDirectory::new();
        dir.create(new_user("alice@example.com")).await.unwrap();
        let result = dir.create(new_user("ALICE@EXAMPLE.COM")).await;
        assert!(matches!(result, Err(StoreError::EmailExists(_))));
    }

    #[tokio::test]
    async fn advance_revocation_sets_the_epoch() {
        let dir = InMemoryUserDirectory::new();
        let user = dir.create(new_user("alice@example.com")).await.unwrap();
        let now = Utc::now();
        dir.advance_revocation(user.id, now).await.unwrap();
        let reloaded = dir.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.token_revoked_before, Some(now));
    }

    #[tokio::test]
    async fn list_revoked_only_includes_users_with_an_epoch() {
        let dir = InMemoryUserDirectory::new();
        let untouched = dir.create(new_user("bob@example.com")).await.unwrap();
        let revoked = dir.create(new_user("alice@example.com")).await.unwrap();
        dir.advance_revocation(revoked.id, Utc::now()).await.unwrap();
        let listed = dir.list_revoked().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, revoked.id);
        assert_ne!(listed[0].id, untouched.id);
    }

    #[tokio::test]
    async fn advance_revocation_is_monotonic() {
        let dir = InMemoryUserDirectory::new();
        let user = dir.create(new_user("alice@example.com")).await.unwrap();
        let later = Utc::now();
        let earlier = later - chrono::Duration::minutes(5);
        dir.advance_revocation(user.id, later).await.unwrap();
        dir.advance_revocation(user.id, earlier).await.unwrap();
        let reloaded = dir.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.token_revoked_before, Some(later));
    }
}
