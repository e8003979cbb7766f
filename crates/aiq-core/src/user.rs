use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    Primary,
    Secondary,
    Undergraduate,
    Graduate,
    Postgraduate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub birth_year: Option<i32>,
    pub education_level: Option<EducationLevel>,
    pub country: Option<String>,
    pub region: Option<String>,
}

/// Identity and credential record. `token_revoked_before` implements the
/// logout-all revocation epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Case-folded, unique.
    pub email: String,
    /// Argon2 password hash; never serialized back out over the wire (the
    /// server DTOs carry a separate, hash-free view).
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub demographics: Demographics,
    pub token_revoked_before: Option<DateTime<Utc>>,
    pub push_token: Option<String>,
    pub push_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A token issued strictly before the revocation epoch is invalid. Per
    /// F, a token missing `iat` while an epoch is set is rejected
    /// defensively -- modeled by the caller treating `iat: None` as `-inf`.
    pub fn token_issued_before_revocation(&self, issued_at: Option<DateTime<Utc>>) -> bool {
        match (self.token_revoked_before, issued_at) {
            (Some(_), None) => true,
            (Some(revoked_before), Some(iat)) => iat < revoked_before,
            (None, _) => false,
        }
    }
}
