//! Shared, out-of-process [`TokenBlacklist`] backend, so a token revoked on
//! one worker is honored by every other worker.
//!
//! Same trait-with-backends split as the in-process blacklist, talking to a
//! small HTTP cache sidecar keyed by `jti`.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blacklist::{BlacklistError, TokenBlacklist};

#[derive(Debug, Serialize, Deserialize)]
struct RevokeBody {
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct RevokedEntry {
    expires_at: DateTime<Utc>,
}

/// Talks to a shared key/value cache over HTTP: `PUT {base_url}/{jti}`
/// with an expiry, `GET {base_url}/{jti}` returning 404 when absent.
pub struct RemoteBlacklist {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteBlacklist {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(StdDuration::from_millis(250))
                .build()
                .expect("reqwest client builds with static config"),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, jti: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), jti)
    }
}

impl TokenBlacklist for RemoteBlacklist {
    fn revoke<'a>(
        &'a self,
        jti: &'a str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BlacklistError>> + Send + 'a>> {
        Box::pin(async move {
            if expires_at <= now {
                return Ok(());
            }
            let resp = self
                .client
                .put(self.url_for(jti))
                .json(&RevokeBody { expires_at })
                .send()
                .await
                .map_err(|e| BlacklistError::Unavailable(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(BlacklistError::Unavailable(format!(
                    "shared cache returned {}",
                    resp.status()
                )));
            }
            Ok(())
        })
    }

    fn is_revoked<'a>(
        &'a self,
        jti: &'a str,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<bool, BlacklistError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.url_for(jti))
                .send()
                .await
                .map_err(|e| BlacklistError::Unavailable(e.to_string()))?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(false);
            }
            if !resp.status().is_success() {
                return Err(BlacklistError::Unavailable(format!(
                    "shared cache returned {}",
                    resp.status()
                )));
            }
            let entry = resp
                .json::<RevokedEntry>()
                .await
                .map_err(|e| BlacklistError::Unavailable(e.to_string()))?;
            Ok(entry.expires_at > now)
        })
    }

    fn backend_name(&self) -> &str {
        "remote"
    }
}
