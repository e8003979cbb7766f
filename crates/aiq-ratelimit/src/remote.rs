//! Shared, out-of-process [`RateLimitStore`] backend, so rate-limit state
//! is consistent across a horizontally scaled deployment instead of being
//! per-process.
//!
//! Same trait-with-backends split as the in-memory store, talking to a
//! small HTTP cache sidecar rather than a bespoke binary protocol.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::RateLimitError;
use crate::storage::RateLimitStore;
use crate::strategy::StrategyState;

/// Talks to a shared key/value cache over HTTP: `GET {base_url}/{key}` and
/// `PUT {base_url}/{key}` with a JSON body. A 404 on `GET` means "no state
/// yet", not an error.
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(250))
                .build()
                .expect("reqwest client builds with static config"),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), urlencoding_like(key))
    }
}

/// Minimal percent-encoding for the `:`/`/` characters our keys contain;
/// avoids pulling in a dedicated URL-encoding crate for one call site.
fn urlencoding_like(key: &str) -> String {
    key.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

impl RateLimitStore for RemoteStore {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StrategyState>, RateLimitError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.url_for(key))
                .send()
                .await
                .map_err(|e| RateLimitError::StorageUnavailable(e.to_string()))?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !resp.status().is_success() {
                return Err(RateLimitError::StorageUnavailable(format!(
                    "shared cache returned {}",
                    resp.status()
                )));
            }
            resp.json::<StrategyState>()
                .await
                .map(Some)
                .map_err(|e| RateLimitError::StorageUnavailable(e.to_string()))
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        state: StrategyState,
    ) -> Pin<Box<dyn Future<Output = Result<(), RateLimitError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .client
                .put(self.url_for(key))
                .json(&state)
                .send()
                .await
                .map_err(|e| RateLimitError::StorageUnavailable(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(RateLimitError::StorageUnavailable(format!(
                    "shared cache returned {}",
                    resp.status()
                )));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_colons_and_slashes_are_escaped() {
        let store = RemoteStore::new("http://cache.internal");
        let url = store.url_for("/v1/test/start:user:7");
        assert_eq!(url, "http://cache.internal/%2Fv1%2Ftest%2Fstart%3Auser%3A7");
    }
}
