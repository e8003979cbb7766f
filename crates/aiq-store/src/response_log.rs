//! Response log: append-only, unique on `(session, item)`.
//!
//! Calibration must not consume adaptive-session responses -- those are
//! conditioned on the very estimator being re-estimated, which would bake
//! in circular bias -- so the projection used for calibration is filtered
//! to completed fixed-form sessions only.

use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use aiq_core::session::SessionMode;
use aiq_core::Response;

use crate::error::StoreError;

/// A `(user, item, correct)` tuple as consumed by calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTuple {
    pub user_id: i64,
    pub item_id: i64,
    pub correct: bool,
}

pub trait ResponseLog: Send + Sync {
    fn insert<'a>(
        &'a self,
        response: Response,
    ) -> Pin<Box<dyn Future<Output = Result<Response, StoreError>> + Send + 'a>>;

    fn for_session<'a>(
        &'a self,
        session_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Response>, StoreError>> + Send + 'a>>;

    /// Responses from completed fixed-form sessions, reduced to what
    /// calibration needs. `completed_fixed_form_sessions` is the caller's
    /// (session store's) view of which session ids qualify.
    fn calibration_tuples<'a>(
        &'a self,
        completed_fixed_form_sessions: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalibrationTuple>, StoreError>> + Send + 'a>>;
}

#[derive(Default)]
pub struct InMemoryResponseLog {
    responses: RwLock<Vec<Response>>,
}

impl InMemoryResponseLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseLog for InMemoryResponseLog {
    fn insert<'a>(
        &'a self,
        response: Response,
    ) -> Pin<Box<dyn Future<Output = Result<Response, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut responses = self.responses.write().unwrap();
            let duplicate = responses
                .iter()
                .any(|r| r.session_id == response.session_id && r.item_id == response.item_id);
            if duplicate {
                return Err(StoreError::DuplicateResponse {
                    session_id: response.session_id,
                    item_id: response.item_id,
                });
            }
            responses.push(response.clone());
            Ok(response)
        })
    }

    fn for_session<'a>(
        &'a self,
        session_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Response>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(self
                .responses
                .read()
                .unwrap()
                .iter()
                .filter(|r| r.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn calibration_tuples<'a>(
        &'a self,
        completed_fixed_form_sessions: &'a [i64],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CalibrationTuple>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let responses = self.responses.read().unwrap();
            Ok(responses
                .iter()
                .filter(|r| completed_fixed_form_sessions.contains(&r.session_id))
                .map(|r| CalibrationTuple {
                    user_id: r.user_id,
                    item_id: r.item_id,
                    correct: r.correct,
                })
                .collect())
        })
    }
}

/// Marker helper: whether a session qualifies as a calibration source.
/// Pure function, kept here rather than on `Session` so the response log
/// (not the core CAT types) owns the calibration-eligibility policy.
pub fn is_calibration_source(mode: SessionMode, is_terminal: bool) -> bool {
    matches!(mode, SessionMode::FixedForm) && is_terminal
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn response(session_id: i64, item_id: i64, user_id: i64, correct: bool) -> Response {
        Response {
            id: 0,
            user_id,
            session_id,
            item_id,
            submitted_answer: "a".into(),
            correct,
            latency_seconds: 3.0,
            answered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn inserts_and_lists_by_session() {
        let log = InMemoryResponseLog::new();
        log.insert(response(1, 10, 5, true)).await.unwrap();
        log.insert(response(1, 11, 5, false)).await.unwrap();
        let responses = log.for_session(1).await.unwrap();
        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_session_item_pair_is_rejected() {
        let log = InMemoryResponseLog::new();
        log.insert(response(1, 10, 5, true)).await.unwrap();
        let result = log.insert(response(1, 10, 5, false)).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateResponse {
                session_id: 1,
                item_id: 10
            })
        ));
    }

    #[tokio::test]
    async fn calibration_tuples_filtered_to_qualifying_sessions() {
        let log = InMemoryResponseLog::new();
        log.insert(response(1, 10, 5, true)).await.unwrap();
        log.insert(response(2, 10, 6, false)).await.unwrap();
        let tuples = log.calibration_tuples(&[1]).await.unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].user_id, 5);
    }

    #[test]
    fn only_completed_fixed_form_sessions_are_calibration_sources() {
        assert!(is_calibration_source(SessionMode::FixedForm, true));
        assert!(!is_calibration_source(SessionMode::FixedForm, false));
        assert!(!is_calibration_source(SessionMode::Adaptive, true));
    }
}
