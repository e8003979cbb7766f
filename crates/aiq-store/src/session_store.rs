//! Session store: one non-terminal session per user, and
//! every mutation serialized under a per-session lock.
//!
//! The uniqueness check is split into two paths: an app-level pre-check
//! (`load_in_progress`) a caller uses to return a descriptive 400 with the
//! existing session id, and a race-safe insert that fails closed if another
//! request won the race, translated by the caller to a 409.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};

use aiq_core::session::SessionMode;
use aiq_core::Session;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::StoreError;

pub trait SessionStore: Send + Sync {
    fn start<'a>(
        &'a self,
        user_id: i64,
        mode: SessionMode,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Session, StoreError>> + Send + 'a>>;

    fn load_in_progress<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>, StoreError>> + Send + 'a>>;

    /// Reads a session by id regardless of state, for ownership/state checks
    /// ahead of a `with_session_locked` call.
    fn get<'a>(
        &'a self,
        session_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Session, StoreError>> + Send + 'a>>;

    /// Every session ever started, for admin/reporting use (e.g. selecting
    /// completed fixed-form sessions as a calibration or reliability
    /// source). Not used by the CAT hot path.
    fn list_all<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<Vec<Session>, StoreError>> + Send + 'a>>;

    /// Runs `mutator` against the session under its per-session lock and
    /// persists the result. This is the only way callers mutate a session,
    /// so every responding/advancing/finalizing step is serialized.
    fn with_session_locked<'a, F, R>(
        &'a self,
        session_id: i64,
        mutator: F,
    ) -> Pin<Box<dyn Future<Output = Result<R, StoreError>> + Send + 'a>>
    where
        F: FnOnce(&mut Session) -> Result<R, StoreError> + Send + 'a,
        R: Send + 'a;
}

struct SessionEntry {
    session: AsyncMutex<Session>,
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: StdMutex<HashMap<i64, Arc<SessionEntry>>>,
    /// user_id -> session_id, present only while that session is non-terminal.
    active_by_user: StdMutex<HashMap<i64, i64>>,
    next_id: StdMutex<i64>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    fn entry(&self, session_id: i64) -> Option<Arc<SessionEntry>> {
        self.sessions.lock().unwrap().get(&session_id).cloned()
    }
}

impl SessionStore for InMemorySessionStore {
    fn start<'a>(
        &'a self,
        user_id: i64,
        mode: SessionMode,
        now: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Session, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            // Single exclusive lock acquisition covering the existence
            // check and the insert -- this is the race-safe path.
            let mut active = self.active_by_user.lock().unwrap();
            if let Some(&existing) = active.get(&user_id) {
                return Err(StoreError::SessionAlreadyInProgress(user_id, existing));
            }

            let id = self.allocate_id();
            let session = match mode {
                SessionMode::Adaptive => Session::new_adaptive(id, user_id, now),
                SessionMode::FixedForm => Session::new_fixed_form(id, user_id, now),
            };

            self.sessions.lock().unwrap().insert(
                id,
                Arc::new(SessionEntry {
                    session: AsyncMutex::new(session.clone()),
                }),
            );
            active.insert(user_id, id);

            Ok(session)
        })
    }

    fn load_in_progress<'a>(
        &'a self,
        user_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let session_id = self.active_by_user.lock().unwrap().get(&user_id).copied();
            match session_id {
                Some(id) => match self.entry(id) {
                    Some(entry) => Ok(Some(entry.session.lock().await.clone())),
                    None => Ok(None),
                },
                None => Ok(None),
            }
        })
    }

    fn get<'a>(
        &'a self,
        session_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<Session, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let entry = self
                .entry(session_id)
                .ok_or(StoreError::SessionNotFound(session_id))?;
            Ok(entry.session.lock().await.clone())
        })
    }

    fn with_session_locked<'a, F, R>(
        &'a self,
        session_id: i64,
        mutator: F,
    ) -> Pin<Box<dyn Future<Output = Result<R, StoreError>> + Send + 'a>>
    where
        F: FnOnce(&mut Session) -> Result<R, StoreError> + Send + 'a,
        R: Send + 'a,
    {
        Box::pin(async move {
            let entry = self
                .entry(session_id)
                .ok_or(StoreError::SessionNotFound(session_id))?;
            let mut session = entry.session.lock().await;
            let result = mutator(&mut session)?;

            if session.is_terminal() {
                self.active_by_user
                    .lock()
                    .unwrap()
                    .remove(&session.user_id);
            }

            Ok(result)
        })
    }
}
