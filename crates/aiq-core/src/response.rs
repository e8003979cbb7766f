use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded answer. Append-only; unique on `(session_id, item_id)`
///.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub user_id: i64,
    pub session_id: i64,
    pub item_id: i64,
    pub submitted_answer: String,
    pub correct: bool,
    pub latency_seconds: f64,
    pub answered_at: DateTime<Utc>,
}
