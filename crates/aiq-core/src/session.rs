use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::Domain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    FixedForm,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppingReason {
    MaxItems,
    SeThreshold,
    ItemPoolExhausted,
}

/// Per-domain tallies of items served and correct answers, used for content
/// balance (selection) and domain score reporting (result conversion).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainCounts {
    pub served: HashMap<Domain, u32>,
    pub correct: HashMap<Domain, u32>,
}

impl DomainCounts {
    pub fn served_count(&self, domain: Domain) -> u32 {
        *self.served.get(&domain).unwrap_or(&0)
    }

    pub fn correct_count(&self, domain: Domain) -> u32 {
        *self.correct.get(&domain).unwrap_or(&0)
    }

    pub fn record(&mut self, domain: Domain, correct: bool) {
        *self.served.entry(domain).or_insert(0) += 1;
        if correct {
            *self.correct.entry(domain).or_insert(0) += 1;
        }
    }
}

/// A test session. Exactly one non-terminal session may exist per user at a
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub mode: SessionMode,
    pub state: SessionState,

    /// Current ability estimate. `0.0` at start.
    pub theta: f64,
    /// Current standard error of `theta`. `1.0` at start.
    pub se: f64,
    /// Item ids served, in order.
    pub served_items: Vec<i64>,
    /// `theta` after each response, in order. Same length as `served_items`
    /// once every served item has been answered.
    pub theta_history: Vec<f64>,
    pub domain_counts: DomainCounts,
    pub items_administered: u32,
    pub correct_count: u32,

    /// Item currently offered to the client and awaiting an answer, if any.
    /// Set whenever an item is selected to serve (session start or the next
    /// item after a response); cleared once that item is answered.
    pub pending_item_id: Option<i64>,

    pub stopping_reason: Option<StoppingReason>,
    pub final_theta: Option<f64>,
    pub final_se: Option<f64>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new_adaptive(id: i64, user_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            mode: SessionMode::Adaptive,
            state: SessionState::InProgress,
            theta: 0.0,
            se: 1.0,
            served_items: Vec::new(),
            theta_history: Vec::new(),
            domain_counts: DomainCounts::default(),
            items_administered: 0,
            correct_count: 0,
            pending_item_id: None,
            stopping_reason: None,
            final_theta: None,
            final_se: None,
            started_at,
            completed_at: None,
        }
    }

    pub fn new_fixed_form(id: i64, user_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            mode: SessionMode::FixedForm,
            ..Self::new_adaptive(id, user_id, started_at)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn already_served(&self, item_id: i64) -> bool {
        self.served_items.contains(&item_id)
    }
}
