//! The adaptive engine's per-response state transition: score the response,
//! re-estimate ability, evaluate stopping rules, and either select the next
//! item or finalize the session.

use chrono::{DateTime, Utc};

use crate::cat::eap::{self, ScoredResponse};
use crate::cat::result::{self, TestResult};
use crate::cat::selection::{self, Candidate};
use crate::cat::stopping::{self, StoppingInput};
use crate::constants::{MAX_ITEMS, MIN_ITEMS, MIN_ITEMS_PER_DOMAIN, SE_THRESHOLD};
use crate::error::CatError;
use crate::session::{Session, SessionState};

/// Overridable stopping thresholds, defaulting to the constants in
/// `crate::constants`. The server crate plumbs deployment overrides in
/// here; the engine itself never reads configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoppingRules {
    pub min_items: usize,
    pub max_items: usize,
    pub se_threshold: f64,
    pub min_items_per_domain: usize,
}

impl Default for StoppingRules {
    fn default() -> Self {
        Self {
            min_items: MIN_ITEMS,
            max_items: MAX_ITEMS,
            se_threshold: SE_THRESHOLD,
            min_items_per_domain: MIN_ITEMS_PER_DOMAIN,
        }
    }
}

/// What the caller should do after a response has been scored.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The session continues; serve this item next.
    NextItem(Candidate),
    /// The session is finished; here is its scored result.
    Finished(TestResult),
}

/// A single scored response to be folded into ability re-estimation. Built
/// by the caller from the session's full response history plus the item
/// bank lookup for each served item's IRT parameters.
pub fn scored_history(history: &[ScoredResponse]) -> eap::AbilityEstimate {
    eap::estimate(history)
}

/// Applies one response to a session in adaptive mode, advancing its state
/// in place, and decides what happens next.
///
/// `item` is the item just answered; `history` is the full set of scored
/// responses in the session *including* this one; `candidates` is the
/// caller-filtered pool of items eligible to be served next (active, normal
/// quality, calibrated, not yet served).
#[allow(clippy::too_many_arguments)]
pub fn process_response(
    session: &mut Session,
    item: Candidate,
    correct: bool,
    answered_at: DateTime<Utc>,
    history: &[ScoredResponse],
    candidates: &[Candidate],
    rules: &StoppingRules,
) -> Result<Outcome, CatError> {
    if session.is_terminal() {
        return Err(CatError::SessionTerminal {
            session_id: session.id,
        });
    }
    if session.mode != crate::session::SessionMode::Adaptive {
        return Err(CatError::NotAdaptive {
            session_id: session.id,
        });
    }
    if session.already_served(item.item_id) {
        return Err(CatError::DuplicateResponse {
            session_id: session.id,
            item_id: item.item_id,
        });
    }
    if let Some(pending) = session.pending_item_id {
        if pending != item.item_id {
            return Err(CatError::ItemNotServed {
                session_id: session.id,
                item_id: item.item_id,
            });
        }
    }

    let estimate = eap::estimate(history);
    session.theta = estimate.theta;
    session.se = estimate.se;
    session.pending_item_id = None;
    session.served_items.push(item.item_id);
    session.theta_history.push(estimate.theta);
    session.domain_counts.record(item.domain, correct);
    session.items_administered += 1;
    if correct {
        session.correct_count += 1;
    }

    let remaining: Vec<Candidate> = candidates
        .iter()
        .copied()
        .filter(|c| !session.already_served(c.item_id))
        .collect();

    let stopping_input = StoppingInput {
        items_administered: session.items_administered as usize,
        se: session.se,
        min_items: rules.min_items,
        max_items: rules.max_items,
        se_threshold: rules.se_threshold,
        min_items_per_domain: rules.min_items_per_domain,
        eligible_pool_empty: remaining.is_empty(),
    };

    if let Some(reason) = stopping::evaluate(&session.domain_counts, &stopping_input) {
        session.state = SessionState::Completed;
        session.stopping_reason = Some(reason);
        session.final_theta = Some(session.theta);
        session.final_se = Some(session.se);
        session.completed_at = Some(answered_at);
        let test_result = result::convert(session.theta, session.se, reason, &session.domain_counts);
        return Ok(Outcome::Finished(test_result));
    }

    match selection::select_next(
        session.theta,
        &remaining,
        &session.domain_counts,
        rules.min_items_per_domain,
    ) {
        Some(next) => {
            session.pending_item_id = Some(next.item_id);
            Ok(Outcome::NextItem(next))
        }
        None => {
            session.state = SessionState::Completed;
            session.stopping_reason = Some(crate::session::StoppingReason::ItemPoolExhausted);
            session.final_theta = Some(session.theta);
            session.final_se = Some(session.se);
            session.completed_at = Some(answered_at);
            let test_result = result::convert(
                session.theta,
                session.se,
                crate::session::StoppingReason::ItemPoolExhausted,
                &session.domain_counts,
            );
            Ok(Outcome::Finished(test_result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Domain;

    fn candidate(id: i64, domain: Domain) -> Candidate {
        Candidate {
            item_id: id,
            domain,
            discrimination: 1.2,
            difficulty: 0.0,
        }
    }

    fn fresh_session() -> Session {
        Session::new_adaptive(1, 1, Utc::now())
    }

    #[test]
    fn rejects_response_on_terminal_session() {
        let mut session = fresh_session();
        session.state = SessionState::Completed;
        let result = process_response(
            &mut session,
            candidate(1, Domain::Math),
            true,
            Utc::now(),
            &[],
            &[],
            &StoppingRules::default(),
        );
        assert_eq!(
            result,
            Err(CatError::SessionTerminal { session_id: 1 })
        );
    }

    #[test]
    fn rejects_response_on_fixed_form_session() {
        let mut session = Session::new_fixed_form(1, 1, Utc::now());
        let result = process_response(
            &mut session,
            candidate(1, Domain::Math),
            true,
            Utc::now(),
            &[],
            &[],
            &StoppingRules::default(),
        );
        assert_eq!(result, Err(CatError::NotAdaptive { session_id: 1 }));
    }

    #[test]
    fn rejects_duplicate_item() {
        let mut session = fresh_session();
        session.served_items.push(7);
        let result = process_response(
            &mut session,
            candidate(7, Domain::Math),
            true,
            Utc::now(),
            &[],
            &[],
            &StoppingRules::default(),
        );
        assert_eq!(
            result,
            Err(CatError::DuplicateResponse {
                session_id: 1,
                item_id: 7
            })
        );
    }

    #[test]
    fn rejects_item_that_was_not_the_one_offered() {
        let mut session = fresh_session();
        session.pending_item_id = Some(42);
        let result = process_response(
            &mut session,
            candidate(7, Domain::Math),
            true,
            Utc::now(),
            &[],
            &[],
            &StoppingRules::default(),
        );
        assert_eq!(
            result,
            Err(CatError::ItemNotServed {
                session_id: 1,
                item_id: 7
            })
        );
    }

    #[test]
    fn accepts_item_matching_pending_offer_and_advances_pending() {
        let mut session = fresh_session();
        session.pending_item_id = Some(1);
        let candidates = vec![candidate(2, Domain::Math)];
        let outcome = process_response(
            &mut session,
            candidate(1, Domain::Math),
            true,
            Utc::now(),
            &[ScoredResponse {
                discrimination: 1.2,
                difficulty: 0.0,
                correct: true,
            }],
            &candidates,
            &StoppingRules::default(),
        )
        .unwrap();
        match outcome {
            Outcome::NextItem(next) => {
                assert_eq!(next.item_id, 2);
                assert_eq!(session.pending_item_id, Some(2));
            }
            Outcome::Finished(_) => panic!("expected another item"),
        }
    }

    #[test]
    fn continues_below_min_items() {
        let mut session = fresh_session();
        let candidates = vec![candidate(1, Domain::Math), candidate(2, Domain::Logic)];
        let history = vec![ScoredResponse {
            discrimination: 1.2,
            difficulty: 0.0,
            correct: true,
        }];
        let rules = StoppingRules::default();
        let outcome = process_response(
            &mut session,
            candidate(1, Domain::Math),
            true,
            Utc::now(),
            &history,
            &candidates,
            &rules,
        )
        .unwrap();
        assert!(matches!(outcome, Outcome::NextItem(_)));
        assert_eq!(session.items_administered, 1);
        assert_eq!(session.state, SessionState::InProgress);
    }

    #[test]
    fn finishes_on_empty_pool() {
        let mut session = fresh_session();
        session.items_administered = 9;
        for d in Domain::ALL {
            session.domain_counts.record(d, true);
            session.domain_counts.record(d, true);
        }
        let history: Vec<ScoredResponse> = (0..9)
            .map(|_| ScoredResponse {
                discrimination: 1.2,
                difficulty: 0.0,
                correct: true,
            })
            .collect();
        let outcome = process_response(
            &mut session,
            candidate(1, Domain::Math),
            true,
            Utc::now(),
            &history,
            &[],
            &StoppingRules::default(),
        )
        .unwrap();
        assert!(matches!(outcome, Outcome::Finished(_)));
        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(
            session.stopping_reason,
            Some(crate::session::StoppingReason::ItemPoolExhausted)
        );
    }

    #[test]
    fn finishes_on_max_items() {
        let mut session = fresh_session();
        session.items_administered = 14;
        let history: Vec<ScoredResponse> = (0..15)
            .map(|_| ScoredResponse {
                discrimination: 1.2,
                difficulty: 0.0,
                correct: true,
            })
            .collect();
        let candidates = vec![candidate(99, Domain::Math)];
        let outcome = process_response(
            &mut session,
            candidate(1, Domain::Math),
            true,
            Utc::now(),
            &history,
            &candidates,
            &StoppingRules::default(),
        )
        .unwrap();
        assert!(matches!(outcome, Outcome::Finished(_)));
        assert_eq!(
            session.stopping_reason,
            Some(crate::session::StoppingReason::MaxItems)
        );
    }
}
