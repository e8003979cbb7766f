//! Session lifecycle endpoints: start a session,
//! step an adaptive one item at a time, or submit a whole fixed form at
//! once.
//!
//! Adaptive and fixed-form sessions finalize through two different paths.
//! `cat::engine::process_response` refuses a `FixedForm` session outright
//! because it is built around a single pending item and a
//! running ability estimate; a fixed form instead hands every item out up
//! front and scores the whole batch on submit, so `submit` builds its
//! `TestResult` directly from `cat::result::convert` and `validity::analyze`
//! rather than stepping through the adaptive state machine.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};

use aiq_core::cat::selection::Candidate;
use aiq_core::cat::{self, eap::ScoredResponse, engine::StoppingRules, Outcome};
use aiq_core::item::DifficultyTier;
use aiq_core::session::{DomainCounts, SessionMode, StoppingReason};
use aiq_core::{validity, CatError, Item, Response};
use aiq_store::{ItemQuery, StoreError};

use crate::dto::{
    ItemDto, NextRequest, NextResponse, StartQuery, StartResponse, SubmitRequest, SubmitResponse,
    TestResultDto,
};
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::state::AppState;

const DEFAULT_FIXED_FORM_SIZE: usize = 15;

/// Items returned by `ItemBank::query_eligible` are always calibrated (it
/// filters on `eligible_for_serving`), so this is only ever called on items
/// already known to have IRT params.
fn candidate_of(item: &Item) -> Candidate {
    let irt = item.irt.as_ref().expect("eligible items are always calibrated");
    Candidate {
        item_id: item.id,
        domain: item.domain,
        discrimination: irt.discrimination,
        difficulty: irt.difficulty,
    }
}

/// Like [`candidate_of`], but for an item fetched directly by a
/// client-submitted id rather than through `query_eligible` -- calibration
/// state isn't guaranteed, so this reports it as a domain error instead of
/// panicking.
fn candidate_of_served(item: &Item) -> Result<Candidate, CatError> {
    let irt = item
        .irt
        .as_ref()
        .ok_or(CatError::ItemNotCalibrated { item_id: item.id })?;
    Ok(Candidate {
        item_id: item.id,
        domain: item.domain,
        discrimination: irt.discrimination,
        difficulty: irt.difficulty,
    })
}

fn is_correct(item: &Item, user_answer: &str) -> bool {
    item.options
        .get(item.correct_option)
        .is_some_and(|expected| expected == user_answer)
}

/// Picks up to `count` eligible items, cycling through domains so the form
/// is balanced rather than front-loaded from one domain.
fn select_fixed_form(mut pool: Vec<Item>, count: usize) -> Vec<Item> {
    pool.sort_by_key(|i| i.id);
    let mut by_domain: std::collections::HashMap<aiq_core::Domain, Vec<Item>> =
        std::collections::HashMap::new();
    for item in pool {
        by_domain.entry(item.domain).or_default().push(item);
    }
    let mut selected = Vec::with_capacity(count);
    'outer: loop {
        let mut made_progress = false;
        for domain in aiq_core::Domain::ALL {
            if selected.len() >= count {
                break 'outer;
            }
            if let Some(items) = by_domain.get_mut(&domain) {
                if !items.is_empty() {
                    selected.push(items.remove(0));
                    made_progress = true;
                }
            }
        }
        if !made_progress {
            break;
        }
    }
    selected
}

async fn scored_history(state: &AppState, session_id: i64) -> Result<Vec<ScoredResponse>, ApiError> {
    let responses = state.response_log.for_session(session_id).await?;
    let mut history = Vec::with_capacity(responses.len());
    for r in &responses {
        let item = state.item_bank.get(r.item_id).await?;
        let candidate = candidate_of_served(&item)?;
        history.push(ScoredResponse {
            discrimination: candidate.discrimination,
            difficulty: candidate.difficulty,
            correct: r.correct,
        });
    }
    Ok(history)
}

pub async fn start(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<StartQuery>,
) -> Result<Json<StartResponse>, ApiError> {
    let now = Utc::now();
    let mode = if query.adaptive {
        SessionMode::Adaptive
    } else {
        SessionMode::FixedForm
    };
    let session = state.session_store.start(user.id, mode, now).await?;

    match mode {
        SessionMode::Adaptive => {
            let eligible = state.item_bank.query_eligible(&ItemQuery::default()).await?;
            let candidates: Vec<Candidate> = eligible.iter().map(candidate_of).collect();
            let first = aiq_core::cat::selection::select_next(
                session.theta,
                &candidates,
                &DomainCounts::default(),
                StoppingRules::default().min_items_per_domain,
            )
            .ok_or(CatError::ItemPoolExhausted)?;

            state
                .session_store
                .with_session_locked(session.id, move |s| {
                    s.pending_item_id = Some(first.item_id);
                    Ok(())
                })
                .await?;

            let item = state.item_bank.get(first.item_id).await?;
            Ok(Json(StartResponse {
                session_id: session.id,
                adaptive: true,
                next_question: Some(ItemDto::from(&item)),
                questions: None,
                current_theta: session.theta,
                current_se: session.se,
            }))
        }
        SessionMode::FixedForm => {
            let eligible = state.item_bank.query_eligible(&ItemQuery::default()).await?;
            let count = query
                .question_count
                .map(|c| c as usize)
                .unwrap_or(DEFAULT_FIXED_FORM_SIZE);
            let form = select_fixed_form(eligible, count);
            let ids: Vec<i64> = form.iter().map(|i| i.id).collect();

            state
                .session_store
                .with_session_locked(session.id, move |s| {
                    s.served_items = ids;
                    Ok(())
                })
                .await?;

            Ok(Json(StartResponse {
                session_id: session.id,
                adaptive: false,
                next_question: None,
                questions: Some(form.iter().map(ItemDto::from).collect()),
                current_theta: session.theta,
                current_se: session.se,
            }))
        }
    }
}

/// Advances an adaptive session by one response.
pub async fn next(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<NextRequest>,
) -> Result<Json<NextResponse>, ApiError> {
    let session = state.session_store.get(req.session_id).await?;
    if session.user_id != user.id {
        return Err(StoreError::SessionOwnedByAnotherUser { session_id: session.id }.into());
    }
    // Reject non-adaptive/terminal sessions and validate the submitted item
    // was actually served before anything is written to the response log --
    // otherwise a rejected submission still leaves a phantom row that gets
    // folded into every later ability re-estimate for this session.
    if session.is_terminal() {
        return Err(CatError::SessionTerminal { session_id: session.id }.into());
    }
    if session.mode != SessionMode::Adaptive {
        return Err(CatError::NotAdaptive { session_id: session.id }.into());
    }
    if session.already_served(req.question_id) {
        return Err(CatError::DuplicateResponse {
            session_id: session.id,
            item_id: req.question_id,
        }
        .into());
    }
    match session.pending_item_id {
        Some(pending) if pending == req.question_id => {}
        _ => {
            return Err(CatError::ItemNotServed {
                session_id: session.id,
                item_id: req.question_id,
            }
            .into())
        }
    }

    let latency = req.time_spent_seconds.unwrap_or(0.0);
    if latency < 0.0 {
        return Err(CatError::NegativeLatency(latency).into());
    }
    if req.user_answer.trim().is_empty() {
        return Err(CatError::EmptyAnswer.into());
    }

    let item = state.item_bank.get(req.question_id).await?;
    let candidate = candidate_of_served(&item)?;
    let correct = is_correct(&item, &req.user_answer);
    let now = Utc::now();

    state
        .response_log
        .insert(Response {
            id: 0,
            user_id: user.id,
            session_id: session.id,
            item_id: item.id,
            submitted_answer: req.user_answer.clone(),
            correct,
            latency_seconds: latency,
            answered_at: now,
        })
        .await?;

    let history = scored_history(&state, session.id).await?;
    let eligible = state
        .item_bank
        .query_eligible(&ItemQuery {
            exclude_ids: session.served_items.iter().copied().collect(),
            ..Default::default()
        })
        .await?;
    let candidates: Vec<Candidate> = eligible.iter().map(candidate_of).collect();
    let rules = StoppingRules::default();

    let (outcome, items_administered, theta, se) = state
        .session_store
        .with_session_locked(session.id, move |s| {
            cat::engine::process_response(s, candidate, correct, now, &history, &candidates, &rules)
                .map(|outcome| (outcome, s.items_administered, s.theta, s.se))
                .map_err(StoreError::Cat)
        })
        .await?;

    match outcome {
        Outcome::NextItem(next_candidate) => {
            let next_item = state.item_bank.get(next_candidate.item_id).await?;
            Ok(Json(NextResponse {
                test_complete: false,
                next_question: Some(ItemDto::from(&next_item)),
                items_administered,
                current_theta: theta,
                current_se: se,
                result: None,
            }))
        }
        Outcome::Finished(test_result) => {
            let validity_report = validity_for_session(&state, session.id).await?;
            Ok(Json(NextResponse {
                test_complete: true,
                next_question: None,
                items_administered,
                current_theta: theta,
                current_se: se,
                result: Some(TestResultDto::new(&test_result, &validity_report)),
            }))
        }
    }
}

async fn validity_for_session(
    state: &AppState,
    session_id: i64,
) -> Result<validity::ValidityReport, ApiError> {
    let responses = state.response_log.for_session(session_id).await?;
    let mut pairs = Vec::with_capacity(responses.len());
    for r in &responses {
        let item = state.item_bank.get(r.item_id).await?;
        pairs.push((r.correct, item.difficulty_tier));
    }
    Ok(validity::analyze(&pairs))
}

/// Finalizes a fixed-form session: every answer arrives at once, none of
/// them pass through the adaptive engine, so ability, domain tallies, and
/// the validity report are all computed directly from the full response
/// set.
pub async fn submit(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let session = state.session_store.get(req.session_id).await?;
    if session.user_id != user.id {
        return Err(StoreError::SessionOwnedByAnotherUser { session_id: session.id }.into());
    }
    if session.mode != SessionMode::FixedForm {
        return Err(CatError::NotAdaptive { session_id: session.id }.into());
    }
    if session.is_terminal() {
        return Err(CatError::SessionTerminal { session_id: session.id }.into());
    }

    let now: DateTime<Utc> = Utc::now();
    let mut history = Vec::with_capacity(req.responses.len());
    let mut domain_counts = DomainCounts::default();
    let mut pairs: Vec<(bool, DifficultyTier)> = Vec::with_capacity(req.responses.len());
    let mut correct_count = 0u32;

    for answer in &req.responses {
        if !session.served_items.contains(&answer.question_id) {
            return Err(CatError::ItemNotServed {
                session_id: session.id,
                item_id: answer.question_id,
            }
            .into());
        }
        let latency = answer.time_spent_seconds.unwrap_or(0.0);
        if latency < 0.0 {
            return Err(CatError::NegativeLatency(latency).into());
        }
        let item = state.item_bank.get(answer.question_id).await?;
        let correct = is_correct(&item, &answer.user_answer);
        if correct {
            correct_count += 1;
        }
        domain_counts.record(item.domain, correct);
        pairs.push((correct, item.difficulty_tier));

        let irt = item.irt.as_ref().expect("served items are always calibrated");
        history.push(ScoredResponse {
            discrimination: irt.discrimination,
            difficulty: irt.difficulty,
            correct,
        });

        state
            .response_log
            .insert(Response {
                id: 0,
                user_id: user.id,
                session_id: session.id,
                item_id: item.id,
                submitted_answer: answer.user_answer.clone(),
                correct,
                latency_seconds: latency,
                answered_at: now,
            })
            .await?;
    }

    let estimate = cat::eap::estimate(&history);
    let items_administered = req.responses.len() as u32;
    let stopping_reason = StoppingReason::MaxItems;
    let test_result = cat::result::convert(estimate.theta, estimate.se, stopping_reason, &domain_counts);

    state
        .session_store
        .with_session_locked(session.id, move |s| {
            s.theta = estimate.theta;
            s.se = estimate.se;
            s.domain_counts = domain_counts;
            s.items_administered = items_administered;
            s.correct_count = correct_count;
            s.state = aiq_core::session::SessionState::Completed;
            s.stopping_reason = Some(stopping_reason);
            s.final_theta = Some(estimate.theta);
            s.final_se = Some(estimate.se);
            s.completed_at = Some(now);
            Ok(())
        })
        .await?;

    let validity_report = validity::analyze(&pairs);
    Ok(Json(SubmitResponse {
        result: TestResultDto::new(&test_result, &validity_report),
    }))
}
