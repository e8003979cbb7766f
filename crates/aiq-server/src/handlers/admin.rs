//! Admin endpoints,
//! every route here guarded by `AdminGuard`.

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;

use crate::dto::{
    AnchorAutoSelectRequest, AnchorItemDto, AnchorToggleRequest, LogoutAllEventDto,
    ReliabilityDto, ReliabilityHistoryQuery,
};
use crate::error::ApiError;
use crate::middleware::AdminGuard;
use crate::state::AppState;

impl From<&aiq_store::ReliabilitySnapshot> for ReliabilityDto {
    fn from(s: &aiq_store::ReliabilitySnapshot) -> Self {
        Self {
            computed_at: s.computed_at,
            cronbach_alpha: s.cronbach_alpha,
            test_retest: s.test_retest,
            split_half_spearman_brown: s.split_half_spearman_brown,
        }
    }
}

pub async fn reliability(
    State(state): State<AppState>,
    _admin: AdminGuard,
) -> Result<Json<Option<ReliabilityDto>>, ApiError> {
    let latest = state.reliability_store.latest().await?;
    Ok(Json(latest.as_ref().map(ReliabilityDto::from)))
}

pub async fn reliability_history(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Query(query): Query<ReliabilityHistoryQuery>,
) -> Result<Json<Vec<ReliabilityDto>>, ApiError> {
    let history = state.reliability_store.history().await?;
    let cutoff = query.days.map(|days| Utc::now() - chrono::Duration::days(days as i64));
    let filtered = history
        .iter()
        .filter(|s| cutoff.is_none_or(|cutoff| s.computed_at >= cutoff))
        .filter(|s| match query.metric_type.as_deref() {
            Some("cronbach_alpha") => s.cronbach_alpha.is_some(),
            Some("test_retest") => s.test_retest.is_some(),
            Some("split_half") => s.split_half_spearman_brown.is_some(),
            _ => true,
        })
        .map(ReliabilityDto::from)
        .collect();
    Ok(Json(filtered))
}

pub async fn list_anchor_items(
    State(state): State<AppState>,
    _admin: AdminGuard,
) -> Result<Json<Vec<AnchorItemDto>>, ApiError> {
    let items = state.item_bank.list_all().await?;
    Ok(Json(items.iter().map(AnchorItemDto::from).collect()))
}

pub async fn toggle_anchor_item(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Json(req): Json<AnchorToggleRequest>,
) -> Result<Json<AnchorItemDto>, ApiError> {
    let item = state
        .item_bank
        .set_anchor(req.item_id, req.anchor, Utc::now())
        .await?;
    Ok(Json(AnchorItemDto::from(&item)))
}

/// Designates up to `per_domain` of the best-discriminating calibrated
/// items in each domain as anchors, for seeding a new
/// calibration cycle's linking set.
pub async fn auto_select_anchor_items(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Json(req): Json<AnchorAutoSelectRequest>,
) -> Result<Json<Vec<AnchorItemDto>>, ApiError> {
    let per_domain = req.per_domain.unwrap_or(2);
    let items = state.item_bank.list_all().await?;
    let now = Utc::now();

    let mut by_domain: std::collections::HashMap<aiq_core::Domain, Vec<aiq_core::Item>> =
        std::collections::HashMap::new();
    for item in items.into_iter().filter(|i| i.eligible_for_serving()) {
        by_domain.entry(item.domain).or_default().push(item);
    }

    let mut chosen = Vec::new();
    for mut domain_items in by_domain.into_values() {
        domain_items.sort_by(|a, b| {
            let disc_a = a.irt.as_ref().map(|p| p.discrimination).unwrap_or(0.0);
            let disc_b = b.irt.as_ref().map(|p| p.discrimination).unwrap_or(0.0);
            disc_b.partial_cmp(&disc_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        for item in domain_items.into_iter().take(per_domain) {
            let updated = state.item_bank.set_anchor(item.id, true, now).await?;
            chosen.push(AnchorItemDto::from(&updated));
        }
    }
    Ok(Json(chosen))
}

/// Correlates each revoked user's logout-all epoch with any password-reset
/// tokens issued around it, for security forensics.
pub async fn logout_all_events(
    State(state): State<AppState>,
    _admin: AdminGuard,
) -> Result<Json<Vec<LogoutAllEventDto>>, ApiError> {
    let revoked_users = state.user_directory.list_revoked().await?;
    let mut events = Vec::with_capacity(revoked_users.len());
    for user in revoked_users {
        let Some(revoked_before) = user.token_revoked_before else {
            continue;
        };
        let reset_tokens = state.reset_tokens.list_for_user(user.id).await?;
        let correlated = reset_tokens
            .into_iter()
            .map(|t| t.issued_at)
            .filter(|issued_at| (*issued_at - revoked_before).num_hours().abs() <= 24)
            .collect();
        events.push(LogoutAllEventDto {
            user_id: user.id,
            revoked_before,
            correlated_reset_tokens: correlated,
        });
    }
    Ok(Json(events))
}
