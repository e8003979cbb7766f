//! Stopping-rule evaluation.
//!
//! Priority order, strictly followed: `max_items` dominates everything;
//! falling under `MIN_ITEMS` suppresses every other rule; `se_threshold`
//! requires strict `<` (equality never stops); pool
//! exhaustion is checked last.

use crate::session::{DomainCounts, StoppingReason};

pub fn domain_balance_satisfied(domain_counts: &DomainCounts, min_per_domain: usize) -> bool {
    crate::item::Domain::ALL
        .iter()
        .all(|&d| (domain_counts.served_count(d) as usize) >= min_per_domain)
}

pub struct StoppingInput {
    pub items_administered: usize,
    pub se: f64,
    pub min_items: usize,
    pub max_items: usize,
    pub se_threshold: f64,
    pub min_items_per_domain: usize,
    /// Whether the eligible candidate pool for the *next* item is empty.
    pub eligible_pool_empty: bool,
}

pub fn evaluate(
    domain_counts: &DomainCounts,
    input: &StoppingInput,
) -> Option<StoppingReason> {
    if input.items_administered >= input.max_items {
        return Some(StoppingReason::MaxItems);
    }

    if input.items_administered < input.min_items {
        return None;
    }

    if input.se < input.se_threshold
        && domain_balance_satisfied(domain_counts, input.min_items_per_domain)
    {
        return Some(StoppingReason::SeThreshold);
    }

    if input.eligible_pool_empty {
        return Some(StoppingReason::ItemPoolExhausted);
    }

    None
}
