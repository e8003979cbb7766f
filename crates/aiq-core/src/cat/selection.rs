//! Maximum-information item selection with content balance.

use std::collections::HashSet;

use crate::cat::irt::fisher_information;
use crate::item::Domain;
use crate::session::DomainCounts;

/// A candidate item already filtered down to eligibility (active, normal
/// quality, calibrated, not yet served in the session) by the caller.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub item_id: i64,
    pub domain: Domain,
    pub discrimination: f64,
    pub difficulty: f64,
}

/// Domains currently under the content-balance floor.
fn under_served_domains(domain_counts: &DomainCounts, min_per_domain: usize) -> HashSet<Domain> {
    Domain::ALL
        .iter()
        .copied()
        .filter(|&d| (domain_counts.served_count(d) as usize) < min_per_domain)
        .collect()
}

/// Selects the next item to administer, or `None` if the eligible pool is
/// empty (the caller maps this to `item_pool_exhausted`).
///
/// Tie-break: higher raw Fisher information, then lower item id.
pub fn select_next(
    theta: f64,
    candidates: &[Candidate],
    domain_counts: &DomainCounts,
    min_per_domain: usize,
) -> Option<Candidate> {
    if candidates.is_empty() {
        return None;
    }

    let under_served = under_served_domains(domain_counts, min_per_domain);
    let pool: Vec<&Candidate> = if under_served.is_empty() {
        candidates.iter().collect()
    } else {
        let restricted: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| under_served.contains(&c.domain))
            .collect();
        if restricted.is_empty() {
            candidates.iter().collect()
        } else {
            restricted
        }
    };

    pool.into_iter()
        .map(|c| (fisher_information(theta, c.discrimination, c.difficulty), *c))
        .max_by(|(info_a, cand_a), (info_b, cand_b)| {
            info_a
                .partial_cmp(info_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| cand_b.item_id.cmp(&cand_a.item_id))
        })
        .map(|(_, c)| c)
}
