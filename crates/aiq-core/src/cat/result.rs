//! Final score conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{CI_95_Z, IQ_MAX, IQ_MEAN, IQ_MIN, IQ_SCALE};
use crate::item::Domain;
use crate::session::{DomainCounts, StoppingReason};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainScore {
    pub items_administered: u32,
    pub correct: u32,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub iq: i32,
    pub iq_se: f64,
    pub confidence_interval: (i32, i32),
    pub final_theta: f64,
    pub final_se: f64,
    pub stopping_reason: StoppingReason,
    pub domain_scores: HashMap<Domain, DomainScore>,
}

fn clamp_iq(value: f64) -> i32 {
    (value.round() as i32).clamp(IQ_MIN, IQ_MAX)
}

pub fn convert(
    theta: f64,
    se: f64,
    stopping_reason: StoppingReason,
    domain_counts: &DomainCounts,
) -> TestResult {
    let iq_raw = IQ_MEAN + IQ_SCALE * theta;
    let iq = clamp_iq(iq_raw);
    let iq_se = IQ_SCALE * se;
    let lower = clamp_iq(iq_raw - CI_95_Z * iq_se);
    let upper = clamp_iq(iq_raw + CI_95_Z * iq_se);

    let domain_scores = Domain::ALL
        .iter()
        .map(|&domain| {
            let administered = domain_counts.served_count(domain);
            let correct = domain_counts.correct_count(domain);
            let accuracy = if administered == 0 {
                0.0
            } else {
                correct as f64 / administered as f64
            };
            (
                domain,
                DomainScore {
                    items_administered: administered,
                    correct,
                    accuracy,
                },
            )
        })
        .collect();

    TestResult {
        iq,
        iq_se,
        confidence_interval: (lower, upper),
        final_theta: theta,
        final_se: se,
        stopping_reason,
        domain_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iq_clamped_at_extremes() {
        assert_eq!(clamp_iq(1000.0), IQ_MAX);
        assert_eq!(clamp_iq(-1000.0), IQ_MIN);
    }

    #[test]
    fn theta_zero_gives_iq_100() {
        let result = convert(0.0, 1.0, StoppingReason::MaxItems, &DomainCounts::default());
        assert_eq!(result.iq, 100);
    }

    #[test]
    fn positive_theta_gives_iq_above_100() {
        let result = convert(1.0, 0.3, StoppingReason::SeThreshold, &DomainCounts::default());
        assert!(result.iq > 100);
    }

    #[test]
    fn confidence_interval_brackets_the_point_estimate() {
        let result = convert(0.5, 0.4, StoppingReason::SeThreshold, &DomainCounts::default());
        assert!(result.confidence_interval.0 <= result.iq);
        assert!(result.confidence_interval.1 >= result.iq);
    }

    #[test]
    fn domain_accuracy_is_zero_when_not_administered() {
        let result = convert(0.0, 1.0, StoppingReason::MaxItems, &DomainCounts::default());
        for score in result.domain_scores.values() {
            assert_eq!(score.accuracy, 0.0);
        }
    }

    #[test]
    fn domain_accuracy_computed_correctly() {
        let mut counts = DomainCounts::default();
        counts.record(Domain::Math, true);
        counts.record(Domain::Math, false);
        counts.record(Domain::Math, true);
        let result = convert(0.0, 1.0, StoppingReason::MaxItems, &counts);
        let math = &result.domain_scores[&Domain::Math];
        assert_eq!(math.items_administered, 3);
        assert_eq!(math.correct, 2);
        assert!((math.accuracy - 2.0 / 3.0).abs() < 1e-9);
    }
}
