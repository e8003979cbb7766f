//! Expected a Posteriori ability estimation over a fixed quadrature grid
//!.

use crate::constants::{PRIOR_MEAN, PRIOR_SD, QUADRATURE_MAX, QUADRATURE_MIN, QUADRATURE_POINTS};
use crate::cat::irt::probability_correct;

/// One scored response, reduced to just what the estimator needs: the
/// responding item's 2PL parameters and whether the answer was correct.
#[derive(Debug, Clone, Copy)]
pub struct ScoredResponse {
    pub discrimination: f64,
    pub difficulty: f64,
    pub correct: bool,
}

/// Ability estimate with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub se: f64,
}

fn quadrature_grid() -> Vec<f64> {
    let step = (QUADRATURE_MAX - QUADRATURE_MIN) / (QUADRATURE_POINTS as f64 - 1.0);
    (0..QUADRATURE_POINTS)
        .map(|k| QUADRATURE_MIN + step * k as f64)
        .collect()
}

/// Standard-normal density, unnormalized constant dropped (it cancels after
/// normalizing the posterior weights).
fn normal_log_density(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    -0.5 * z * z - sd.ln()
}

/// EAP ability estimate given a response history. With zero responses,
/// returns the prior mean and SD unchanged.
///
/// Numerically stable: accumulates log-likelihood per grid point and
/// subtracts the maximum before exponentiating, avoiding underflow when many
/// responses are combined.
pub fn estimate(responses: &[ScoredResponse]) -> AbilityEstimate {
    if responses.is_empty() {
        return AbilityEstimate {
            theta: PRIOR_MEAN,
            se: PRIOR_SD,
        };
    }

    let grid = quadrature_grid();
    let mut log_weights: Vec<f64> = grid
        .iter()
        .map(|&theta_k| {
            let mut log_w = normal_log_density(theta_k, PRIOR_MEAN, PRIOR_SD);
            for r in responses {
                let p = probability_correct(theta_k, r.discrimination, r.difficulty);
                // Clamp away from exactly 0/1 so log() never sees zero.
                let p = p.clamp(1e-12, 1.0 - 1e-12);
                log_w += if r.correct { p.ln() } else { (1.0 - p).ln() };
            }
            log_w
        })
        .collect();

    let max_log_w = log_weights
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    for w in &mut log_weights {
        *w = (*w - max_log_w).exp();
    }
    let total: f64 = log_weights.iter().sum();
    let weights: Vec<f64> = log_weights.iter().map(|w| w / total).collect();

    let theta_hat: f64 = grid.iter().zip(&weights).map(|(t, w)| t * w).sum();
    let variance: f64 = grid
        .iter()
        .zip(&weights)
        .map(|(t, w)| (t - theta_hat).powi(2) * w)
        .sum();

    AbilityEstimate {
        theta: theta_hat,
        se: variance.sqrt(),
    }
}
