//! CTT-to-logit priors for warm-starting the MML estimator.

use aiq_core::constants::{P_VALUE_CLAMP_MAX, P_VALUE_CLAMP_MIN};

/// Converts a p-value (proportion correct) to an IRT difficulty prior via
/// the logit transform, assuming a population mean ability of zero.
///
/// `b = -log(p / (1-p))`. Clamps `p` away from `{0, 1}` to avoid `log(0)`.
pub fn p_to_logit_difficulty(p: f64) -> f64 {
    let clamped = p.clamp(P_VALUE_CLAMP_MIN, P_VALUE_CLAMP_MAX);
    -(clamped / (1.0 - clamped)).ln()
}

/// A starting point for one item's 2PL parameters, built from classical
/// test theory statistics.
#[derive(Debug, Clone, Copy)]
pub struct ItemPrior {
    pub difficulty: f64,
    pub discrimination: f64,
}

impl Default for ItemPrior {
    fn default() -> Self {
        Self {
            difficulty: 0.0,
            discrimination: 1.0,
        }
    }
}

/// Builds a difficulty prior from `empirical_p` and, when the classical
/// point-biserial discrimination is positive, a discrimination prior taken
/// directly from it -- it is already on a comparable scale and needs no
/// rescaling for use as an MML starting value.
pub fn prior_from_ctt(empirical_p: f64, point_biserial: f64) -> ItemPrior {
    ItemPrior {
        difficulty: p_to_logit_difficulty(empirical_p),
        discrimination: if point_biserial > 0.0 {
            point_biserial
        } else {
            1.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_correct_gives_zero_difficulty() {
        assert!((p_to_logit_difficulty(0.5) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn harder_items_have_higher_p_to_logit_difficulty() {
        let easy = p_to_logit_difficulty(0.9);
        let hard = p_to_logit_difficulty(0.2);
        assert!(hard > easy);
    }

    #[test]
    fn clamps_extreme_p_values() {
        let d = p_to_logit_difficulty(1.0);
        assert!(d.is_finite());
        let d = p_to_logit_difficulty(0.0);
        assert!(d.is_finite());
    }

    #[test]
    fn non_positive_point_biserial_falls_back_to_unit_discrimination() {
        let prior = prior_from_ctt(0.5, -0.1);
        assert_eq!(prior.discrimination, 1.0);
    }

    #[test]
    fn positive_point_biserial_is_used_directly() {
        let prior = prior_from_ctt(0.5, 0.35);
        assert_eq!(prior.discrimination, 0.35);
    }
}
