//! Staged calibration run: filter -> matrix -> MML -> bootstrap SE ->
//! validate, with per-stage timing and a `tracing::info!` line each stage
//! completes.
//!
//! A builder-configured runner, `Instant`-based per-stage timings, and an
//! outcome enum rather than a single flattened `Result`.

use std::collections::HashMap;
use std::time::Instant;

use aiq_core::constants::{
    BOOTSTRAP_ITERATIONS, MIN_EXAMINEES_FOR_BOOTSTRAP, MIN_EXAMINEES_FOR_CALIBRATION,
    MIN_ITEMS_FOR_2PL, MIN_RESPONSES_FOR_CALIBRATION,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bootstrap::{bootstrap_standard_errors, StandardErrors};
use crate::error::CalibrationError;
use crate::matrix::{build_matrix, check_sparsity, RawResponse, ResponseMatrix};
use crate::mml::{calibrate_2pl, ItemEstimate};
use crate::priors::{p_to_logit_difficulty, prior_from_ctt, ItemPrior};
use crate::reliability;
use crate::validation::{validate, ValidationReport};

/// Per-item outcome of a calibration run, ready to commit alongside
/// `irt_calibrated_at` / `irt_calibration_n`.
#[derive(Debug, Clone, Copy)]
pub struct CalibratedItem {
    pub item_id: i64,
    pub estimate: ItemEstimate,
    pub se: StandardErrors,
    pub response_count: usize,
}

#[derive(Debug, Clone)]
pub struct CalibrationRun {
    pub calibrated: Vec<CalibratedItem>,
    pub dropped_for_sparsity: Vec<i64>,
    pub examinees_used: usize,
    pub bootstrap_skipped: bool,
    pub validation: Option<ValidationReport>,
    pub completed_at: DateTime<Utc>,
    pub total_ms: u64,

    /// Cronbach's alpha over the retained, complete-case item set.
    pub cronbach_alpha: Option<f64>,
    /// Test-retest correlation over whatever `retest_pairs` the caller supplied.
    pub test_retest: Option<f64>,
    /// Split-half Spearman-Brown correlation, halves split by item parity.
    pub split_half_spearman_brown: Option<f64>,
}

/// Classical per-item statistics used only to build estimator priors and
/// the validation's empirical side; not committed themselves.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClassicalStats {
    pub empirical_p: f64,
    pub point_biserial: f64,
}

pub struct CalibrationPipeline {
    bootstrap_iterations: usize,
}

impl Default for CalibrationPipeline {
    fn default() -> Self {
        Self {
            bootstrap_iterations: BOOTSTRAP_ITERATIONS,
        }
    }
}

impl CalibrationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bootstrap replicate count (tests use far fewer to stay
    /// fast; production takes the default).
    pub fn with_bootstrap_iterations(mut self, iterations: usize) -> Self {
        self.bootstrap_iterations = iterations;
        self
    }

    /// Runs the full pipeline over `responses`, which the caller has already
    /// restricted to completed fixed-form sessions -- this stage has no
    /// session model to filter on itself. `retest_pairs` is whatever
    /// paired (first, second) total scores the caller can supply for
    /// test-retest reliability; pass an empty slice when none are
    /// available, which reports that metric as `None` rather than failing.
    pub fn run(
        &self,
        responses: &[RawResponse],
        classical: &HashMap<i64, ClassicalStats>,
        retest_pairs: &[(f64, f64)],
        now: DateTime<Utc>,
    ) -> Result<CalibrationRun, CalibrationError> {
        let pipeline_start = Instant::now();

        let filter_start = Instant::now();
        let eligible_ids = self.items_with_min_responses(responses);
        tracing::info!(
            filter_ms = filter_start.elapsed().as_millis() as u64,
            eligible_items = eligible_ids.len(),
            "response-count filter complete"
        );

        let n_examinees = {
            let mut ids: Vec<i64> = responses.iter().map(|r| r.user_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids.len()
        };
        if eligible_ids.len() < MIN_ITEMS_FOR_2PL {
            return Err(CalibrationError::InsufficientItems {
                required: MIN_ITEMS_FOR_2PL,
                found: eligible_ids.len(),
            });
        }
        if n_examinees < MIN_EXAMINEES_FOR_CALIBRATION {
            return Err(CalibrationError::InsufficientExaminees {
                required: MIN_EXAMINEES_FOR_CALIBRATION,
                found: n_examinees,
            });
        }

        let matrix_start = Instant::now();
        let matrix = build_matrix(responses, Some(&eligible_ids))?;
        check_sparsity(&matrix)?;
        let matrix = matrix.drop_sparse_items();
        if matrix.n_items() == 0 {
            return Err(CalibrationError::NoItemsWithSufficientResponses {
                min_required: MIN_RESPONSES_FOR_CALIBRATION,
                max_observed: 0,
            });
        }
        let dropped_for_sparsity: Vec<i64> = eligible_ids
            .iter()
            .filter(|id| !matrix.item_ids.contains(id))
            .copied()
            .collect();
        tracing::info!(
            matrix_ms = matrix_start.elapsed().as_millis() as u64,
            retained_items = matrix.n_items(),
            dropped_items = dropped_for_sparsity.len(),
            sparsity = matrix.sparsity(),
            "response matrix assembled"
        );

        let priors = self.build_priors(&matrix, classical);

        let mml_start = Instant::now();
        let estimates = calibrate_2pl(&matrix, &priors)?;
        tracing::info!(
            mml_ms = mml_start.elapsed().as_millis() as u64,
            "2PL MML estimation complete"
        );

        let (ses, bootstrap_skipped) = self.bootstrap(&matrix, &priors, n_examinees);

        let validation = self.validate_fit(&matrix, &estimates, classical);

        let reliability_start = Instant::now();
        let cronbach_alpha = reliability::cronbachs_alpha(&matrix);
        let (first_half, second_half) = reliability::split_half_scores(&matrix);
        let split_half_spearman_brown =
            reliability::split_half_spearman_brown(&first_half, &second_half);
        let test_retest = reliability::test_retest_correlation(retest_pairs);
        tracing::info!(
            reliability_ms = reliability_start.elapsed().as_millis() as u64,
            ?cronbach_alpha,
            ?test_retest,
            ?split_half_spearman_brown,
            "reliability metrics computed"
        );

        let calibrated: Vec<CalibratedItem> = (0..matrix.n_items())
            .map(|i| CalibratedItem {
                item_id: matrix.item_ids[i],
                estimate: estimates[i],
                se: ses[i],
                response_count: matrix.cells[i].iter().filter(|c| c.is_some()).count(),
            })
            .collect();

        let total_ms = pipeline_start.elapsed().as_millis() as u64;
        tracing::info!(total_ms, items_calibrated = calibrated.len(), "calibration run complete");

        Ok(CalibrationRun {
            calibrated,
            dropped_for_sparsity,
            examinees_used: matrix.n_examinees(),
            bootstrap_skipped,
            validation,
            completed_at: now,
            total_ms,
            cronbach_alpha,
            test_retest,
            split_half_spearman_brown,
        })
    }

    fn items_with_min_responses(&self, responses: &[RawResponse]) -> Vec<i64> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for r in responses {
            *counts.entry(r.item_id).or_insert(0) += 1;
        }
        let mut ids: Vec<i64> = counts
            .into_iter()
            .filter(|(_, count)| *count >= MIN_RESPONSES_FOR_CALIBRATION)
            .map(|(id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn build_priors(
        &self,
        matrix: &ResponseMatrix,
        classical: &HashMap<i64, ClassicalStats>,
    ) -> HashMap<i64, ItemPrior> {
        matrix
            .item_ids
            .iter()
            .filter_map(|id| {
                classical
                    .get(id)
                    .map(|stats| (*id, prior_from_ctt(stats.empirical_p, stats.point_biserial)))
            })
            .collect()
    }

    fn bootstrap(
        &self,
        matrix: &ResponseMatrix,
        priors: &HashMap<i64, ItemPrior>,
        n_examinees: usize,
    ) -> (Vec<StandardErrors>, bool) {
        if n_examinees < MIN_EXAMINEES_FOR_BOOTSTRAP {
            tracing::warn!(
                n_examinees,
                required = MIN_EXAMINEES_FOR_BOOTSTRAP,
                "skipping bootstrap SE estimation, too few examinees"
            );
            return (vec![StandardErrors::default(); matrix.n_items()], true);
        }

        let bootstrap_start = Instant::now();
        let ses = bootstrap_standard_errors(matrix, priors, self.bootstrap_iterations);
        tracing::info!(
            bootstrap_ms = bootstrap_start.elapsed().as_millis() as u64,
            iterations = self.bootstrap_iterations,
            "bootstrap standard errors complete"
        );
        (ses, false)
    }

    fn validate_fit(
        &self,
        matrix: &ResponseMatrix,
        estimates: &[ItemEstimate],
        classical: &HashMap<i64, ClassicalStats>,
    ) -> Option<ValidationReport> {
        let mut difficulties = Vec::new();
        let mut logit_p = Vec::new();
        for (id, estimate) in matrix.item_ids.iter().zip(estimates) {
            if let Some(stats) = classical.get(id) {
                difficulties.push(estimate.difficulty);
                logit_p.push(p_to_logit_difficulty(stats.empirical_p));
            }
        }
        validate(&difficulties, &logit_p).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiq_core::cat::irt::probability_correct;

    fn synthetic_responses(n_items: usize, n_examinees: usize, min_per_item: usize) -> Vec<RawResponse> {
        let mut state: u64 = 11;
        let mut next = move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as f64 / (1u64 << 31) as f64
        };
        let mut responses = Vec::new();
        // Repeat the block so the raw response count per item clears
        // MIN_RESPONSES_FOR_CALIBRATION even when the distinct-examinee
        // count is deliberately kept small.
        let repeats = min_per_item.div_ceil(n_examinees.max(1)).max(1);
        for _ in 0..repeats {
            for u in 0..n_examinees {
                let theta = (u as f64 / n_examinees as f64) * 4.0 - 2.0;
                for i in 0..n_items {
                    let b = (i as f64 / n_items as f64) * 4.0 - 2.0;
                    let p = probability_correct(theta, 1.2, b);
                    responses.push(RawResponse {
                        user_id: u as i64,
                        item_id: i as i64,
                        correct: next() < p,
                    });
                }
            }
        }
        responses
    }

    #[test]
    fn runs_end_to_end_on_synthetic_data() {
        let responses = synthetic_responses(6, 80, 50);
        let pipeline = CalibrationPipeline::new().with_bootstrap_iterations(25);
        let result = pipeline
            .run(&responses, &HashMap::new(), &[], Utc::now())
            .unwrap();
        assert_eq!(result.calibrated.len(), 6);
        assert!(result.bootstrap_skipped == false || result.examinees_used < MIN_EXAMINEES_FOR_BOOTSTRAP);
    }

    #[test]
    fn too_few_examinees_is_rejected() {
        // Duplicate rows from the same 5 examinees pad the raw response
        // count per item past MIN_RESPONSES_FOR_CALIBRATION while the
        // distinct-examinee count stays below MIN_EXAMINEES_FOR_CALIBRATION.
        let mut responses = Vec::new();
        for _ in 0..15 {
            for u in 0..5i64 {
                for i in 0..4i64 {
                    responses.push(RawResponse { user_id: u, item_id: i, correct: (u + i) % 2 == 0 });
                }
            }
        }
        let pipeline = CalibrationPipeline::new();
        let err = pipeline.run(&responses, &HashMap::new(), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, CalibrationError::InsufficientExaminees { .. }));
    }

    #[test]
    fn items_below_response_floor_are_excluded_before_matrix_assembly() {
        // Only 3 responses per item -- below MIN_RESPONSES_FOR_CALIBRATION (50).
        let mut responses = Vec::new();
        for u in 0..3i64 {
            for i in 0..4i64 {
                responses.push(RawResponse { user_id: u, item_id: i, correct: true });
            }
        }
        let pipeline = CalibrationPipeline::new();
        let err = pipeline.run(&responses, &HashMap::new(), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, CalibrationError::InsufficientItems { .. }));
    }

    #[test]
    fn small_examinee_pool_skips_bootstrap_with_zeroed_standard_errors() {
        let responses = synthetic_responses(4, 20, 50);
        // 20 examinees is below MIN_EXAMINEES_FOR_CALIBRATION (10)? No -- above it but
        // below MIN_EXAMINEES_FOR_BOOTSTRAP (30), exercising the skip branch.
        let pipeline = CalibrationPipeline::new();
        let result = pipeline.run(&responses, &HashMap::new(), &[], Utc::now()).unwrap();
        assert!(result.bootstrap_skipped);
        assert!(result.calibrated.iter().all(|c| c.se.se_discrimination == 0.0));
    }
}
