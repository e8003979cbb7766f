//! Non-parametric bootstrap standard errors for the 2PL estimates: resample
//! examinees with replacement, recalibrate, and take the sample standard
//! deviation of each item's parameter across replicates.

use std::collections::HashMap;

use aiq_core::constants::BOOTSTRAP_SEED;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::matrix::ResponseMatrix;
use crate::mml::{calibrate_2pl, ItemEstimate};
use crate::priors::ItemPrior;

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardErrors {
    pub se_discrimination: f64,
    pub se_difficulty: f64,
}

fn resample(matrix: &ResponseMatrix, rng: &mut StdRng) -> ResponseMatrix {
    let n = matrix.n_examinees();
    let mut examinee_ids = Vec::with_capacity(n);
    let mut columns: Vec<Vec<Option<bool>>> = vec![Vec::with_capacity(n); matrix.n_items()];

    for _ in 0..n {
        let j = rng.gen_range(0..n);
        examinee_ids.push(matrix.examinee_ids[j]);
        for (i, row) in columns.iter_mut().enumerate() {
            row.push(matrix.cells[i][j]);
        }
    }

    ResponseMatrix {
        item_ids: matrix.item_ids.clone(),
        examinee_ids,
        cells: columns,
    }
}

/// Runs `iterations` bootstrap replicates from a fixed seed, so repeated
/// calibration runs over the same data reproduce the same standard errors.
/// Returns one `StandardErrors` per item, in the matrix's item order.
pub fn bootstrap_standard_errors(
    matrix: &ResponseMatrix,
    priors: &HashMap<i64, ItemPrior>,
    iterations: usize,
) -> Vec<StandardErrors> {
    let mut rng = StdRng::seed_from_u64(BOOTSTRAP_SEED);
    let n_items = matrix.n_items();
    let mut discriminations: Vec<Vec<f64>> = vec![Vec::with_capacity(iterations); n_items];
    let mut difficulties: Vec<Vec<f64>> = vec![Vec::with_capacity(iterations); n_items];

    for _ in 0..iterations {
        let replicate = resample(matrix, &mut rng);
        let Ok(estimates) = calibrate_2pl(&replicate, priors) else {
            continue;
        };
        for (i, e) in estimates.iter().enumerate() {
            discriminations[i].push(e.discrimination);
            difficulties[i].push(e.difficulty);
        }
    }

    (0..n_items)
        .map(|i| StandardErrors {
            se_discrimination: sample_std(&discriminations[i]),
            se_difficulty: sample_std(&difficulties[i]),
        })
        .collect()
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Point estimate carried alongside its bootstrap standard errors.
#[derive(Debug, Clone, Copy)]
pub struct CalibratedItem {
    pub estimate: ItemEstimate,
    pub se: StandardErrors,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{build_matrix, RawResponse};

    fn uniform_matrix(n_items: usize, n_examinees: usize) -> ResponseMatrix {
        let mut responses = Vec::new();
        for u in 0..n_examinees {
            for i in 0..n_items {
                responses.push(RawResponse {
                    user_id: u as i64,
                    item_id: i as i64,
                    correct: (u + i) % 2 == 0,
                });
            }
        }
        build_matrix(&responses, None).unwrap()
    }

    #[test]
    fn same_seed_gives_identical_standard_errors() {
        let matrix = uniform_matrix(4, 40);
        let a = bootstrap_standard_errors(&matrix, &HashMap::new(), 20);
        let b = bootstrap_standard_errors(&matrix, &HashMap::new(), 20);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.se_discrimination, y.se_discrimination);
            assert_eq!(x.se_difficulty, y.se_difficulty);
        }
    }

    #[test]
    fn returns_one_entry_per_item() {
        let matrix = uniform_matrix(3, 35);
        let ses = bootstrap_standard_errors(&matrix, &HashMap::new(), 10);
        assert_eq!(ses.len(), 3);
    }

    #[test]
    fn single_replicate_yields_zero_standard_error() {
        let std = sample_std(&[1.0]);
        assert_eq!(std, 0.0);
    }
}
