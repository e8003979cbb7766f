//! Reliability metrics historized alongside each calibration run: Cronbach's
//! alpha, test-retest correlation, split-half Spearman-Brown.

use crate::matrix::ResponseMatrix;
use crate::validation::pearson_r;

/// Cronbach's alpha over the common item set: only examinees who answered
/// every retained item are counted, and only items every such examinee
/// answered contribute a column. Returns `None` when fewer than 2 items or
/// fewer than 2 complete-case examinees remain.
pub fn cronbachs_alpha(matrix: &ResponseMatrix) -> Option<f64> {
    let complete_examinees: Vec<usize> = (0..matrix.n_examinees())
        .filter(|&j| (0..matrix.n_items()).all(|i| matrix.cells[i][j].is_some()))
        .collect();

    let k = matrix.n_items();
    if k < 2 || complete_examinees.len() < 2 {
        return None;
    }

    let item_scores: Vec<Vec<f64>> = (0..k)
        .map(|i| {
            complete_examinees
                .iter()
                .map(|&j| if matrix.cells[i][j].unwrap() { 1.0 } else { 0.0 })
                .collect()
        })
        .collect();

    let total_scores: Vec<f64> = complete_examinees
        .iter()
        .map(|&j| {
            (0..k)
                .map(|i| if matrix.cells[i][j].unwrap() { 1.0 } else { 0.0 })
                .sum()
        })
        .collect();

    let item_variance_sum: f64 = item_scores.iter().map(|scores| variance(scores)).sum();
    let total_variance = variance(&total_scores);
    if total_variance == 0.0 {
        return None;
    }

    let k = k as f64;
    Some((k / (k - 1.0)) * (1.0 - item_variance_sum / total_variance))
}

fn variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Test-retest reliability: Pearson r between two completed-test scores
/// for the same set of users. Returns `None` with fewer than 2 pairs.
pub fn test_retest_correlation(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    Some(pearson_r(&xs, &ys))
}

/// Split-half reliability with the Spearman-Brown correction, given one
/// total score per examinee for each half of the same test. Returns `None`
/// with fewer than 2 examinees.
pub fn split_half_spearman_brown(first_half: &[f64], second_half: &[f64]) -> Option<f64> {
    if first_half.len() != second_half.len() || first_half.len() < 2 {
        return None;
    }
    let r = pearson_r(first_half, second_half);
    Some(2.0 * r / (1.0 + r))
}

/// Splits a matrix's items by parity (even/odd index) and sums each
/// examinee's correct count within each half, keeping only examinees with at
/// least one observed response in both halves.
pub fn split_half_scores(matrix: &ResponseMatrix) -> (Vec<f64>, Vec<f64>) {
    let mut first = Vec::new();
    let mut second = Vec::new();
    for j in 0..matrix.n_examinees() {
        let (mut even_seen, mut odd_seen) = (false, false);
        let (mut even_score, mut odd_score) = (0.0, 0.0);
        for i in 0..matrix.n_items() {
            let Some(correct) = matrix.cells[i][j] else {
                continue;
            };
            if i % 2 == 0 {
                even_seen = true;
                even_score += correct as u8 as f64;
            } else {
                odd_seen = true;
                odd_score += correct as u8 as f64;
            }
        }
        if even_seen && odd_seen {
            first.push(even_score);
            second.push(odd_score);
        }
    }
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::{build_matrix, RawResponse};

    #[test]
    fn consistent_responses_give_high_alpha() {
        let mut responses = Vec::new();
        for u in 0..20i64 {
            let high_scorer = u % 2 == 0;
            for i in 0..5i64 {
                responses.push(RawResponse {
                    user_id: u,
                    item_id: i,
                    correct: high_scorer,
                });
            }
        }
        let matrix = build_matrix(&responses, None).unwrap();
        let alpha = cronbachs_alpha(&matrix).unwrap();
        assert!(alpha > 0.9);
    }

    #[test]
    fn single_item_matrix_has_no_alpha() {
        let responses = vec![
            RawResponse { user_id: 1, item_id: 1, correct: true },
            RawResponse { user_id: 2, item_id: 1, correct: false },
        ];
        let matrix = build_matrix(&responses, None).unwrap();
        assert_eq!(cronbachs_alpha(&matrix), None);
    }

    #[test]
    fn test_retest_correlation_detects_perfect_agreement() {
        let pairs = vec![(80.0, 82.0), (95.0, 97.0), (60.0, 58.0), (100.0, 99.0)];
        let r = test_retest_correlation(&pairs).unwrap();
        assert!(r > 0.95);
    }

    #[test]
    fn split_half_applies_the_spearman_brown_correction() {
        let first = vec![5.0, 6.0, 7.0, 8.0, 9.0];
        let second = vec![5.2, 6.1, 6.9, 8.2, 9.1];
        let corrected = split_half_spearman_brown(&first, &second).unwrap();
        let raw_r = pearson_r(&first, &second);
        // The Spearman-Brown step-up always exceeds the raw half-test
        // correlation for any r in (0, 1).
        assert!(corrected > raw_r);
    }

    #[test]
    fn mismatched_half_lengths_return_none() {
        assert_eq!(split_half_spearman_brown(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn split_half_scores_excludes_examinees_missing_a_whole_half() {
        let responses = vec![
            // user 1 answers every item -- counted in both halves.
            RawResponse { user_id: 1, item_id: 0, correct: true },
            RawResponse { user_id: 1, item_id: 1, correct: false },
            RawResponse { user_id: 1, item_id: 2, correct: true },
            RawResponse { user_id: 1, item_id: 3, correct: true },
            // user 2 only answers even-index items -- excluded, no odd half.
            RawResponse { user_id: 2, item_id: 0, correct: true },
            RawResponse { user_id: 2, item_id: 2, correct: true },
        ];
        let matrix = build_matrix(&responses, None).unwrap();
        let (first, second) = split_half_scores(&matrix);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        // items 0, 2 are the even half (both correct for user 1); 1, 3 are
        // the odd half (one correct, one wrong).
        assert_eq!(first[0], 2.0);
        assert_eq!(second[0], 1.0);
    }
}
