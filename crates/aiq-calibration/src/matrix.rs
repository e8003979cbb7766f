//! Item-by-examinee response matrix assembly.
//!
//! Mirrors the shape `girth` expects: items as rows, examinees as columns,
//! with missing cells carrying no response rather than an invalid sentinel.

use std::collections::HashMap;

use aiq_core::constants::{MAX_SPARSITY_THRESHOLD, MIN_RESPONSES_PER_ITEM};
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// A single observed response, prior to matrix assembly. Serializable so
/// the `calibrate` CLI subcommand can read a batch of these from a file
/// (the calibration pipeline has no store of its own -- ).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawResponse {
    pub user_id: i64,
    pub item_id: i64,
    pub correct: bool,
}

/// Item x examinee response matrix. `cells[i][j]` is `None` when examinee
/// `j` never answered item `i`.
#[derive(Debug, Clone)]
pub struct ResponseMatrix {
    pub item_ids: Vec<i64>,
    pub examinee_ids: Vec<i64>,
    pub cells: Vec<Vec<Option<bool>>>,
}

impl ResponseMatrix {
    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn n_examinees(&self) -> usize {
        self.examinee_ids.len()
    }

    /// Fraction of cells with no observed response.
    pub fn sparsity(&self) -> f64 {
        let total = self.n_items() * self.n_examinees();
        if total == 0 {
            return 1.0;
        }
        let observed: usize = self
            .cells
            .iter()
            .map(|row| row.iter().filter(|c| c.is_some()).count())
            .sum();
        1.0 - (observed as f64 / total as f64)
    }

    fn responses_for_item(&self, idx: usize) -> usize {
        self.cells[idx].iter().filter(|c| c.is_some()).count()
    }

    /// Drops items with fewer than `MIN_RESPONSES_PER_ITEM` observed
    /// responses, returning the filtered matrix.
    pub fn drop_sparse_items(self) -> Self {
        let keep: Vec<usize> = (0..self.n_items())
            .filter(|&i| self.responses_for_item(i) >= MIN_RESPONSES_PER_ITEM)
            .collect();
        let item_ids = keep.iter().map(|&i| self.item_ids[i]).collect();
        let cells = keep.iter().map(|&i| self.cells[i].clone()).collect();
        Self {
            item_ids,
            examinee_ids: self.examinee_ids,
            cells,
        }
    }

    pub fn max_responses_per_item(&self) -> usize {
        (0..self.n_items())
            .map(|i| self.responses_for_item(i))
            .max()
            .unwrap_or(0)
    }
}

/// Builds a response matrix from raw responses, restricted to `item_ids`
/// when given. Fails fast on the identification minimums; sparsity and
/// per-item filtering are applied by the caller once the matrix exists.
pub fn build_matrix(
    responses: &[RawResponse],
    item_ids: Option<&[i64]>,
) -> Result<ResponseMatrix, CalibrationError> {
    if responses.is_empty() {
        return Err(CalibrationError::NoResponses);
    }

    let mut all_item_ids: Vec<i64> = responses.iter().map(|r| r.item_id).collect();
    all_item_ids.sort_unstable();
    all_item_ids.dedup();
    if let Some(restrict) = item_ids {
        all_item_ids.retain(|id| restrict.contains(id));
    }

    let mut all_user_ids: Vec<i64> = responses.iter().map(|r| r.user_id).collect();
    all_user_ids.sort_unstable();
    all_user_ids.dedup();

    let item_index: HashMap<i64, usize> = all_item_ids
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();
    let user_index: HashMap<i64, usize> = all_user_ids
        .iter()
        .enumerate()
        .map(|(j, &id)| (id, j))
        .collect();

    let mut cells = vec![vec![None; all_user_ids.len()]; all_item_ids.len()];
    for r in responses {
        if let (Some(&i), Some(&j)) = (item_index.get(&r.item_id), user_index.get(&r.user_id)) {
            cells[i][j] = Some(r.correct);
        }
    }

    Ok(ResponseMatrix {
        item_ids: all_item_ids,
        examinee_ids: all_user_ids,
        cells,
    })
}

/// Rejects a matrix that is too sparse to calibrate reliably.
pub fn check_sparsity(matrix: &ResponseMatrix) -> Result<(), CalibrationError> {
    let sparsity = matrix.sparsity();
    if sparsity > MAX_SPARSITY_THRESHOLD {
        return Err(CalibrationError::MatrixTooSparse {
            sparsity: sparsity * 100.0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(user_id: i64, item_id: i64, correct: bool) -> RawResponse {
        RawResponse {
            user_id,
            item_id,
            correct,
        }
    }

    #[test]
    fn builds_matrix_with_correct_dimensions() {
        let responses = vec![resp(1, 10, true), resp(1, 11, false), resp(2, 10, false)];
        let matrix = build_matrix(&responses, None).unwrap();
        assert_eq!(matrix.n_items(), 2);
        assert_eq!(matrix.n_examinees(), 2);
    }

    #[test]
    fn missing_cells_are_none() {
        let responses = vec![resp(1, 10, true), resp(2, 11, true)];
        let matrix = build_matrix(&responses, None).unwrap();
        let sparsity = matrix.sparsity();
        assert!((sparsity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_responses_is_rejected() {
        assert!(matches!(
            build_matrix(&[], None),
            Err(CalibrationError::NoResponses)
        ));
    }

    #[test]
    fn drop_sparse_items_removes_low_count_items() {
        let mut responses = vec![];
        for u in 0..20 {
            responses.push(resp(u, 1, u % 2 == 0));
        }
        responses.push(resp(0, 2, true));
        let matrix = build_matrix(&responses, None).unwrap().drop_sparse_items();
        assert_eq!(matrix.item_ids, vec![1]);
    }

    #[test]
    fn restricting_to_item_ids_excludes_others() {
        let responses = vec![resp(1, 10, true), resp(1, 11, false)];
        let matrix = build_matrix(&responses, Some(&[10])).unwrap();
        assert_eq!(matrix.item_ids, vec![10]);
    }
}
