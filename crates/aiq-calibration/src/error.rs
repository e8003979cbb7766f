use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("no responses provided for calibration")]
    NoResponses,

    #[error("at least {required} items required for 2PL calibration, found {found}")]
    InsufficientItems { required: usize, found: usize },

    #[error("at least {required} examinees required for 2PL calibration, found {found}")]
    InsufficientExaminees { required: usize, found: usize },

    #[error("response matrix too sparse for reliable calibration: {sparsity:.1}% missing")]
    MatrixTooSparse { sparsity: f64 },

    #[error("no items have at least {min_required} responses (max observed: {max_observed})")]
    NoItemsWithSufficientResponses {
        min_required: usize,
        max_observed: usize,
    },

    #[error("2PL MML estimation failed to converge for item {item_id}")]
    EstimationFailed { item_id: i64 },
}
