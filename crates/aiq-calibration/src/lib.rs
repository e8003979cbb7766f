//! Off-line 2PL calibration: response-matrix assembly, MML
//! estimation, bootstrap standard errors, CTT-derived priors, post-fit
//! validation, reliability metrics, and the staged pipeline tying them
//! together.

pub mod bootstrap;
pub mod error;
pub mod matrix;
pub mod mml;
pub mod pipeline;
pub mod priors;
pub mod reliability;
pub mod validation;

pub use bootstrap::{bootstrap_standard_errors, CalibratedItem as BootstrapItem, StandardErrors};
pub use error::CalibrationError;
pub use matrix::{build_matrix, check_sparsity, RawResponse, ResponseMatrix};
pub use mml::{calibrate_2pl, ItemEstimate};
pub use pipeline::{CalibratedItem, CalibrationPipeline, CalibrationRun, ClassicalStats};
pub use priors::{p_to_logit_difficulty, prior_from_ctt, ItemPrior};
pub use reliability::{cronbachs_alpha, split_half_spearman_brown, test_retest_correlation};
pub use validation::{validate, FitQuality, ValidationReport};
