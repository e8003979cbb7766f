//! Tunable thresholds for the CAT engine and the calibration pipeline.
//!
//! Kept as plain constants rather than config fields: these are the defaults
//! a deployment can override, but nothing in the engine reads them from the
//! environment -- the server crate is responsible for plumbing any
//! overrides through to `cat::engine::StoppingRules`.

/// Maximum number of items administered before a session forcibly stops.
pub const MAX_ITEMS: usize = 15;

/// Minimum number of items administered before SE-threshold stopping is even considered.
pub const MIN_ITEMS: usize = 8;

/// Stop once `SE(theta) < SE_THRESHOLD` (strict) and domain balance is satisfied.
pub const SE_THRESHOLD: f64 = 0.30;

/// Minimum items per domain required before content balance is considered satisfied.
pub const MIN_ITEMS_PER_DOMAIN: usize = 2;

/// Number of quadrature points for the EAP estimator, uniform on `[-4, 4]`.
pub const QUADRATURE_POINTS: usize = 61;

/// Bounds of the theta quadrature grid.
pub const QUADRATURE_MIN: f64 = -4.0;
pub const QUADRATURE_MAX: f64 = 4.0;

/// Prior mean and SD for the standard-normal ability prior.
pub const PRIOR_MEAN: f64 = 0.0;
pub const PRIOR_SD: f64 = 1.0;

/// IQ score scaling: `IQ = clamp(round(100 + 15*theta), IQ_MIN, IQ_MAX)`.
pub const IQ_MEAN: f64 = 100.0;
pub const IQ_SCALE: f64 = 15.0;
pub const IQ_MIN: i32 = 40;
pub const IQ_MAX: i32 = 160;

/// z-score for a 95% confidence interval.
pub const CI_95_Z: f64 = 1.96;

// --- Calibration thresholds ---

pub const MIN_RESPONSES_FOR_CALIBRATION: usize = 50;
pub const MIN_ITEMS_FOR_2PL: usize = 2;
pub const MIN_EXAMINEES_FOR_CALIBRATION: usize = 10;
pub const MIN_RESPONSES_PER_ITEM: usize = 10;
pub const MAX_SPARSITY_THRESHOLD: f64 = 0.95;
pub const MIN_EXAMINEES_FOR_BOOTSTRAP: usize = 30;
pub const BOOTSTRAP_ITERATIONS: usize = 2000;
pub const BOOTSTRAP_SEED: u64 = 42;
pub const P_VALUE_CLAMP_MIN: f64 = 0.01;
pub const P_VALUE_CLAMP_MAX: f64 = 0.99;
pub const GOOD_FIT_CORRELATION: f64 = 0.80;
pub const GOOD_FIT_RMSE: f64 = 0.50;
pub const MODERATE_FIT_CORRELATION: f64 = 0.60;
pub const MIN_ITEMS_FOR_VALIDATION: usize = 3;

// --- Validity analyzer thresholds ---

pub const HIGH_SCORE_THRESHOLD: f64 = 0.70;
pub const LOW_SCORE_THRESHOLD: f64 = 0.40;
pub const UNEXPECTED_DEVIATION_THRESHOLD: f64 = 0.30;
pub const ABERRANT_FIT_RATIO_THRESHOLD: f64 = 0.25;
