use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the six cognitive domains an item is classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Pattern,
    Logic,
    Spatial,
    Math,
    Verbal,
    Memory,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Pattern,
        Domain::Logic,
        Domain::Spatial,
        Domain::Math,
        Domain::Verbal,
        Domain::Memory,
    ];
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Domain::Pattern => "pattern",
            Domain::Logic => "logic",
            Domain::Spatial => "spatial",
            Domain::Math => "math",
            Domain::Verbal => "verbal",
            Domain::Memory => "memory",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityState {
    Normal,
    UnderReview,
    Deactivated,
}

/// Calibrated 2PL item-response-theory parameters. `None` until the item has
/// gone through at least one calibration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrtParams {
    /// Difficulty, `b`, on the theta scale.
    pub difficulty: f64,
    /// Discrimination, `a`. Invariant: strictly positive.
    pub discrimination: f64,
    pub se_difficulty: f64,
    pub se_discrimination: f64,
    /// For 2PL this equals `difficulty` -- information peaks at theta = b.
    pub information_peak: f64,
    pub calibrated_at: DateTime<Utc>,
    pub calibration_n: u32,
}

impl IrtParams {
    /// Construct params, flipping the sign of a non-positive discrimination
    /// (and negating difficulty to match) rather than rejecting it -- MML
    /// estimation is sign-invariant up to a reflection of the theta scale,
    /// and the `a > 0` invariant must hold regardless.
    pub fn new(
        difficulty: f64,
        discrimination: f64,
        se_difficulty: f64,
        se_discrimination: f64,
        calibrated_at: DateTime<Utc>,
        calibration_n: u32,
    ) -> Self {
        let (b, a) = if discrimination <= 0.0 {
            (-difficulty, -discrimination)
        } else {
            (difficulty, discrimination)
        };
        Self {
            difficulty: b,
            discrimination: a,
            se_difficulty,
            se_discrimination,
            information_peak: b,
            calibrated_at,
            calibration_n,
        }
    }
}

/// An assessment item with its content, taxonomy, classical stats, and
/// (once calibrated) IRT parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub prompt: String,
    pub stimulus: Option<String>,
    pub options: Vec<String>,
    pub correct_option: usize,
    pub domain: Domain,
    pub difficulty_tier: DifficultyTier,
    /// Empirical p-value: fraction of examinees answering correctly, in `[0, 1]`.
    pub empirical_p: f64,
    /// Classical point-biserial discrimination.
    pub point_biserial: f64,
    pub irt: Option<IrtParams>,
    pub active: bool,
    pub quality: QualityState,
    pub anchor: bool,
    pub anchor_designated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// An item is eligible to be served in a live adaptive test only when it
    /// is active, of normal quality, and has calibrated IRT parameters
    ///.
    pub fn eligible_for_serving(&self) -> bool {
        self.active && matches!(self.quality, QualityState::Normal) && self.irt.is_some()
    }
}
