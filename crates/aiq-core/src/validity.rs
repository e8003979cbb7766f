//! Person-fit heuristic for cheating/aberrance detection.
//!
//! A lightweight post-hoc flag computed from a completed session's raw
//! correct/incorrect-by-difficulty tallies, without requiring IRT residuals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{ABERRANT_FIT_RATIO_THRESHOLD, UNEXPECTED_DEVIATION_THRESHOLD};
use crate::item::DifficultyTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePercentile {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFlag {
    Normal,
    Aberrant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierTally {
    pub correct: u32,
    pub total: u32,
}

impl TierTally {
    fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityReport {
    pub score_percentile: ScorePercentile,
    pub by_difficulty: HashMap<DifficultyTier, TierTally>,
    pub unexpected_correct: u32,
    pub unexpected_incorrect: u32,
    pub total_responses: u32,
    pub fit_ratio: f64,
    pub fit_flag: FitFlag,
}

fn score_percentile(total_correct: u32, total_responses: u32) -> ScorePercentile {
    if total_responses == 0 {
        return ScorePercentile::Low;
    }
    let rate = total_correct as f64 / total_responses as f64;
    if rate > 0.70 {
        ScorePercentile::High
    } else if rate >= 0.40 {
        ScorePercentile::Medium
    } else {
        ScorePercentile::Low
    }
}

/// Expected correct rate for a (percentile, tier) pair, per the fixed table.
fn expected_rate(percentile: ScorePercentile, tier: DifficultyTier) -> f64 {
    match (percentile, tier) {
        (ScorePercentile::Low, DifficultyTier::Easy) => 0.60,
        (ScorePercentile::Low, DifficultyTier::Medium) => 0.30,
        (ScorePercentile::Low, DifficultyTier::Hard) => 0.15,
        (ScorePercentile::Medium, DifficultyTier::Easy) => 0.80,
        (ScorePercentile::Medium, DifficultyTier::Medium) => 0.50,
        (ScorePercentile::Medium, DifficultyTier::Hard) => 0.30,
        (ScorePercentile::High, DifficultyTier::Easy) => 0.95,
        (ScorePercentile::High, DifficultyTier::Medium) => 0.80,
        (ScorePercentile::High, DifficultyTier::Hard) => 0.60,
    }
}

/// Computes the person-fit report for one completed session's responses.
///
/// `responses` is `(correct, tier)` per answered item, in any order.
pub fn analyze(responses: &[(bool, DifficultyTier)]) -> ValidityReport {
    let total_responses = responses.len() as u32;
    let total_correct = responses.iter().filter(|(c, _)| *c).count() as u32;
    let percentile = score_percentile(total_correct, total_responses);

    let mut by_difficulty: HashMap<DifficultyTier, TierTally> = HashMap::new();
    for &(correct, tier) in responses {
        let tally = by_difficulty.entry(tier).or_default();
        tally.total += 1;
        if correct {
            tally.correct += 1;
        }
    }

    let mut unexpected_correct: u32 = 0;
    let mut unexpected_incorrect: u32 = 0;

    for (&tier, tally) in by_difficulty.iter() {
        if tally.total == 0 {
            continue;
        }
        let expected = expected_rate(percentile, tier);
        let actual = tally.rate();
        let deviation = actual - expected;

        let checks_unexpected_correct = matches!(tier, DifficultyTier::Hard)
            && matches!(percentile, ScorePercentile::Low | ScorePercentile::Medium);
        let checks_unexpected_incorrect = matches!(tier, DifficultyTier::Easy)
            && matches!(percentile, ScorePercentile::High | ScorePercentile::Medium);

        if checks_unexpected_correct && deviation > UNEXPECTED_DEVIATION_THRESHOLD {
            unexpected_correct += (deviation * tally.total as f64).floor() as u32;
        }
        if checks_unexpected_incorrect && -deviation > UNEXPECTED_DEVIATION_THRESHOLD {
            unexpected_incorrect += (-deviation * tally.total as f64).floor() as u32;
        }
    }

    let fit_ratio = if total_responses == 0 {
        0.0
    } else {
        (unexpected_correct + unexpected_incorrect) as f64 / total_responses as f64
    };
    let fit_flag = if fit_ratio >= ABERRANT_FIT_RATIO_THRESHOLD {
        FitFlag::Aberrant
    } else {
        FitFlag::Normal
    };

    ValidityReport {
        score_percentile: percentile,
        by_difficulty,
        unexpected_correct,
        unexpected_incorrect,
        total_responses,
        fit_ratio,
        fit_flag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DifficultyTier::*;

    #[test]
    fn empty_responses_are_normal() {
        let report = analyze(&[]);
        assert_eq!(report.fit_flag, FitFlag::Normal);
        assert_eq!(report.fit_ratio, 0.0);
        assert_eq!(report.total_responses, 0);
    }

    #[test]
    fn high_scorer_expected_pattern_is_normal() {
        let mut responses = vec![(true, Easy); 5];
        responses.extend(vec![(true, Medium); 5]);
        responses.extend(vec![(true, Hard); 5]);
        responses.extend(vec![(false, Hard); 5]);
        let report = analyze(&responses);
        assert_eq!(report.fit_flag, FitFlag::Normal);
        assert_eq!(report.score_percentile, ScorePercentile::High);
    }

    #[test]
    fn low_scorer_acing_hard_items_is_aberrant() {
        let mut responses = vec![(false, Easy); 6];
        responses.extend(vec![(false, Medium); 6]);
        responses.extend(vec![(true, Hard); 8]);
        let report = analyze(&responses);
        assert_eq!(report.score_percentile, ScorePercentile::Medium);
        assert!(report.unexpected_correct > 0);
        assert_eq!(report.fit_flag, FitFlag::Aberrant);
    }

    #[test]
    fn high_scorer_missing_all_easy_items_flags_unexpected_incorrect() {
        let mut responses = vec![(false, Easy); 8];
        responses.extend(vec![(true, Medium); 4]);
        responses.extend(vec![(true, Hard); 8]);
        let report = analyze(&responses);
        assert_eq!(report.by_difficulty[&Easy].total, 8);
        assert_eq!(report.by_difficulty[&Easy].correct, 0);
    }

    #[test]
    fn fit_ratio_always_bounded() {
        let responses = vec![(true, Easy); 10];
        let report = analyze(&responses);
        assert!(report.fit_ratio >= 0.0 && report.fit_ratio <= 1.0);
    }

    #[test]
    fn percentile_boundary_at_seventy_percent_is_medium() {
        let mut responses = vec![(true, Easy); 7];
        responses.extend(vec![(false, Easy); 3]);
        let report = analyze(&responses);
        assert_eq!(report.score_percentile, ScorePercentile::Medium);
    }

    #[test]
    fn percentile_just_above_seventy_percent_is_high() {
        let mut responses = vec![(true, Easy); 8];
        responses.extend(vec![(false, Easy); 2]);
        let report = analyze(&responses);
        assert_eq!(report.score_percentile, ScorePercentile::High);
    }

    #[test]
    fn percentile_boundary_at_forty_percent_is_medium() {
        let mut responses = vec![(true, Easy); 4];
        responses.extend(vec![(false, Easy); 6]);
        let report = analyze(&responses);
        assert_eq!(report.score_percentile, ScorePercentile::Medium);
    }

    #[test]
    fn percentile_just_below_forty_percent_is_low() {
        let mut responses = vec![(true, Easy); 3];
        responses.extend(vec![(false, Easy); 7]);
        let report = analyze(&responses);
        assert_eq!(report.score_percentile, ScorePercentile::Low);
    }
}
