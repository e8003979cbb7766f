//! 2-parameter logistic (2PL) item response model.

/// `P_i(theta) = 1 / (1 + exp(-a_i * (theta - b_i)))`.
pub fn probability_correct(theta: f64, discrimination: f64, difficulty: f64) -> f64 {
    1.0 / (1.0 + (-discrimination * (theta - difficulty)).exp())
}

/// Fisher information for a 2PL item at a given ability: `a^2 * P * (1 - P)`.
pub fn fisher_information(theta: f64, discrimination: f64, difficulty: f64) -> f64 {
    let p = probability_correct(theta, discrimination, difficulty);
    discrimination * discrimination * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_at_difficulty_is_one_half() {
        let p = probability_correct(1.5, 1.2, 1.5);
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn probability_increases_with_theta() {
        let low = probability_correct(-2.0, 1.0, 0.0);
        let high = probability_correct(2.0, 1.0, 0.0);
        assert!(high > low);
    }

    #[test]
    fn information_peaks_at_difficulty() {
        let at_b = fisher_information(0.5, 1.8, 0.5);
        let away = fisher_information(2.0, 1.8, 0.5);
        assert!(at_b > away);
    }

    #[test]
    fn information_scales_with_discrimination_squared() {
        let low_a = fisher_information(0.0, 1.0, 0.0);
        let high_a = fisher_information(0.0, 2.0, 0.0);
        assert!((high_a / low_a - 4.0).abs() < 1e-9);
    }
}
