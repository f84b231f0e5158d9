//! Bayesian update primitives

use crate::constants::{MAX_PROBABILITY, MIN_PROBABILITY};

/// Clamp into [MIN_PROBABILITY, MAX_PROBABILITY]; NaN maps to the floor
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        return MIN_PROBABILITY;
    }
    p.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

/// Posterior P(occupied | sensor active).
///
/// All inputs are clamped first. A zero denominator leaves the prior as is.
pub fn update_probability(prior: f64, prob_given_true: f64, prob_given_false: f64) -> f64 {
    let prior = clamp_probability(prior);
    let p_t = clamp_probability(prob_given_true);
    let p_f = clamp_probability(prob_given_false);

    let numerator = p_t * prior;
    let denominator = numerator + p_f * (1.0 - prior);
    if denominator == 0.0 {
        return prior;
    }
    clamp_probability(numerator / denominator)
}

/// Pull P(active|occupied) towards P(active|vacant) by `weight`.
/// Weight 1 keeps the raw likelihood, weight 0 makes the sensor neutral.
pub fn weighted_likelihood(prob_given_true: f64, prob_given_false: f64, weight: f64) -> f64 {
    let weight = if weight.is_finite() { weight.clamp(0.0, 1.0) } else { 1.0 };
    prob_given_false + weight * (prob_given_true - prob_given_false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_probability_known_value() {
        // 0.25 * 0.35 / (0.25 * 0.35 + 0.05 * 0.65)
        let p = update_probability(0.35, 0.25, 0.05);
        assert!((p - 0.729_166).abs() < 1e-5);
    }

    #[test]
    fn test_update_stays_in_bounds() {
        for &prior in &[0.0, 0.01, 0.5, 0.99, 1.0, -3.0, 7.0, f64::NAN] {
            for &pt in &[0.0, 0.3, 1.0] {
                for &pf in &[0.0, 0.02, 1.0] {
                    let p = update_probability(prior, pt, pf);
                    assert!((MIN_PROBABILITY..=MAX_PROBABILITY).contains(&p));
                }
            }
        }
    }

    #[test]
    fn test_evidence_raises_probability() {
        let prior = 0.2;
        assert!(update_probability(prior, 0.8, 0.1) > prior);
        assert!(update_probability(prior, 0.1, 0.8) < prior);
    }

    #[test]
    fn test_weighted_likelihood() {
        assert_eq!(weighted_likelihood(0.25, 0.05, 1.0), 0.25);
        assert_eq!(weighted_likelihood(0.25, 0.05, 0.0), 0.05);
        assert!((weighted_likelihood(0.25, 0.05, 0.85) - 0.22).abs() < 1e-12);
    }

    #[test]
    fn test_neutral_weight_leaves_prior() {
        let p_t = weighted_likelihood(0.4, 0.1, 0.0);
        assert!((update_probability(0.3, p_t, 0.1) - 0.3).abs() < 1e-12);
    }
}
