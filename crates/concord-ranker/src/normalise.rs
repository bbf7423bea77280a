//! Numeric helpers shared by the logarithmic stages.

/// Replace NaN and ±∞ with 0 and fold -0.0 into 0.0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() && value != 0.0 {
        value
    } else {
        0.0
    }
}

/// `scale × ln(x)`, clamped to 0 when the result is not finite (x ≤ 0).
pub fn scaled_ln(scale: f64, x: f64) -> f64 {
    finite_or_zero(scale * x.ln())
}

/// Length in Unicode scalar values, not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Neumaier-compensated sum. Order of the input does not change the result
/// beyond rounding in the last place.
pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0f64;
    let mut compensation = 0.0f64;
    for v in values {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_ln_clamps_non_finite() {
        assert_eq!(scaled_ln(5.0, 0.0), 0.0);
        assert_eq!(scaled_ln(5.0, -3.0), 0.0);
        assert_eq!(scaled_ln(5.0, f64::NAN), 0.0);
        assert_eq!(scaled_ln(-4.0, 1.0), 0.0);
        assert!(scaled_ln(-4.0, 1.0).is_sign_positive());
        assert!((scaled_ln(5.0, 4.0) - 6.931_471_805_599_453).abs() < 1e-12);
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("Dvořák"), 6);
        assert_eq!(char_len(""), 0);
    }

    #[test]
    fn test_stable_sum_handles_cancellation() {
        let values = [1e16, 1.0, -1e16];
        assert_eq!(stable_sum(values), 1.0);
        assert!((stable_sum([12.4, 2.89, 6.93]) - stable_sum([6.93, 12.4, 2.89])).abs() < 1e-12);
        assert_eq!(stable_sum(std::iter::empty()), 0.0);
    }
}
