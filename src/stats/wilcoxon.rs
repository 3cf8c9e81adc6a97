use super::{average_ranks, standard_normal, tie_sum, TestOutcome};
use crate::error::StatsError;
use statrs::distribution::ContinuousCDF;

/// Largest sample for which the exact null distribution is used
const EXACT_MAX_N: usize = 50;

/// Two-sided Wilcoxon signed-rank test on paired samples
///
/// Zero differences are discarded. The statistic is min(R+, R−). The exact
/// null distribution is used for small samples without ties or zeros; the
/// normal approximation (tie-corrected variance, no continuity correction)
/// otherwise.
pub fn wilcoxon_signed_rank(a: &[f64], b: &[f64]) -> Result<TestOutcome, StatsError> {
    if a.len() != b.len() {
        return Err(StatsError::UnequalLengths(a.len(), b.len()));
    }

    let diffs: Vec<f64> = a
        .iter()
        .zip(b)
        .map(|(x, y)| x - y)
        .filter(|d| *d != 0.0)
        .collect();
    let had_zeros = diffs.len() < a.len();
    let n = diffs.len();
    if n == 0 {
        return Err(StatsError::Degenerate(
            "all paired differences are zero".to_string(),
        ));
    }

    let magnitudes: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let (ranks, ties) = average_ranks(&magnitudes);

    let r_plus: f64 = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let r_minus: f64 = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d < 0.0)
        .map(|(_, r)| r)
        .sum();
    let statistic = r_plus.min(r_minus);

    let p_value = if n <= EXACT_MAX_N && ties.is_empty() && !had_zeros {
        exact_p_value(n, statistic)
    } else {
        let nf = n as f64;
        let mean = nf * (nf + 1.0) / 4.0;
        let variance = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_sum(&ties) / 48.0;
        if variance <= 0.0 {
            return Err(StatsError::Degenerate(
                "signed-rank variance is zero".to_string(),
            ));
        }
        let z = (statistic - mean) / variance.sqrt();
        (2.0 * standard_normal()?.cdf(-z.abs())).min(1.0)
    };

    Ok(TestOutcome { statistic, p_value })
}

/// 2·P(T ≤ t) under the exact signed-rank null distribution, capped at 1
fn exact_p_value(n: usize, statistic: f64) -> f64 {
    let max_sum = n * (n + 1) / 2;
    // counts[s] = number of subsets of {1..n} summing to s
    let mut counts = vec![0u64; max_sum + 1];
    counts[0] = 1;
    for rank in 1..=n {
        for s in (rank..=max_sum).rev() {
            counts[s] += counts[s - rank];
        }
    }

    let total = 2f64.powi(n as i32);
    let upto = statistic.floor() as usize;
    let cumulative: u64 = counts.iter().take(upto + 1).sum();
    (2.0 * cumulative as f64 / total).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_all_negative() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];

        let outcome = wilcoxon_signed_rank(&a, &b).unwrap();
        assert_eq!(outcome.statistic, 0.0);
        assert!((outcome.p_value - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_exact_mixed_signs() {
        // d = [+1, -2, +3, +4]: R- = 2, P(T <= 2) = 3/16
        let a = [2.0, 1.0, 6.0, 9.0];
        let b = [1.0, 3.0, 3.0, 5.0];

        let outcome = wilcoxon_signed_rank(&a, &b).unwrap();
        assert_eq!(outcome.statistic, 2.0);
        assert!((outcome.p_value - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_symmetric_and_capped() {
        let a = [1.0, 4.0];
        let b = [2.0, 2.0];
        let forward = wilcoxon_signed_rank(&a, &b).unwrap();
        let backward = wilcoxon_signed_rank(&b, &a).unwrap();

        assert_eq!(forward, backward);
        assert!(forward.p_value <= 1.0);
    }

    #[test]
    fn test_zeros_use_normal_approximation() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [1.0, 3.0, 5.0, 7.0, 9.0, 11.0];

        let outcome = wilcoxon_signed_rank(&a, &b).unwrap();
        // n = 5 after dropping the zero, T = 0, z = -7.5 / sqrt(13.75)
        let z: f64 = -7.5 / 13.75f64.sqrt();
        let expected = 2.0 * standard_normal().unwrap().cdf(z);
        assert_eq!(outcome.statistic, 0.0);
        assert!((outcome.p_value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ties_reduce_variance() {
        let a = [2.0, 3.0, 4.0, 1.0];
        let b = [1.0, 2.0, 2.0, 3.0];

        // d = [1, 1, 2, -2]; ranks 1.5, 1.5, 3.5, 3.5; R- = 3.5
        let outcome = wilcoxon_signed_rank(&a, &b).unwrap();
        assert_eq!(outcome.statistic, 3.5);
        let variance = 4.0 * 5.0 * 9.0 / 24.0 - 12.0 / 48.0;
        let z = (3.5 - 5.0) / f64::sqrt(variance);
        let expected = 2.0 * standard_normal().unwrap().cdf(z);
        assert!((outcome.p_value - expected).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            wilcoxon_signed_rank(&[1.0, 2.0], &[1.0, 2.0]),
            Err(StatsError::Degenerate(_))
        ));
        assert_eq!(
            wilcoxon_signed_rank(&[1.0], &[1.0, 2.0]),
            Err(StatsError::UnequalLengths(1, 2))
        );
    }
}
