use super::{average_ranks, chi2_sf, tie_sum, TestOutcome};
use crate::error::StatsError;

/// Friedman chi-square test for k related samples
///
/// `samples[j][i]` is participant i under condition j. Ranks are taken within
/// each participant, with average ranks for ties and the usual tie correction.
pub fn friedman(samples: &[Vec<f64>]) -> Result<TestOutcome, StatsError> {
    let k = samples.len();
    if k < 3 {
        return Err(StatsError::InsufficientData(format!(
            "friedman needs at least 3 samples, got {}",
            k
        )));
    }
    let n = samples[0].len();
    if let Some(other) = samples.iter().find(|s| s.len() != n) {
        return Err(StatsError::UnequalLengths(n, other.len()));
    }
    if n == 0 {
        return Err(StatsError::InsufficientData("no participants".to_string()));
    }

    let mut rank_sums = vec![0.0; k];
    let mut ties = 0.0;
    for i in 0..n {
        let row: Vec<f64> = samples.iter().map(|s| s[i]).collect();
        let (ranks, tie_groups) = average_ranks(&row);
        for (sum, rank) in rank_sums.iter_mut().zip(&ranks) {
            *sum += rank;
        }
        ties += tie_sum(&tie_groups);
    }

    let (kf, nf) = (k as f64, n as f64);
    let correction = 1.0 - ties / (kf * (kf * kf - 1.0) * nf);
    if correction <= 0.0 {
        return Err(StatsError::Degenerate(
            "all values are tied within every participant".to_string(),
        ));
    }

    let ssbn: f64 = rank_sums.iter().map(|r| r * r).sum();
    let statistic =
        (12.0 / (kf * nf * (kf + 1.0)) * ssbn - 3.0 * nf * (kf + 1.0)) / correction;
    let p_value = chi2_sf(statistic, kf - 1.0)?;

    Ok(TestOutcome { statistic, p_value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistent_ordering() {
        let samples = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![2.0, 3.0, 4.0, 5.0],
            vec![3.0, 4.0, 5.0, 6.0],
        ];

        let outcome = friedman(&samples).unwrap();
        assert!((outcome.statistic - 8.0).abs() < 1e-12);
        assert!((outcome.p_value - (-4.0f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn test_tie_correction() {
        let samples = vec![
            vec![1.0, 1.0, 1.0],
            vec![2.0, 2.0, 1.0],
            vec![3.0, 1.0, 2.0],
        ];

        let outcome = friedman(&samples).unwrap();
        let ranks = [1.0 + 1.5 + 1.5, 2.0 + 3.0 + 1.5, 3.0 + 1.5 + 3.0];
        let ssbn: f64 = ranks.iter().map(|r| r * r).sum();
        let expected = (12.0 / 36.0 * ssbn - 36.0) / (1.0 - 12.0 / 72.0);
        assert!((outcome.statistic - expected).abs() < 1e-12);
        assert!(outcome.p_value > 0.0 && outcome.p_value <= 1.0);
    }

    #[test]
    fn test_all_tied_is_degenerate() {
        let samples = vec![vec![5.0, 2.0], vec![5.0, 2.0], vec![5.0, 2.0]];
        assert!(matches!(friedman(&samples), Err(StatsError::Degenerate(_))));
    }

    #[test]
    fn test_input_validation() {
        assert!(matches!(
            friedman(&[vec![1.0], vec![2.0]]),
            Err(StatsError::InsufficientData(_))
        ));
        assert_eq!(
            friedman(&[vec![1.0, 2.0], vec![2.0], vec![3.0, 1.0]]),
            Err(StatsError::UnequalLengths(2, 1))
        );
        assert!(matches!(
            friedman(&[vec![], vec![], vec![]]),
            Err(StatsError::InsufficientData(_))
        ));
    }
}
