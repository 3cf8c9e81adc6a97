use super::chi2_sf;
use crate::error::StatsError;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Eigenvalues at or below this are treated as zero
const EIGEN_TOLERANCE: f64 = 0.001;

/// Result of Mauchly's sphericity test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericityOutcome {
    pub spherical: bool,
    /// Mauchly's W; absent when sphericity holds trivially
    pub w: Option<f64>,
    pub chi2: Option<f64>,
    pub dof: f64,
    pub p_value: f64,
}

/// Mauchly's test on an n × k participant × condition matrix
///
/// Uses the double-centred sample covariance. With two conditions sphericity
/// is always met and the test is not computed.
pub fn mauchly(rows: &[Vec<f64>], alpha: f64) -> Result<SphericityOutcome, StatsError> {
    let n = rows.len();
    let k = rows.first().map(|r| r.len()).unwrap_or(0);
    if k < 2 {
        return Err(StatsError::InsufficientData(format!(
            "sphericity needs at least 2 conditions, got {}",
            k
        )));
    }
    if let Some(row) = rows.iter().find(|r| r.len() != k) {
        return Err(StatsError::UnequalLengths(k, row.len()));
    }
    if k == 2 {
        return Ok(SphericityOutcome {
            spherical: true,
            w: None,
            chi2: None,
            dof: 1.0,
            p_value: 1.0,
        });
    }
    if n < 2 {
        return Err(StatsError::InsufficientData(format!(
            "sphericity needs at least 2 participants, got {}",
            n
        )));
    }

    let data = DMatrix::from_fn(n, k, |i, j| rows[i][j]);
    let covariance = sample_covariance(&data);

    let row_means: Vec<f64> = (0..k).map(|i| covariance.row(i).mean()).collect();
    let col_means: Vec<f64> = (0..k).map(|j| covariance.column(j).mean()).collect();
    let grand_mean = covariance.mean();
    let centred = DMatrix::from_fn(k, k, |i, j| {
        covariance[(i, j)] - row_means[i] - col_means[j] + grand_mean
    });

    let mut eigenvalues: Vec<f64> = SymmetricEigen::new(centred).eigenvalues.iter().copied().collect();
    eigenvalues.sort_by(f64::total_cmp);
    let eigenvalues: Vec<f64> = eigenvalues
        .into_iter()
        .skip(1)
        .filter(|&e| e > EIGEN_TOLERANCE)
        .collect();
    if eigenvalues.is_empty() {
        return Err(StatsError::Degenerate(
            "covariance of condition differences is zero".to_string(),
        ));
    }

    let d = (k - 1) as f64;
    let nf = n as f64;
    let product: f64 = eigenvalues.iter().product();
    let sum: f64 = eigenvalues.iter().sum();
    let w = product / (sum / d).powf(d);

    let f = 1.0 - (2.0 * d * d + d + 2.0) / (6.0 * d * (nf - 1.0));
    let chi2 = -w.ln() * f * (nf - 1.0);
    let dof = d * (d + 1.0) / 2.0 - 1.0;
    let p_value = chi2_sf(chi2, dof)?;

    Ok(SphericityOutcome {
        spherical: p_value > alpha,
        w: Some(w),
        chi2: Some(chi2),
        dof,
        p_value,
    })
}

fn sample_covariance(data: &DMatrix<f64>) -> DMatrix<f64> {
    let (n, k) = data.shape();
    let means: Vec<f64> = (0..k).map(|j| data.column(j).mean()).collect();
    let centred = DMatrix::from_fn(n, k, |i, j| data[(i, j)] - means[j]);
    (centred.transpose() * &centred) / (n as f64 - 1.0)
}
