//! Shapiro–Wilk normality test
//!
//! Royston's approximation (algorithm AS R94): polynomial approximations of
//! the coefficients for n ≥ 4, the exact coefficient for n = 3, and a normal
//! approximation of the transformed W for the p-value.

use super::{standard_normal, TestOutcome};
use crate::error::StatsError;
use statrs::distribution::ContinuousCDF;
use std::f64::consts::PI;

const MAX_N: usize = 5000;
const SMALL: f64 = 1e-19;

const C1: [f64; 6] = [0.0, 0.221157, -0.147981, -2.071190, 4.434685, -2.706056];
const C2: [f64; 6] = [0.0, 0.042981, -0.293762, -1.752461, 5.682633, -3.582633];
const C3: [f64; 4] = [0.544, -0.39978, 0.025054, -6.714e-4];
const C4: [f64; 4] = [1.3822, -0.77857, 0.062767, -0.0020322];
const C5: [f64; 4] = [-1.5861, -0.31082, -0.083751, 0.0038915];
const C6: [f64; 3] = [-0.4803, -0.082676, 0.0030302];
const G: [f64; 2] = [-2.273, 0.459];

/// Shapiro–Wilk W and p-value for 3 ≤ n ≤ 5000
pub fn shapiro_wilk(sample: &[f64]) -> Result<TestOutcome, StatsError> {
    let n = sample.len();
    if n < 3 {
        return Err(StatsError::InsufficientData(format!(
            "shapiro-wilk needs at least 3 values, got {}",
            n
        )));
    }
    if n > MAX_N {
        return Err(StatsError::InsufficientData(format!(
            "shapiro-wilk supports at most {} values, got {}",
            MAX_N, n
        )));
    }

    let mut x = sample.to_vec();
    x.sort_by(f64::total_cmp);
    if x[n - 1] - x[0] < SMALL {
        return Err(StatsError::ZeroRange);
    }

    let a = coefficients(n)?;

    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq: f64 = x.iter().map(|v| (v - mean) * (v - mean)).sum();
    let b: f64 = a
        .iter()
        .enumerate()
        .map(|(i, ai)| ai * (x[n - 1 - i] - x[i]))
        .sum();
    let w = (b * b / ssq).min(1.0);

    let p_value = p_value(n, w)?;
    Ok(TestOutcome {
        statistic: w,
        p_value,
    })
}

/// Upper half of the antisymmetric coefficient vector, largest first
fn coefficients(n: usize) -> Result<Vec<f64>, StatsError> {
    let half = n / 2;
    if n == 3 {
        return Ok(vec![0.5f64.sqrt()]);
    }

    let normal = standard_normal()?;
    let an25 = n as f64 + 0.25;
    let m: Vec<f64> = (1..=half)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / an25))
        .collect();
    let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
    let ssumm2 = summ2.sqrt();
    let rsn = 1.0 / (n as f64).sqrt();

    let mut a = vec![0.0; half];
    let a1 = poly(&C1, rsn) - m[0] / ssumm2;
    a[0] = a1;

    let (first, fac) = if n > 5 {
        let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
        a[1] = a2;
        let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1])
            / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2))
            .sqrt();
        (2, fac)
    } else {
        let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
        (1, fac)
    };
    for i in first..half {
        a[i] = -m[i] / fac;
    }

    Ok(a)
}

fn p_value(n: usize, w: f64) -> Result<f64, StatsError> {
    if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - 0.75f64.sqrt().asin());
        return Ok(p.clamp(0.0, 1.0));
    }

    let an = n as f64;
    let w1 = (1.0 - w).ln();
    let (y, m, s) = if n <= 11 {
        let gamma = poly(&G, an);
        if w1 >= gamma {
            return Ok(1e-99);
        }
        (-(gamma - w1).ln(), poly(&C3, an), poly(&C4, an).exp())
    } else {
        let xx = an.ln();
        (w1, poly(&C5, xx), poly(&C6, xx).exp())
    };

    let normal = standard_normal()?;
    Ok((1.0 - normal.cdf((y - m) / s)).clamp(0.0, 1.0))
}

/// c[0] + c[1]·x + c[2]·x² + …
fn poly(c: &[f64], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, coef| acc * x + coef)
}
