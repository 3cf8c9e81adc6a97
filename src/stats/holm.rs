/// Holm step-down adjusted p-values, in input order
///
/// The ascending p-values are multiplied by (m − rank), made monotone by a
/// running maximum and capped at 1.
pub fn holm(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    let mut adjusted = vec![0.0; m];
    let mut running_max: f64 = 0.0;
    for (rank, &idx) in order.iter().enumerate() {
        let scaled = ((m - rank) as f64 * p_values[idx]).min(1.0);
        running_max = running_max.max(scaled);
        adjusted[idx] = running_max;
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn test_reference_values() {
        // statsmodels multipletests(method="holm")
        let adjusted = holm(&[0.01, 0.04, 0.03]);
        assert!(close(&adjusted, &[0.03, 0.06, 0.06]));
    }

    #[test]
    fn test_capped_at_one() {
        let adjusted = holm(&[0.5, 0.9, 0.7]);
        assert!(adjusted.iter().all(|&p| p <= 1.0));
        assert!(close(&adjusted, &[1.0, 1.0, 1.0]));
    }

    #[test]
    fn test_monotone_and_not_below_raw() {
        let raw = [0.002, 0.2, 0.011, 0.049, 0.0004];
        let adjusted = holm(&raw);

        for (r, a) in raw.iter().zip(&adjusted) {
            assert!(a >= r);
        }

        let mut pairs: Vec<(f64, f64)> = raw.iter().copied().zip(adjusted.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for window in pairs.windows(2) {
            assert!(window[1].1 >= window[0].1);
        }
    }

    #[test]
    fn test_empty_and_single() {
        assert!(holm(&[]).is_empty());
        assert!(close(&holm(&[0.02]), &[0.02]));
    }
}
