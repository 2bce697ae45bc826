//! Unbiased pass@k estimator.

/// `1 - C(n-c, k) / C(n, k)`: the probability that at least one of `k`
/// samples drawn without replacement from `n` (of which `c` pass) passes.
///
/// Computed as `1 - prod_{i=n-c+1}^{n} (1 - k/i)` to stay clear of huge
/// binomials. Callers must ensure `k <= n`; `c` is clamped to `n`.
pub fn pass_at_k(n: usize, c: usize, k: usize) -> f64 {
    let c = c.min(n);
    if n - c < k {
        return 1.0;
    }
    let failing_draws: f64 = ((n - c + 1)..=n)
        .map(|i| 1.0 - k as f64 / i as f64)
        .product();
    1.0 - failing_draws
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_pass_at_1_is_success_rate() {
        assert!(close(pass_at_k(3, 1, 1), 1.0 / 3.0));
        assert!(close(pass_at_k(10, 0, 1), 0.0));
        assert!(close(pass_at_k(4, 4, 1), 1.0));
    }

    #[test]
    fn test_pass_at_k_matches_binomial_form() {
        // 1 - C(3,2)/C(5,2) = 1 - 3/10
        assert!(close(pass_at_k(5, 2, 2), 0.7));
        // 1 - C(2,3)/C(3,3) with n-c < k
        assert!(close(pass_at_k(3, 1, 3), 1.0));
    }

    #[test]
    fn test_more_passes_never_lowers_score() {
        let scores: Vec<f64> = (0..=6).map(|c| pass_at_k(6, c, 3)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }
}
