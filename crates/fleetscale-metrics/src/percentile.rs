//! Exclusive-method quantiles.
//!
//! The rank of percentile `p` over `n` sorted samples is `p/100 × (n+1)`.
//! The value is interpolated between the two samples around that rank.
//! Ranks outside `[1, n]` are not clamped to the extremes: the first (or
//! last) pair of samples is extended linearly, so a high percentile over a
//! small set can land above the largest sample.

/// Percentile `percentile` (1..=99) of ascending `sorted` samples.
///
/// Returns `None` for an empty set and the sole value for a single sample.
pub fn exclusive_quantile(sorted: &[f64], percentile: u32) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        len => {
            let n = len as i64;
            let p = i64::from(percentile);
            let m = n + 1;
            let j = (p * m / 100).clamp(1, n - 1);
            let delta = p * m - j * 100;
            let lo = sorted[(j - 1) as usize];
            let hi = sorted[j as usize];
            Some((lo * (100 - delta) as f64 + hi * delta as f64) / 100.0)
        }
    }
}
