//! Pure transforms applied to the current column before the derived metrics.
//!
//! Order matters: polarity normalization first, then the optional baseline
//! removal, then smoothing.
use crate::drivers::ProcessingError;
/// Negates every value. Used for meters wired with the opposite sign convention.
pub fn invert_polarity(data: &[f64]) -> Vec<f64> {
    data.iter().map(|v| -v).collect()
}
/// Centered moving average with a window that shrinks at the edges.
///
/// Output `i` is the mean of `data[max(0, i-k)..=min(n-1, i+k)]`. The divisor
/// is the number of entries actually in range, never `2k + 1`, and nothing is
/// padded or wrapped.
pub fn moving_average(data: &[f64], half_window: usize) -> Vec<f64> {
    let n = data.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half_window);
            let hi = i.saturating_add(half_window).min(n - 1);
            let window = &data[lo..=hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}
/// Subtracts the mean of every sample taken at or before `delay_s`.
///
/// Fails when no sample qualifies, since there is nothing to average.
pub fn remove_baseline_offset(
    data: &[f64],
    elapsed_s: &[f64],
    delay_s: f64,
) -> Result<Vec<f64>, ProcessingError> {
    if data.len() != elapsed_s.len() {
        return Err(ProcessingError::LengthMismatch {
            expected: elapsed_s.len(),
            actual: data.len(),
        });
    }
    let (sum, count) = data
        .iter()
        .zip(elapsed_s)
        .filter(|(_, t)| **t <= delay_s)
        .fold((0.0_f64, 0usize), |(sum, count), (v, _)| (sum + v, count + 1));
    if count == 0 {
        return Err(ProcessingError::NoBaselineSamples { delay_s });
    }
    let offset = sum / count as f64;
    Ok(data.iter().map(|v| v - offset).collect())
}
