//! Trailing arithmetic mean.
//!
//! MEAN(w)[n] = sum(x[n-w..n]) / w, or the mean of the whole sequence when it
//! is shorter than `w`. No padding, no warmup invalidation.

/// Mean of the last `window` values. `None` for an empty sequence or a zero window.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}
