//! Change detection over a store's time axis.

use hydro_common::TimeStep;

/// Steps updated after `watermark`, in input order.
///
/// With `cap = Some(n)` only the last `n` of those are kept; a zero cap means
/// no cap. Steps whose update time is not a number never compare greater and
/// are skipped.
pub fn select_changes(steps: &[TimeStep], watermark: f64, cap: Option<usize>) -> Vec<TimeStep> {
    let changed: Vec<TimeStep> = steps
        .iter()
        .filter(|step| step.update_time > watermark)
        .copied()
        .collect();

    match cap {
        Some(n) if n > 0 && n < changed.len() => changed[changed.len() - n..].to_vec(),
        _ => changed,
    }
}
