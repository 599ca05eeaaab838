//! Fingerprint similarity via bounded dynamic time warping.
//!
//! Two fingerprints of the same recording rarely match element-for-element:
//! a different encoder, bitrate or a few hundred milliseconds of extra
//! silence shifts and perturbs the sequence. DTW aligns the sequences
//! non-linearly and sums the absolute difference along the cheapest path.
//!
//! The score is `1 - cost / max_possible` where `max_possible` is the
//! longest sequence length multiplied by the largest per-element cost
//! (`u32::MAX`). Only two rolling rows are kept, so memory is
//! `O(min(n, m))` while time is `O(n * m)` in the worst case. Whenever every
//! cell of a row is already more expensive than the cost budget implied by
//! the threshold, the comparison gives up early.

use std::cmp::Ordering;

/// Threshold used to size the early-exit cost budget.
pub const DEFAULT_THRESHOLD: f64 = 0.95;
/// Similarity at or above which two fingerprints are the same recording.
pub const ACCEPT_THRESHOLD: f64 = 0.99;

const INFINITY: u64 = u64::MAX;

/// Compare two decoded fingerprints, returning a score in `[0, 1]`.
///
/// Identical sequences score exactly `1.0`. Empty sequences are never
/// similar to anything (including each other) and score `0.0`. The result is
/// symmetric: `similarity(a, b, t) == similarity(b, a, t)`.
///
/// If the alignment cost provably exceeds what `threshold` allows, the
/// function returns early with a score strictly below `threshold`.
///
/// ```
/// use shelver_fingerprint::{DEFAULT_THRESHOLD, similarity};
///
/// let a = [1, 2, 3, 4, 5];
/// assert_eq!(similarity(&a, &a, DEFAULT_THRESHOLD), 1.0);
/// assert_eq!(similarity(&a, &[], DEFAULT_THRESHOLD), 0.0);
/// ```
pub fn similarity(a: &[u32], b: &[u32], threshold: f64) -> f64 {
    dtw(a, b, threshold).0
}

/// Returns the score alongside the number of rows evaluated.
fn dtw(a: &[u32], b: &[u32], threshold: f64) -> (f64, usize) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 0);
    }
    // Canonical orientation: the longer sequence is iterated as rows and the
    // shorter one is held in the rolling buffers. Ties are broken by content
    // so that swapping the arguments walks the exact same matrix, early exit
    // included.
    let (outer, inner) = match a.len().cmp(&b.len()).then_with(|| a.cmp(b)) {
        Ordering::Less => (b, a),
        _ => (a, b),
    };
    let threshold = if threshold.is_nan() { DEFAULT_THRESHOLD } else { threshold.clamp(0.0, 1.0) };
    let max_possible = outer.len() as f64 * f64::from(u32::MAX);
    let max_cost = (1.0 - threshold) * max_possible;

    let m = inner.len();
    let mut prev = vec![INFINITY; m + 1];
    let mut curr = vec![INFINITY; m + 1];
    prev[0] = 0;

    for (i, &x) in outer.iter().enumerate() {
        curr[0] = INFINITY;
        let mut row_min = INFINITY;
        for (j, &y) in inner.iter().enumerate() {
            let cost = u64::from(x.abs_diff(y));
            let best = prev[j + 1].min(curr[j]).min(prev[j]);
            curr[j + 1] = best.saturating_add(cost);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min as f64 > max_cost {
            // Every path through this row is already over budget, so the
            // full result could only be lower than this.
            let bounded = (1.0 - max_cost / max_possible).next_down();
            return (bounded.clamp(0.0, 1.0), i + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let score = 1.0 - prev[m] as f64 / max_possible;
    (score.clamp(0.0, 1.0), outer.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample(len: usize, seed: u32) -> Vec<u32> {
        // Cheap deterministic pseudo-random sequence (xorshift).
        let mut state = seed.max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            })
            .collect()
    }

    #[test]
    fn test_identical_is_one() {
        let a = sample(300, 7);
        assert_eq!(similarity(&a, &a, DEFAULT_THRESHOLD), 1.0);
        assert_eq!(similarity(&a, &a, ACCEPT_THRESHOLD), 1.0);
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&[1, 2, 3], &[])]
    #[case(&[], &[1, 2, 3])]
    fn test_empty_is_dissimilar(#[case] a: &[u32], #[case] b: &[u32]) {
        assert_eq!(similarity(a, b, DEFAULT_THRESHOLD), 0.0);
    }

    #[rstest]
    #[case(sample(50, 1), sample(50, 2))]
    #[case(sample(80, 3), sample(40, 4))]
    #[case(sample(10, 5), sample(200, 6))]
    #[case(vec![0, 0, 0], vec![u32::MAX, u32::MAX])]
    #[case(vec![5, 6, 7], vec![5, 6, 8])]
    fn test_symmetric(#[case] a: Vec<u32>, #[case] b: Vec<u32>) {
        for threshold in [0.0, 0.5, DEFAULT_THRESHOLD, ACCEPT_THRESHOLD, 1.0] {
            assert_eq!(similarity(&a, &b, threshold), similarity(&b, &a, threshold));
        }
    }

    #[rstest]
    #[case(sample(64, 11), sample(64, 12))]
    #[case(sample(3, 13), sample(90, 14))]
    #[case(vec![u32::MAX; 5], vec![0; 9])]
    fn test_bounded(#[case] a: Vec<u32>, #[case] b: Vec<u32>) {
        for threshold in [0.0, DEFAULT_THRESHOLD, 1.0] {
            let score = similarity(&a, &b, threshold);
            assert!((0.0..=1.0).contains(&score), "{score} out of bounds");
        }
    }

    #[test]
    fn test_time_shifted_copy_is_accepted() {
        // Same content with a couple of duplicated frames (time stretch).
        let a = sample(400, 21);
        let mut b = a.clone();
        b.insert(100, b[100]);
        b.insert(250, b[250]);
        let score = similarity(&a, &b, DEFAULT_THRESHOLD);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_small_perturbation_stays_above_cutoff() {
        let a = sample(200, 31);
        let b: Vec<u32> = a.iter().map(|v| v.saturating_add(1_000)).collect();
        assert!(similarity(&a, &b, DEFAULT_THRESHOLD) >= ACCEPT_THRESHOLD);
    }

    #[test]
    fn test_early_exit_on_maximal_difference() {
        let n = 5_000;
        let a = vec![0u32; n];
        let b = vec![u32::MAX; n];
        let (score, rows) = dtw(&a, &b, DEFAULT_THRESHOLD);
        assert!(score < ACCEPT_THRESHOLD);
        assert!(score < DEFAULT_THRESHOLD);
        // Row `i` can't cost less than `i * u32::MAX`, so the budget of
        // `0.05 * n * u32::MAX` is blown just after 5% of the rows.
        assert!(rows <= n / 20 + 1, "evaluated {rows} rows");
    }

    #[test]
    fn test_unrelated_fingerprints_rejected() {
        let a = sample(120, 41);
        let b = sample(120, 42);
        assert!(similarity(&a, &b, DEFAULT_THRESHOLD) < ACCEPT_THRESHOLD);
    }

    #[test]
    fn test_deterministic() {
        let a = sample(90, 51);
        let b = sample(70, 52);
        assert_eq!(similarity(&a, &b, DEFAULT_THRESHOLD), similarity(&a, &b, DEFAULT_THRESHOLD));
    }
}
