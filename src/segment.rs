//! Quantile-based value tiers

use crate::error::{CltvError, CltvResult};

/// Linear-interpolation quantile of an ascending slice, `q` in `[0, 1]`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Segment label for tier `index` out of `count`, lowest tier first.
///
/// The top tier is always `A`, so four tiers read D, C, B, A.
pub fn segment_label(index: usize, count: usize) -> String {
    let offset = (count - 1 - index) as u8;
    char::from(b'A' + offset).to_string()
}

/// Cut `values` into `count` tiers of roughly equal size.
///
/// Returns the tier index of each value (0 = lowest). A value equal to a
/// quantile boundary goes to the lower tier.
pub fn assign_segments(values: &[f64], count: usize) -> CltvResult<Vec<usize>> {
    if !(2..=26).contains(&count) {
        return Err(CltvError::InvalidSegmentCount(count));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(CltvError::DegenerateInput(
            "segment values must be finite".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() < count {
        return Err(CltvError::InsufficientData(format!(
            "{} distinct values cannot form {count} segments",
            distinct.len()
        )));
    }

    let boundaries: Vec<f64> = (1..count)
        .map(|i| quantile(&sorted, i as f64 / count as f64))
        .collect();
    if boundaries.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CltvError::InsufficientData(
            "quantile boundaries coincide".to_string(),
        ));
    }

    Ok(values
        .iter()
        .map(|&v| boundaries.iter().filter(|&&edge| v > edge).count())
        .collect())
}

/// Aggregate view of one tier.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub segment: String,
    pub count: usize,
    pub mean_clv: f64,
    pub sum_clv: f64,
}

/// Count, mean and sum of `values` per tier, highest tier first.
pub fn summarize_segments(values: &[f64], segments: &[usize], count: usize) -> Vec<SegmentSummary> {
    let mut totals = vec![(0usize, 0.0f64); count];
    for (&value, &segment) in values.iter().zip(segments) {
        if let Some(slot) = totals.get_mut(segment) {
            slot.0 += 1;
            slot.1 += value;
        }
    }

    totals
        .into_iter()
        .enumerate()
        .rev()
        .map(|(index, (n, sum))| SegmentSummary {
            segment: segment_label(index, count),
            count: n,
            mean_clv: if n > 0 { sum / n as f64 } else { 0.0 },
            sum_clv: sum,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
        assert_eq!(quantile(&sorted, 0.5), 2.5);
        assert_eq!(quantile(&sorted, 0.25), 1.75);
    }

    #[test]
    fn test_labels() {
        let labels: Vec<String> = (0..4).map(|i| segment_label(i, 4)).collect();
        assert_eq!(labels, vec!["D", "C", "B", "A"]);
        assert_eq!(segment_label(2, 3), "A");
    }

    #[test]
    fn test_balanced_quartiles() {
        let values: Vec<f64> = (1..=100).map(f64::from).rev().collect();
        let segments = assign_segments(&values, 4).unwrap();

        let mut counts = [0usize; 4];
        for &s in &segments {
            counts[s] += 1;
        }
        assert_eq!(counts, [25, 25, 25, 25]);
        // values are descending, so the first is top tier
        assert_eq!(segments[0], 3);
        assert_eq!(segments[99], 0);
    }

    #[test]
    fn test_boundary_ties_go_low() {
        // boundaries at 2.0, 3.0, 4.0
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let segments = assign_segments(&values, 4).unwrap();
        assert_eq!(segments, vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_segment_ranges_are_ordered() {
        let values: Vec<f64> = (0..37).map(|i| ((i * 17) % 37) as f64 * 1.5).collect();
        let segments = assign_segments(&values, 4).unwrap();

        for tier in 0..3 {
            let max_low = values
                .iter()
                .zip(&segments)
                .filter(|(_, &s)| s == tier)
                .map(|(&v, _)| v)
                .fold(f64::NEG_INFINITY, f64::max);
            let min_high = values
                .iter()
                .zip(&segments)
                .filter(|(_, &s)| s == tier + 1)
                .map(|(&v, _)| v)
                .fold(f64::INFINITY, f64::min);
            assert!(max_low < min_high);
        }
    }

    #[test]
    fn test_too_few_distinct_values() {
        let values = [1.0, 1.0, 2.0, 2.0, 3.0];
        assert!(matches!(
            assign_segments(&values, 4),
            Err(CltvError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_coinciding_boundaries() {
        let values = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0];
        assert!(matches!(
            assign_segments(&values, 4),
            Err(CltvError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_invalid_segment_count() {
        assert_eq!(
            assign_segments(&[1.0, 2.0], 1).unwrap_err(),
            CltvError::InvalidSegmentCount(1)
        );
        assert_eq!(
            assign_segments(&[1.0, 2.0], 27).unwrap_err(),
            CltvError::InvalidSegmentCount(27)
        );
    }

    #[test]
    fn test_summarize_segments() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let segments = assign_segments(&values, 4).unwrap();
        let summary = summarize_segments(&values, &segments, 4);

        assert_eq!(summary.len(), 4);
        assert_eq!(summary[0].segment, "A");
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].sum_clv, 15.0);
        assert_eq!(summary[0].mean_clv, 7.5);
        assert_eq!(summary[3].segment, "D");
        assert_eq!(summary.iter().map(|s| s.count).sum::<usize>(), 8);
        assert!(summary.windows(2).all(|w| w[0].mean_clv >= w[1].mean_clv));
    }
}
