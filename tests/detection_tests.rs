//! 事件检测集成测试
//!
//! 固定向量的期望结果与任意信号上的不变量。

use proptest::prelude::*;
use spcal::core::limits::Threshold;
use spcal::{SpcalError, accumulate};

fn x() -> Vec<f64> {
    vec![2.0, 1.0, 2.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0, 2.0]
}

#[test]
fn test_equal_limits_split_regions() {
    let result = accumulate(&x(), &1.0.into(), &1.0.into()).unwrap();
    assert_eq!(result.sums, vec![2.0, 4.0, 2.0]);
    assert_eq!(result.labels, vec![1, 0, 2, 2, 0, 0, 0, 0, 0, 3]);
    assert_eq!(result.regions, vec![[0, 1], [2, 4], [9, 9]]);
}

#[test]
fn test_low_critical_value_merges_regions() {
    let result = accumulate(&x(), &0.0.into(), &1.0.into()).unwrap();
    assert_eq!(result.sums, vec![8.0, 2.0]);
    assert_eq!(result.labels, vec![1, 1, 1, 1, 1, 0, 0, 0, 0, 2]);
    assert_eq!(result.regions, vec![[0, 5], [9, 9]]);
}

#[test]
fn test_critical_value_above_detection_limit() {
    assert!(matches!(
        accumulate(&x(), &1.0.into(), &0.0.into()),
        Err(SpcalError::InvalidParameters(_))
    ));
}

#[test]
fn test_nothing_detected() {
    for (lc, ld) in [(3.0, 3.0), (0.0, 3.0)] {
        let result = accumulate(&x(), &lc.into(), &ld.into()).unwrap();
        assert!(result.sums.is_empty());
        assert!(result.regions.is_empty());
        assert!(result.labels.iter().all(|&l| l == 0));
    }
}

#[test]
fn test_events_are_inclusive_spans() {
    let result = accumulate(&x(), &1.0.into(), &1.0.into()).unwrap();
    let spans: Vec<(usize, usize)> = result.events().map(|e| (e.start, e.end)).collect();
    assert_eq!(spans, vec![(0, 0), (2, 3), (9, 9)]);
    assert_eq!(result.maxima(&x()), vec![2.0, 2.0, 2.0]);
}

#[test]
fn test_profile_threshold_length_mismatch() {
    let lc = Threshold::Profile(vec![1.0; 3]);
    let ld = Threshold::Profile(vec![1.0; 3]);
    assert!(matches!(
        accumulate(&x(), &lc, &ld),
        Err(SpcalError::InvalidParameters(_))
    ));
}

fn case() -> impl Strategy<Value = (Vec<f64>, f64, f64)> {
    (
        prop::collection::vec(0u8..10, 0..64),
        0u8..10,
        0u8..5,
    )
        .prop_map(|(values, lc, extra)| {
            let signal = values.into_iter().map(f64::from).collect();
            let lc = f64::from(lc) + 0.5;
            (signal, lc, lc + f64::from(extra))
        })
}

proptest! {
    #[test]
    fn prop_sums_match_event_spans((signal, lc, ld) in case()) {
        let result = accumulate(&signal, &lc.into(), &ld.into()).unwrap();
        for event in result.events() {
            let expected: f64 = signal[event.start..=event.end].iter().sum();
            prop_assert_eq!(event.sum, expected);
        }
    }

    #[test]
    fn prop_count_equals_max_label((signal, lc, ld) in case()) {
        let result = accumulate(&signal, &lc.into(), &ld.into()).unwrap();
        let max_label = result.labels.iter().copied().max().unwrap_or(0);
        prop_assert_eq!(result.sums.len(), max_label);
        prop_assert_eq!(result.regions.len(), result.sums.len());
    }

    #[test]
    fn prop_labels_cover_exactly_the_events((signal, lc, ld) in case()) {
        let result = accumulate(&signal, &lc.into(), &ld.into()).unwrap();
        let mut expected = vec![0usize; signal.len()];
        for (i, event) in result.events().enumerate() {
            prop_assert!(signal[event.start..=event.end].iter().any(|&v| v > ld));
            prop_assert!(signal[event.start..=event.end].iter().all(|&v| v > lc));
            expected[event.start..=event.end].fill(i + 1);
        }
        prop_assert_eq!(result.labels, expected);
    }
}
