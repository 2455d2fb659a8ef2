use super::*;

fn event(start: f64, duration: f64) -> ApneaEvent {
    ApneaEvent {
        start_time: start,
        end_time: start + duration,
        duration,
        trough_rms: 0.0,
    }
}

fn evenly_spaced(count: usize, duration: f64, span: f64) -> Vec<ApneaEvent> {
    let spacing = span / count as f64;
    (0..count)
        .map(|i| event(i as f64 * spacing, duration))
        .collect()
}

fn aggregator(window: f64, step: f64, assignment: WindowAssignment) -> AhiAggregator {
    AhiAggregator::new(window, step, SeverityThresholds::default(), assignment)
}

#[test]
fn test_severity_boundaries_exact() {
    let t = SeverityThresholds::default();
    assert_eq!(Severity::classify(4.999, &t), Severity::Normal);
    assert_eq!(Severity::classify(5.0, &t), Severity::Mild);
    assert_eq!(Severity::classify(14.999, &t), Severity::Mild);
    assert_eq!(Severity::classify(15.0, &t), Severity::Moderate);
    assert_eq!(Severity::classify(29.999, &t), Severity::Moderate);
    assert_eq!(Severity::classify(30.0, &t), Severity::Severe);
    assert_eq!(Severity::classify(0.0, &t), Severity::Normal);
}

#[test]
fn test_severity_levels() {
    assert_eq!(Severity::Normal.level(), 0);
    assert_eq!(Severity::Severe.level(), 3);
    assert!(Severity::Mild < Severity::Moderate);
    assert_eq!(Severity::Moderate.label(), "Moderate");
}

#[test]
fn test_window_grid_and_truncated_tail() {
    let result = AhiAggregator::default().aggregate(&[], 5_400.0).unwrap();

    // Starts 0, 300, ..., 5100
    assert_eq!(result.timeline.len(), 18);
    let first = result.timeline[0];
    assert_eq!((first.window_start, first.window_end), (0.0, 3_600.0));
    let last = result.timeline[17];
    assert_eq!((last.window_start, last.window_end), (5_100.0, 5_400.0));
    assert_eq!(result.overall_ahi, 0.0);
    assert_eq!(result.severity, Severity::Normal);
}

#[test]
fn test_truncated_window_rate_uses_true_length() {
    // One event in the final 300 s window of a 65 min recording
    let events = vec![event(3_800.0, 20.0)];
    let result = AhiAggregator::default().aggregate(&events, 3_900.0).unwrap();

    let tail = result.timeline.last().unwrap();
    assert_eq!(tail.window_start, 3_600.0);
    assert_eq!(tail.window_end, 3_900.0);
    assert_eq!(tail.event_count, 1);
    assert!((tail.windowed_ahi - 12.0).abs() < 1e-9);
}

#[test]
fn test_additivity_with_step_equal_window() {
    let events = evenly_spaced(37, 12.0, 3.0 * 3_600.0);
    let result = aggregator(3_600.0, 3_600.0, WindowAssignment::Midpoint)
        .aggregate(&events, 3.0 * 3_600.0)
        .unwrap();

    assert_eq!(result.timeline.len(), 3);
    let total: usize = result.timeline.iter().map(|w| w.event_count).sum();
    assert_eq!(total, events.len());

    let result = aggregator(3_600.0, 3_600.0, WindowAssignment::MajorityOverlap)
        .aggregate(&events, 3.0 * 3_600.0)
        .unwrap();
    let total: usize = result.timeline.iter().map(|w| w.event_count).sum();
    assert_eq!(total, events.len());
}

#[test]
fn test_midpoint_assignment_at_boundary() {
    // Midpoint exactly at 3600 belongs to the second window
    let events = vec![event(3_590.0, 20.0)];
    let result = aggregator(3_600.0, 3_600.0, WindowAssignment::Midpoint)
        .aggregate(&events, 7_200.0)
        .unwrap();
    assert_eq!(result.timeline[0].event_count, 0);
    assert_eq!(result.timeline[1].event_count, 1);
}

#[test]
fn test_majority_overlap_assignment() {
    // 14 s of a 20 s event in the first window
    let events = vec![event(3_586.0, 20.0)];
    let result = aggregator(3_600.0, 3_600.0, WindowAssignment::MajorityOverlap)
        .aggregate(&events, 7_200.0)
        .unwrap();
    assert_eq!(result.timeline[0].event_count, 1);
    assert_eq!(result.timeline[1].event_count, 0);

    // Exact half: the window containing the start wins
    let events = vec![event(3_590.0, 20.0)];
    let result = aggregator(3_600.0, 3_600.0, WindowAssignment::MajorityOverlap)
        .aggregate(&events, 7_200.0)
        .unwrap();
    assert_eq!(result.timeline[0].event_count, 1);
    assert_eq!(result.timeline[1].event_count, 0);
}

#[test]
fn test_worst_window_earliest_on_ties() {
    let events = vec![event(100.0, 10.0), event(2_000.0, 10.0)];
    let result = aggregator(600.0, 600.0, WindowAssignment::Midpoint)
        .aggregate(&events, 3_000.0)
        .unwrap();

    assert_eq!(result.max_ahi, 6.0);
    assert_eq!(result.worst_window.window_start, 0.0);
    assert_eq!(result.worst_window, result.timeline[0]);
}

#[test]
fn test_seventy_events_in_an_hour_all_severe() {
    let events = evenly_spaced(70, 15.0, 3_600.0);
    let result = AhiAggregator::default().aggregate(&events, 3_600.0).unwrap();

    assert!((result.overall_ahi - 70.0).abs() < 1e-9);
    assert_eq!(result.severity, Severity::Severe);
    assert_eq!(result.timeline.len(), 12);
    assert!(result
        .timeline
        .iter()
        .all(|w| w.severity == Severity::Severe));
    assert!((result.max_ahi - 70.0).abs() < 1e-9);
}

#[test]
fn test_invalid_duration_rejected() {
    for duration in [0.0, -5.0, f64::NAN, f64::INFINITY] {
        let err = AhiAggregator::default().aggregate(&[], duration).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidDuration { .. }));
    }
}
