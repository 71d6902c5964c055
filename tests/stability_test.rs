use crabscan::stability::measure;
use crabscan::testing::{near_identical_quads, reference_quad};
use crabscan::{DetectionWindow, StabilityEvaluator, StabilityVerdict};

#[test]
fn test_near_identical_detections_are_stable() {
    let evaluator = StabilityEvaluator::default();
    let mut window = DetectionWindow::new(evaluator.window_size());
    for quad in near_identical_quads(&reference_quad(), 5) {
        window.push(quad);
    }

    let jitter = measure(&window.samples()).jitter;
    assert!(jitter < 10.0, "jitter {}", jitter);

    match evaluator.evaluate(&window) {
        StabilityVerdict::Stable { quad, .. } => {
            assert!(quad.corner_distance(&reference_quad()) < 4.0);
        }
        other => panic!("expected stable, got {:?}", other),
    }
}

#[test]
fn test_single_outlier_is_unstable() {
    let evaluator = StabilityEvaluator::default();
    let mut window = DetectionWindow::new(5);
    for _ in 0..4 {
        window.push(reference_quad());
    }
    window.push(reference_quad().translated(200.0, 0.0));

    let metrics = measure(&window.samples());
    assert_eq!(metrics.median, reference_quad());
    assert!((metrics.jitter - 240.0).abs() < 1e-9, "jitter {}", metrics.jitter);

    assert_eq!(
        evaluator.evaluate(&window),
        StabilityVerdict::Unstable {
            jitter: metrics.jitter
        }
    );
}

#[test]
fn test_verdict_is_deterministic() {
    let evaluator = StabilityEvaluator::default();
    let samples = near_identical_quads(&reference_quad(), 5);
    assert_eq!(
        evaluator.evaluate_samples(&samples),
        evaluator.evaluate_samples(&samples)
    );
}

#[test]
fn test_window_slides_past_outlier() {
    let evaluator = StabilityEvaluator::default();
    let mut window = evaluator.new_window();
    window.push(reference_quad().translated(200.0, 0.0));
    for _ in 0..4 {
        window.push(reference_quad());
    }
    assert!(!evaluator.evaluate(&window).is_stable());

    window.push(reference_quad());
    assert!(evaluator.evaluate(&window).is_stable());
}
