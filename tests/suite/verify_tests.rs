//! Verification and tolerance tests.

use cubek_reduction_bench::problem::Answer;
use cubek_reduction_bench::verify::{verify_answer, verify_elements, verify_scalar};
use cubek_reduction_bench::{Precision, Tolerance};
use half::f16;
use pretty_assertions::assert_eq;

#[test]
fn test_default_tolerances_follow_significant_digits() {
    for (precision, epsilon) in [
        (Precision::Double, 1e-8),
        (Precision::Single, 1e-5),
        (Precision::Half, 1e-2),
    ] {
        let tolerance = Tolerance::for_precision(precision);
        assert!((tolerance.relative - epsilon).abs() < epsilon * 1e-9, "{precision:?}");
        assert_eq!(tolerance.relative, tolerance.absolute);
    }
}

#[test]
fn test_nan_never_passes() {
    let tolerance = Tolerance::new(1.0, 1.0);
    assert!(!verify_scalar(f64::NAN, 0.0, tolerance).passed());
    assert!(!verify_scalar(1.0f64, f64::NAN, tolerance).passed());
}

#[test]
fn test_mismatches_are_counted_but_capped() {
    let tolerance = Tolerance::for_precision(Precision::Double);
    let results = vec![1.0f64; 20];
    let expected = vec![2.0; 20];

    let verification = verify_elements(&results, &expected, tolerance, 3);
    assert_eq!(verification.checked, 20);
    assert_eq!(verification.mismatch_count, 20);
    assert_eq!(verification.mismatches.len(), 3);
    assert_eq!(verification.mismatches[2].index, 2);
    assert_eq!(verification.mismatches[0].difference, -1.0);
}

#[test]
fn test_short_results_fail() {
    let tolerance = Tolerance::for_precision(Precision::Double);
    let answer = Answer::PerElement(vec![1.0, 2.0, 3.0]);
    let verification = verify_answer(&[1.0f64, 2.0], &answer, tolerance, 10);
    assert_eq!(verification.mismatch_count, 1);
    assert!(verification.mismatches[0].result.is_nan());
}

#[test]
fn test_half_precision_within_two_digits() {
    let tolerance = Tolerance::for_precision(Precision::Half);
    let answer = Answer::Scalar(1000.0);
    assert!(verify_answer(&[f16::from_f32(1004.0)], &answer, tolerance, 1).passed());
    assert!(!verify_answer(&[f16::from_f32(1024.0)], &answer, tolerance, 1).passed());
}
