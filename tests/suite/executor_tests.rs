//! End-to-end benchmark runs on the host platform.

use cubek_reduction_bench::{
    BenchConfig, BenchError, BenchFamily, DeviceSelection, ExecutionPath, Platform, Precision, ReductionStrategy,
    run_benchmark, run_suite,
};
use pretty_assertions::assert_eq;

#[test]
fn test_dot_in_every_precision() {
    let platform = Platform::host(2, 128).unwrap();
    for (precision, count) in [(Precision::Double, 4099), (Precision::Single, 1000)] {
        let config = BenchConfig::dot(count)
            .with_precision(precision)
            .with_work_group_size(32)
            .with_repetitions(2);
        let report = run_benchmark(&platform, &config).unwrap();
        assert!(report.all_passed(), "{report}");
        // (2 CPU + 2 device paths x 5 strategies) x 2 repetitions
        assert_eq!(report.measurements.len(), 24);
    }
}

#[test]
fn test_half_dot_stays_within_tolerance_for_small_inputs() {
    let platform = Platform::host(1, 64).unwrap();
    // Short enough that rounding stays within two significant digits.
    let config = BenchConfig::dot(64)
        .with_precision(Precision::Half)
        .with_paths(&[ExecutionPath::CpuSequential, ExecutionPath::SingleDevice])
        .with_work_group_size(8)
        .with_repetitions(1);
    let report = run_benchmark(&platform, &config).unwrap();
    assert!(report.all_passed(), "{report}");
}

#[test]
fn test_work_group_is_clamped_to_device_limit() {
    let platform = Platform::host(1, 16).unwrap();
    let config = BenchConfig::dot(1000)
        .with_paths(&[ExecutionPath::SingleDevice])
        .with_strategies(&[ReductionStrategy::BitShift])
        .with_work_group_size(1024)
        .with_repetitions(1);
    let report = run_benchmark(&platform, &config).unwrap();
    assert!(report.all_passed(), "{report}");
}

#[test]
fn test_device_selection_errors_surface() {
    let platform = Platform::host(2, 64).unwrap();
    let config = BenchConfig::dot(100).with_devices(DeviceSelection::Ids(vec![7]));
    let err = run_benchmark(&platform, &config).unwrap_err();
    assert!(matches!(err, BenchError::DeviceSelection { .. }), "{err}");
}

#[test]
fn test_cpu_only_runs_skip_program_build() {
    let platform = Platform::host(1, 64).unwrap();
    // Invalid vector width would fail the build if a device path were requested.
    let config = BenchConfig::addition(100)
        .with_paths(&[ExecutionPath::CpuSequential, ExecutionPath::CpuParallel])
        .with_heavy_work_items(4, 5)
        .with_repetitions(1);
    let report = run_benchmark(&platform, &config).unwrap();
    assert_eq!(report.measurements.len(), 2);
    assert!(report.all_passed());
}

#[test]
fn test_suite_reports_in_order() {
    let platform = Platform::host(2, 64).unwrap();
    let configs = vec![
        BenchConfig::addition(500).with_repetitions(1),
        BenchConfig::dot(500).with_repetitions(1),
        BenchConfig::sparse_matvec(200, 6).with_repetitions(1),
    ];
    let reports = run_suite(&platform, &configs).unwrap();
    let families: Vec<BenchFamily> = reports.iter().map(|report| report.family).collect();
    assert_eq!(
        families,
        vec![BenchFamily::Addition, BenchFamily::Dot, BenchFamily::SparseMatvec]
    );
    assert!(reports.iter().all(|report| report.all_passed()));
}
