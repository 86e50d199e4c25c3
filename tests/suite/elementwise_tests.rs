//! Dense addition tests: residencies, variants and the full path matrix.

use cubek_reduction_bench::backend::{BuildOptions, ProgramSource, build_program};
use cubek_reduction_bench::launch::{DeviceContext, dispatch};
use cubek_reduction_bench::problem::{VectorFill, VectorProblem};
use cubek_reduction_bench::{
    AddVariant, BenchConfig, Buffer, ExecutionPath, HostArray, MemoryAccess, Platform, Precision, Residency,
    run_benchmark,
};
use pretty_assertions::assert_eq;

fn context(platform: &Platform) -> DeviceContext<f32> {
    let options = BuildOptions::new(Precision::Single)
        .with_count_per_work_item(4)
        .with_vector_width(8);
    let program = build_program(platform, ProgramSource::VECTOR_ADDITION, &options.to_flags()).unwrap();
    let mut context = DeviceContext::new(&platform.devices()[0]).unwrap();
    context.load_program(&program).unwrap();
    context
}

fn add_on_device(context: &DeviceContext<f32>, variant: AddVariant, residency: Residency, problem: &VectorProblem<f32>) -> Vec<f32> {
    let count = problem.left.len();
    let left = HostArray::new(problem.left.clone());
    let right = HostArray::new(problem.right.clone());
    let result = HostArray::filled(count, 0.0f32);

    let (l, r, out) = match residency {
        Residency::HostPointer => (
            Buffer::use_host(&left, MemoryAccess::ReadOnly).unwrap(),
            Buffer::use_host(&right, MemoryAccess::ReadOnly).unwrap(),
            Buffer::use_host(&result, MemoryAccess::WriteOnly).unwrap(),
        ),
        Residency::DevicePrivate => {
            let l = Buffer::device_private(count, MemoryAccess::ReadOnly);
            let r = Buffer::device_private(count, MemoryAccess::ReadOnly);
            context.queue().enqueue_write(&left, 0, &l, 0, count).unwrap();
            context.queue().enqueue_write(&right, 0, &r, 0, count).unwrap();
            (l, r, Buffer::device_private(count, MemoryAccess::WriteOnly))
        }
    };

    dispatch::invoke_add(context, variant, &out, &l, &r, count).unwrap();
    context.queue().enqueue_read(&out, 0, &result, 0, count).unwrap();
    context.queue().finish().unwrap();
    result.to_vec().unwrap()
}

#[test]
fn test_residencies_give_identical_results() {
    let platform = Platform::host(1, 64).unwrap();
    let context = context(&platform);
    let problem = VectorProblem::<f32>::generate(1001, VectorFill::Addition);

    for variant in AddVariant::ALL {
        let host = add_on_device(&context, variant, Residency::HostPointer, &problem);
        let device = add_on_device(&context, variant, Residency::DevicePrivate, &problem);
        assert_eq!(host, device, "{:?}", variant);
        assert_eq!(host, problem.left);
    }
}

#[test]
fn test_unaligned_tail_is_covered_by_heavy_variants() {
    let platform = Platform::host(1, 64).unwrap();
    let context = context(&platform);
    // 4 vectors of 8 lanes per work-item: 37 leaves a partial last item.
    let problem = VectorProblem::<f32>::from_fn(37, |i| i as f64, |_| 1.0);

    let out = add_on_device(&context, AddVariant::MoreVector, Residency::DevicePrivate, &problem);
    let expected: Vec<f32> = (0..37).map(|i| i as f32 + 1.0).collect();
    assert_eq!(out, expected);
}

#[test]
fn test_million_elements_on_every_path() {
    let platform = Platform::host(2, 256).unwrap();
    let config = BenchConfig::addition(1_048_576)
        .with_precision(Precision::Single)
        .with_residencies(&[Residency::HostPointer, Residency::DevicePrivate])
        .with_repetitions(1);
    let report = run_benchmark(&platform, &config).unwrap();

    assert!(report.all_passed(), "{report}");
    for path in ExecutionPath::ALL {
        assert!(report.measurements.iter().any(|m| m.path == path), "{path:?} missing");
    }
}
