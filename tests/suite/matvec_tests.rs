//! Fixed-width sparse matrix x vector tests.

use cubek_reduction_bench::backend::{BuildOptions, ProgramSource, build_program};
use cubek_reduction_bench::launch::dispatch::{self, MatvecBuffers};
use cubek_reduction_bench::launch::DeviceContext;
use cubek_reduction_bench::problem::{Answer, BandSelector, EllMatrix, MatvecProblem};
use cubek_reduction_bench::reduce::cpu;
use cubek_reduction_bench::{
    BenchConfig, BenchError, Buffer, ExecutionPath, HostArray, MemoryAccess, Platform, Precision, run_benchmark,
};
use pretty_assertions::assert_eq;

const WIDTH: usize = 3;

/// Slot 0 of each row is the diagonal, equal to the sum of its off-diagonals.
fn tridiagonal() -> MatvecProblem<f64> {
    let rows = vec![
        vec![(0, 1.0), (1, 1.0)],
        vec![(1, 2.0), (0, 1.0), (2, 1.0)],
        vec![(2, 2.0), (1, 1.0), (3, 1.0)],
        vec![(3, 1.0), (2, 1.0)],
    ];
    let matrix = EllMatrix::from_rows(WIDTH, &rows).unwrap();
    MatvecProblem::new(matrix, vec![1.0, 2.0, 3.0, 4.0]).unwrap()
}

fn context() -> DeviceContext<f64> {
    let platform = Platform::host(1, 64).unwrap();
    let options = BuildOptions::new(Precision::Double).with_max_nonzero_count(WIDTH);
    let program = build_program(&platform, ProgramSource::MATRIX_X_VECTOR, &options.to_flags()).unwrap();
    let mut context = DeviceContext::new(&platform.devices()[0]).unwrap();
    context.load_program(&program).unwrap();
    context
}

fn upload<E: Copy + Default + Send + Sync + 'static>(context: &DeviceContext<f64>, values: &[E]) -> Buffer<E> {
    let host = HostArray::new(values.to_vec());
    let buffer = Buffer::device_private(values.len(), MemoryAccess::ReadOnly);
    context.queue().enqueue_write(&host, 0, &buffer, 0, values.len()).unwrap();
    buffer
}

fn run_on_device(context: &DeviceContext<f64>, matrix: &EllMatrix<f64>, vector: &[f64]) -> Result<Vec<f64>, BenchError> {
    let rows = matrix.row_count();
    let operands = MatvecBuffers {
        values: upload(context, matrix.values()),
        vector: upload(context, vector),
        column_indices: upload(context, matrix.column_indices()),
        nonzero_counts: upload(context, matrix.nonzero_counts()),
    };
    let out = Buffer::device_private(rows, MemoryAccess::WriteOnly);
    let result = HostArray::filled(rows, 0.0);

    dispatch::invoke_matvec(context, &out, &operands, rows)?;
    context.queue().enqueue_read(&out, 0, &result, 0, rows)?;
    context.queue().finish()?;
    result.to_vec()
}

#[test]
fn test_tridiagonal_is_exact_everywhere() {
    let problem = tridiagonal();
    for (row, slots) in problem.matrix.rows().enumerate() {
        let off_diagonal: f64 = slots.values[1..slots.nonzero_count].iter().sum();
        assert_eq!(slots.column_indices[0] as usize, row);
        assert_eq!(slots.values[0], off_diagonal);
    }

    let expected = vec![3.0, 8.0, 12.0, 7.0];
    assert_eq!(problem.answer(), Answer::PerElement(expected.clone()));

    let mut sequential = vec![0.0; 4];
    cpu::matvec_sequential(&mut sequential, &problem.matrix, &problem.vector).unwrap();
    assert_eq!(sequential, expected);

    let mut parallel = vec![0.0; 4];
    cpu::matvec_parallel(&mut parallel, &problem.matrix, &problem.vector).unwrap();
    assert_eq!(parallel, expected);

    let device = run_on_device(&context(), &problem.matrix, &problem.vector).unwrap();
    assert_eq!(device, expected);
}

#[test]
fn test_out_of_range_column_fails_at_execution() {
    let problem = tridiagonal();
    let context = context();
    let mut columns = problem.matrix.column_indices().to_vec();
    columns[WIDTH] = 9;

    let operands = MatvecBuffers {
        values: upload(&context, problem.matrix.values()),
        vector: upload(&context, &problem.vector),
        column_indices: upload(&context, &columns),
        nonzero_counts: upload(&context, problem.matrix.nonzero_counts()),
    };
    let out = Buffer::device_private(4, MemoryAccess::WriteOnly);

    dispatch::invoke_matvec(&context, &out, &operands, 4).unwrap();
    let err = context.queue().finish().unwrap_err();
    assert!(matches!(err, BenchError::OutOfBounds { .. }), "{err}");
}

#[test]
fn test_banded_benchmark_on_every_path() {
    let platform = Platform::host(3, 64).unwrap();
    let config = BenchConfig::sparse_matvec(1000, 8)
        .with_band(BandSelector::AllOffDiagonal)
        .with_repetitions(1);
    let report = run_benchmark(&platform, &config).unwrap();

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.measurements.len(), ExecutionPath::ALL.len());
}
