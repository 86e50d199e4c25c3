//! Benchmark execution engine.
//!
//! Orchestrates problem generation, program build, per-unit dispatch,
//! timing and verification for one [`BenchConfig`].

use std::time::Duration;

use half::f16;

use super::config::{AddVariant, BenchConfig, BenchFamily, ExecutionPath};
use super::context::{DeviceContext, DeviceRegistry};
use super::dispatch::{self, MatvecBuffers};
use crate::backend::{
    Buffer, BuildOptions, HostArray, MemoryAccess, Platform, Program, ProgramSource, Residency,
    build_program,
};
use crate::error::{BenchError, BenchResult};
use crate::numeric::{Precision, Real};
use crate::partition::PartitionPlan;
use crate::problem::{Answer, MatvecProblem, VectorFill, VectorProblem};
use crate::reduce::{ReductionStrategy, cpu, enqueue_reduction};
use crate::report::{BenchReport, Measurement};
use crate::verify::{Tolerance, timed, verify_answer};

const LEFT: &str = "left";
const RIGHT: &str = "right";
const OUTPUT: &str = "output";
const PRODUCT: &str = "product";
const MATRIX_VALUES: &str = "matrix.values";
const MATRIX_COLUMNS: &str = "matrix.columns";
const MATRIX_NONZEROS: &str = "matrix.nonzero_counts";
const VECTOR: &str = "vector";

/// Runs one configuration and reports every measurement.
///
/// Backend and build failures are returned as errors. Verification
/// mismatches are recorded in the report and logged, never returned.
///
/// # Example
///
/// ```ignore
/// let platform = Platform::host(2, 256)?;
/// let report = run_benchmark(&platform, &BenchConfig::dot(1 << 20))?;
/// println!("{report}");
/// ```
pub fn run_benchmark(platform: &Platform, config: &BenchConfig) -> BenchResult<BenchReport> {
    match config.precision {
        Precision::Half => run::<f16>(platform, config),
        Precision::Single => run::<f32>(platform, config),
        Precision::Double => run::<f64>(platform, config),
    }
}

/// Runs each configuration in order, stopping at the first error.
pub fn run_suite(platform: &Platform, configs: &[BenchConfig]) -> BenchResult<Vec<BenchReport>> {
    configs.iter().map(|config| run_benchmark(platform, config)).collect()
}

/// Runs [`BenchConfig::default_suite`].
pub fn run_default_suite(platform: &Platform) -> BenchResult<Vec<BenchReport>> {
    run_suite(platform, &BenchConfig::default_suite())
}

fn run<T: Real>(platform: &Platform, config: &BenchConfig) -> BenchResult<BenchReport> {
    if config.element_count == 0 {
        return Err(BenchError::invalid_problem("element count must be positive"));
    }
    if config.repetitions == 0 {
        return Err(BenchError::invalid_problem("at least one repetition is required"));
    }

    log::info!(
        "{} with {} elements ({})",
        config.family.name(),
        config.element_count,
        config.precision.type_name()
    );

    let mut session = Session {
        config,
        tolerance: config.effective_tolerance(),
        report: BenchReport {
            family: config.family,
            precision: config.precision,
            element_count: config.element_count,
            platform: platform.describe(),
            measurements: Vec::new(),
        },
    };

    match config.family {
        BenchFamily::Addition => run_addition::<T>(platform, &mut session)?,
        BenchFamily::Dot => run_dot::<T>(platform, &mut session)?,
        BenchFamily::SparseMatvec => run_matvec::<T>(platform, &mut session)?,
    }

    let report = session.report;
    if !report.all_passed() {
        log::warn!(
            "{}: {} of {} measurements failed verification",
            config.family.name(),
            report.failures().count(),
            report.measurements.len()
        );
    }
    Ok(report)
}

/// Collects measurements for one run.
struct Session<'a> {
    config: &'a BenchConfig,
    tolerance: Tolerance,
    report: BenchReport,
}

impl Session<'_> {
    fn record<T: Real>(
        &mut self,
        name: String,
        path: ExecutionPath,
        repetition: usize,
        elapsed: Duration,
        results: &[T],
        answer: &Answer,
    ) {
        let verification = verify_answer(results, answer, self.tolerance, self.config.max_reported_mismatches);
        let millis = elapsed.as_secs_f64() * 1e3;

        if verification.passed() {
            log::info!("{name} #{repetition}: {millis:.3} ms");
        } else {
            log::warn!(
                "{name} #{repetition}: {millis:.3} ms, {} of {} values outside tolerance",
                verification.mismatch_count,
                verification.checked
            );
            for mismatch in &verification.mismatches {
                log::warn!(
                    "  [{}] result {} expected {} (difference {:e})",
                    mismatch.index,
                    mismatch.result,
                    mismatch.expected,
                    mismatch.difference
                );
            }
        }

        self.report.measurements.push(Measurement {
            name,
            path,
            repetition,
            elapsed,
            verification,
        });
    }

    fn cpu_paths(&self) -> Vec<ExecutionPath> {
        self.config.paths.iter().copied().filter(|path| !path.is_device()).collect()
    }

    fn device_paths(&self) -> Vec<ExecutionPath> {
        self.config.paths.iter().copied().filter(|path| path.is_device()).collect()
    }
}

/// Contexts for `path`, with `program` loaded on each.
fn open_units<T: Real>(
    platform: &Platform,
    config: &BenchConfig,
    path: ExecutionPath,
    program: &Program,
) -> BenchResult<DeviceRegistry<T>> {
    let ids = config.devices.resolve(platform)?;
    let ids = match path {
        ExecutionPath::SingleDevice => &ids[..1],
        _ => &ids[..],
    };
    let mut registry = DeviceRegistry::open(platform, ids)?;
    registry.load_program(program)?;
    log::debug!("{} on device(s) {ids:?}", path.label());
    Ok(registry)
}

fn build(platform: &Platform, source: ProgramSource, options: BuildOptions) -> BenchResult<Program> {
    let program = build_program(platform, source, &options.to_flags());
    if let Err(err) = &program {
        log::error!("{err}");
    }
    program
}

fn work_group_size<T: Real>(config: &BenchConfig, context: &DeviceContext<T>) -> usize {
    config.work_group_size.min(context.device().max_work_group_size)
}

// ---------------------------------------------------------------------------
// Addition

fn run_addition<T: Real>(platform: &Platform, session: &mut Session<'_>) -> BenchResult<()> {
    let config = session.config;
    let count = config.element_count;
    let problem = VectorProblem::<T>::generate(count, VectorFill::Addition);
    let answer = problem.addition_answer();

    for repetition in 0..config.repetitions {
        for path in session.cpu_paths() {
            let mut out = vec![T::zero(); count];
            let ((), elapsed) = timed(|| match path {
                ExecutionPath::CpuSequential => cpu::add_sequential(&mut out, &problem.left, &problem.right),
                _ => cpu::add_parallel(&mut out, &problem.left, &problem.right),
            })?;
            session.record(format!("add / {}", path.label()), path, repetition, elapsed, &out, &answer);
        }
    }

    let device_paths = session.device_paths();
    if device_paths.is_empty() {
        return Ok(());
    }

    let options = BuildOptions::new(T::PRECISION)
        .with_count_per_work_item(config.count_per_work_item)
        .with_vector_width(config.vector_width);
    let program = build(platform, ProgramSource::VECTOR_ADDITION, options)?;

    let left = HostArray::new(problem.left.clone());
    let right = HostArray::new(problem.right.clone());
    let result = HostArray::filled(count, T::zero());

    for path in device_paths {
        let mut units = open_units::<T>(platform, config, path, &program)?;
        let plan = PartitionPlan::new(count, units.len())?;

        for &residency in &config.residencies {
            prepare_addition(&mut units, &plan, residency, &left, &right, &result)?;

            // Device-private buffers are measured with and without the upload.
            let uploads: &[bool] = match residency {
                Residency::HostPointer => &[false],
                Residency::DevicePrivate => &[true, false],
            };

            for &variant in &config.add_variants {
                for &upload in uploads {
                    let name = addition_name(variant, residency, path, upload);
                    for repetition in 0..config.repetitions {
                        if !upload {
                            upload_operands(&units, &plan, &left, &right)?;
                        }
                        reset_outputs(&units, &plan, &result)?;
                        units.finish_all()?;

                        let ((), elapsed) = timed(|| {
                            if upload {
                                upload_operands(&units, &plan, &left, &right)?;
                            }
                            enqueue_addition(&units, &plan, variant, &result)?;
                            units.finish_all()
                        })?;

                        let output = result.to_vec()?;
                        session.record(name.clone(), path, repetition, elapsed, &output, &answer);
                    }
                }
            }
        }
        units.clear_buffers();
    }

    Ok(())
}

fn addition_name(variant: AddVariant, residency: Residency, path: ExecutionPath, upload: bool) -> String {
    let mut name = format!("add {} / {} / {}", variant.kernel(), residency.label(), path.label());
    if residency == Residency::DevicePrivate {
        name.push_str(if upload { " (upload)" } else { " (resident)" });
    }
    name
}

/// Registers `left`, `right` and `output` on every active unit.
///
/// Host-pointer buffers are windows onto the caller's arrays; device-private
/// buffers are fresh allocations of the unit's share.
fn prepare_addition<T: Real>(
    units: &mut DeviceRegistry<T>,
    plan: &PartitionPlan,
    residency: Residency,
    left: &HostArray<T>,
    right: &HostArray<T>,
    result: &HostArray<T>,
) -> BenchResult<()> {
    let shared = match residency {
        Residency::HostPointer => Some((
            Buffer::use_host(left, MemoryAccess::ReadOnly)?,
            Buffer::use_host(right, MemoryAccess::ReadOnly)?,
            Buffer::use_host(result, MemoryAccess::WriteOnly)?,
        )),
        Residency::DevicePrivate => None,
    };

    for (unit, range) in plan.active_units() {
        let context = units.get_mut(unit)?;
        let (l, r, out) = match &shared {
            Some((l, r, out)) => (
                l.sub_buffer(range.start, range.len(), MemoryAccess::ReadOnly)?,
                r.sub_buffer(range.start, range.len(), MemoryAccess::ReadOnly)?,
                out.sub_buffer(range.start, range.len(), MemoryAccess::WriteOnly)?,
            ),
            None => (
                Buffer::device_private(range.len(), MemoryAccess::ReadOnly),
                Buffer::device_private(range.len(), MemoryAccess::ReadOnly),
                Buffer::device_private(range.len(), MemoryAccess::WriteOnly),
            ),
        };
        context.register(LEFT, l);
        context.register(RIGHT, r);
        context.register(OUTPUT, out);
    }
    Ok(())
}

fn upload_operands<T: Real>(
    units: &DeviceRegistry<T>,
    plan: &PartitionPlan,
    left: &HostArray<T>,
    right: &HostArray<T>,
) -> BenchResult<()> {
    for (unit, range) in plan.active_units() {
        let context = units.get(unit)?;
        let l = context.buffer(LEFT)?;
        let r = context.buffer(RIGHT)?;
        if l.residency() == Residency::HostPointer {
            continue;
        }
        context.queue().enqueue_write(left, range.start, l, 0, range.len())?;
        context.queue().enqueue_write(right, range.start, r, 0, range.len())?;
    }
    Ok(())
}

/// Zeroes the host result and every unit's output buffer.
fn reset_outputs<T: Real>(units: &DeviceRegistry<T>, plan: &PartitionPlan, result: &HostArray<T>) -> BenchResult<()> {
    result.fill(T::zero())?;
    for (unit, _) in plan.active_units() {
        let context = units.get(unit)?;
        let out = context.buffer(OUTPUT)?;
        if out.residency() == Residency::DevicePrivate {
            context.queue().enqueue_fill(out, T::zero())?;
        }
    }
    Ok(())
}

fn enqueue_addition<T: Real>(
    units: &DeviceRegistry<T>,
    plan: &PartitionPlan,
    variant: AddVariant,
    result: &HostArray<T>,
) -> BenchResult<()> {
    for (unit, range) in plan.active_units() {
        let context = units.get(unit)?;
        let out = context.buffer(OUTPUT)?;
        dispatch::invoke_add(context, variant, out, context.buffer(LEFT)?, context.buffer(RIGHT)?, range.len())?;
        // Same stream as the kernel, so ordered after it.
        context.queue().enqueue_read(out, 0, result, range.start, range.len())?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dot product

fn run_dot<T: Real>(platform: &Platform, session: &mut Session<'_>) -> BenchResult<()> {
    let config = session.config;
    let count = config.element_count;
    let problem = VectorProblem::<T>::generate(count, VectorFill::Dot);
    let answer = problem.dot_answer();

    for repetition in 0..config.repetitions {
        for path in session.cpu_paths() {
            let (sum, elapsed) = timed(|| match path {
                ExecutionPath::CpuSequential => cpu::dot_sequential(&problem.left, &problem.right),
                _ => cpu::dot_parallel(&problem.left, &problem.right, config.task_count),
            })?;
            session.record(format!("dot / {}", path.label()), path, repetition, elapsed, &[sum], &answer);
        }
    }

    let device_paths = session.device_paths();
    if device_paths.is_empty() {
        return Ok(());
    }

    let program = build(platform, ProgramSource::VECTOR_DOT, BuildOptions::new(T::PRECISION))?;
    let left = HostArray::new(problem.left.clone());
    let right = HostArray::new(problem.right.clone());

    for path in device_paths {
        let mut units = open_units::<T>(platform, config, path, &program)?;
        let plan = PartitionPlan::new(count, units.len())?;

        // Operands stay resident across strategies.
        for (unit, range) in plan.active_units() {
            let context = units.get_mut(unit)?;
            let l = Buffer::device_private(range.len(), MemoryAccess::ReadOnly);
            let r = Buffer::device_private(range.len(), MemoryAccess::ReadOnly);
            context.queue().enqueue_write(&left, range.start, &l, 0, range.len())?;
            context.queue().enqueue_write(&right, range.start, &r, 0, range.len())?;
            context.register(LEFT, l);
            context.register(RIGHT, r);
            context.register(PRODUCT, Buffer::device_private(range.len(), MemoryAccess::ReadWrite));
        }
        units.finish_all()?;

        for &strategy in &config.strategies {
            let name = format!("dot / {} / {}", path.label(), strategy);
            for repetition in 0..config.repetitions {
                let partials = HostArray::filled(units.len(), T::zero());
                let (sum, elapsed) = timed(|| {
                    enqueue_dot(&mut units, &plan, strategy, config, &partials)?;
                    units.finish_all()?;
                    // Single-threaded combine, in unit order.
                    Ok(partials
                        .to_vec()?
                        .into_iter()
                        .fold(T::zero(), |acc, partial| acc + partial))
                })?;
                session.record(name.clone(), path, repetition, elapsed, &[sum], &answer);
            }
        }
        units.clear_buffers();
    }

    Ok(())
}

/// Multiply, reduce and read back one partial per active unit.
fn enqueue_dot<T: Real>(
    units: &mut DeviceRegistry<T>,
    plan: &PartitionPlan,
    strategy: ReductionStrategy,
    config: &BenchConfig,
    partials: &HostArray<T>,
) -> BenchResult<()> {
    for (unit, range) in plan.active_units() {
        let context = units.get_mut(unit)?;
        let product = context.buffer(PRODUCT)?.clone();
        dispatch::invoke_multiply(
            context,
            &product,
            context.buffer(LEFT)?,
            context.buffer(RIGHT)?,
            range.len(),
        )?;

        let local = work_group_size(config, context);
        let reduction = enqueue_reduction(context, strategy, &product, range.len(), local)?;
        reduction.enqueue_read(context, partials, unit)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sparse matrix x vector

fn run_matvec<T: Real>(platform: &Platform, session: &mut Session<'_>) -> BenchResult<()> {
    let config = session.config;
    let rows = config.element_count;
    let width = config.max_nonzero;
    let problem = MatvecProblem::<T>::generate(rows, width, config.band)?;
    let answer = problem.answer();

    for repetition in 0..config.repetitions {
        for path in session.cpu_paths() {
            let mut out = vec![T::zero(); rows];
            let ((), elapsed) = timed(|| match path {
                ExecutionPath::CpuSequential => cpu::matvec_sequential(&mut out, &problem.matrix, &problem.vector),
                _ => cpu::matvec_parallel(&mut out, &problem.matrix, &problem.vector),
            })?;
            session.record(format!("matvec / {}", path.label()), path, repetition, elapsed, &out, &answer);
        }
    }

    let device_paths = session.device_paths();
    if device_paths.is_empty() {
        return Ok(());
    }

    let options = BuildOptions::new(T::PRECISION).with_max_nonzero_count(width);
    let program = build(platform, ProgramSource::MATRIX_X_VECTOR, options)?;

    let values = HostArray::new(problem.matrix.values().to_vec());
    let columns = HostArray::new(problem.matrix.column_indices().to_vec());
    let nonzeros = HostArray::new(problem.matrix.nonzero_counts().to_vec());
    let vector = HostArray::new(problem.vector.clone());
    let result = HostArray::filled(rows, T::zero());

    for path in device_paths {
        let mut units = open_units::<T>(platform, config, path, &program)?;
        let plan = PartitionPlan::new(rows, units.len())?;

        for (unit, range) in plan.active_units() {
            let context = units.get_mut(unit)?;
            let slots = range.len() * width;
            let device_values = Buffer::device_private(slots, MemoryAccess::ReadOnly);
            let device_columns = Buffer::device_private(slots, MemoryAccess::ReadOnly);
            let device_nonzeros = Buffer::device_private(range.len(), MemoryAccess::ReadOnly);
            let device_vector = Buffer::device_private(rows, MemoryAccess::ReadOnly);

            let queue = context.queue();
            queue.enqueue_write(&values, range.start * width, &device_values, 0, slots)?;
            queue.enqueue_write(&columns, range.start * width, &device_columns, 0, slots)?;
            queue.enqueue_write(&nonzeros, range.start, &device_nonzeros, 0, range.len())?;
            queue.enqueue_write(&vector, 0, &device_vector, 0, rows)?;

            context.register(MATRIX_VALUES, device_values);
            context.register_indices(MATRIX_COLUMNS, device_columns);
            context.register_indices(MATRIX_NONZEROS, device_nonzeros);
            context.register(VECTOR, device_vector);
            context.register(OUTPUT, Buffer::device_private(range.len(), MemoryAccess::WriteOnly));
        }
        units.finish_all()?;

        let name = format!("matvec / {}", path.label());
        for repetition in 0..config.repetitions {
            reset_outputs(&units, &plan, &result)?;
            units.finish_all()?;

            let ((), elapsed) = timed(|| {
                enqueue_matvec(&units, &plan, &result)?;
                units.finish_all()
            })?;

            let output = result.to_vec()?;
            session.record(name.clone(), path, repetition, elapsed, &output, &answer);
        }
        units.clear_buffers();
    }

    Ok(())
}

fn enqueue_matvec<T: Real>(units: &DeviceRegistry<T>, plan: &PartitionPlan, result: &HostArray<T>) -> BenchResult<()> {
    for (unit, range) in plan.active_units() {
        let context = units.get(unit)?;
        let operands = MatvecBuffers {
            values: context.buffer(MATRIX_VALUES)?.clone(),
            vector: context.buffer(VECTOR)?.clone(),
            column_indices: context.indices(MATRIX_COLUMNS)?.clone(),
            nonzero_counts: context.indices(MATRIX_NONZEROS)?.clone(),
        };
        let out = context.buffer(OUTPUT)?;
        dispatch::invoke_matvec(context, out, &operands, range.len())?;
        context.queue().enqueue_read(out, 0, result, range.start, range.len())?;
    }
    Ok(())
}
