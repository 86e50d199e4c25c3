//! Per-family kernel invocation on one compute unit.
//!
//! Each `invoke_*` binds arguments in the kernel's positional order, sizes
//! the launch and submits it on the unit's in-order stream. The returned
//! [`Event`] may be awaited, but a later read on the same stream is already
//! ordered after the kernel.

use core::mem::size_of;

use super::config::AddVariant;
use super::context::DeviceContext;
use crate::backend::{Buffer, Event};
use crate::error::{BenchError, BenchResult};
use crate::kernels::{ArgList, KernelName, WorkShape};
use crate::numeric::Real;
use crate::reduce::{ReductionPass, ReductionStrategy};

/// Converts a size to the kernels' 32-bit scalar argument.
pub(crate) fn scalar_arg(value: usize, what: &str) -> BenchResult<u32> {
    u32::try_from(value)
        .map_err(|_| BenchError::too_large(format!("{what} {value} exceeds the 32-bit scalar range")))
}

/// `out[..count] = left[..count] + right[..count]` with the given variant.
pub fn invoke_add<T: Real>(
    context: &DeviceContext<T>,
    variant: AddVariant,
    out: &Buffer<T>,
    left: &Buffer<T>,
    right: &Buffer<T>,
    count: usize,
) -> BenchResult<Event> {
    let kernel = context.kernel(variant.kernel())?;
    let per_item = kernel.elements_per_work_item()?;
    let args = ArgList::new()
        .buffer(out)
        .buffer(left)
        .buffer(right)
        .scalar(scalar_arg(count, "element count")?);
    let launch = kernel.bind(args, WorkShape::linear(count.div_ceil(per_item)), context.device())?;
    context.queue().enqueue_kernel(launch)
}

/// `out[..count] = left[..count] * right[..count]`.
pub fn invoke_multiply<T: Real>(
    context: &DeviceContext<T>,
    out: &Buffer<T>,
    left: &Buffer<T>,
    right: &Buffer<T>,
    count: usize,
) -> BenchResult<Event> {
    let kernel = context.kernel(KernelName::MultiplyEachElement)?;
    let args = ArgList::new()
        .buffer(out)
        .buffer(left)
        .buffer(right)
        .scalar(scalar_arg(count, "element count")?);
    let launch = kernel.bind(args, WorkShape::linear(count), context.device())?;
    context.queue().enqueue_kernel(launch)
}

/// Operand buffers of a fixed-width sparse product on one unit.
#[derive(Debug, Clone)]
pub struct MatvecBuffers<T> {
    pub values: Buffer<T>,
    pub vector: Buffer<T>,
    pub column_indices: Buffer<u32>,
    pub nonzero_counts: Buffer<u32>,
}

/// `out[row] = row · vector` for the unit's `rows` rows; one work-item per row.
pub fn invoke_matvec<T: Real>(
    context: &DeviceContext<T>,
    out: &Buffer<T>,
    operands: &MatvecBuffers<T>,
    rows: usize,
) -> BenchResult<Event> {
    let kernel = context.kernel(KernelName::MatrixXVector)?;
    let args = ArgList::new()
        .buffer(out)
        .buffer(&operands.values)
        .buffer(&operands.vector)
        .indices(&operands.column_indices)
        .indices(&operands.nonzero_counts)
        .scalar(scalar_arg(rows, "row count")?);
    let launch = kernel.bind(args, WorkShape::linear(rows), context.device())?;
    context.queue().enqueue_kernel(launch)
}

/// One reduction pass. Stride doubling updates `input` in place and
/// ignores `output`.
pub fn invoke_reduction_pass<T: Real>(
    context: &DeviceContext<T>,
    strategy: ReductionStrategy,
    pass: &ReductionPass,
    input: &Buffer<T>,
    output: &Buffer<T>,
) -> BenchResult<Event> {
    let kernel = context.kernel(strategy.kernel())?;
    let target = scalar_arg(pass.target, "reduction size")?;

    let args = if strategy.is_tree() {
        let local = pass.shape.local.ok_or_else(|| {
            BenchError::work_shape(format!("{strategy} pass without a local size"))
        })?;
        ArgList::new()
            .buffer(output)
            .buffer(input)
            .scalar(target)
            .local(local * size_of::<T>())
    } else {
        ArgList::new()
            .buffer(input)
            .scalar(target)
            .scalar(scalar_arg(pass.stride, "stride")?)
    };

    let launch = kernel.bind(args, pass.shape, context.device())?;
    context.queue().enqueue_kernel(launch)
}
