//! Device-side reduction driver.

use super::strategy::{ReductionPlan, ReductionStrategy, Slot};
use crate::backend::{Buffer, HostArray, MemoryAccess};
use crate::error::{BenchError, BenchResult};
use crate::launch::{DeviceContext, dispatch};
use crate::numeric::Real;

/// Scratch buffer names registered in the device context.
pub const PING: &str = "reduce.ping";
pub const PONG: &str = "reduce.pong";

/// Reduction queued on one device.
#[derive(Debug, Clone)]
pub struct DeviceReduction<T> {
    plan: ReductionPlan,
    /// Buffer whose element 0 holds the sum; `None` for an empty input.
    result: Option<Buffer<T>>,
}

impl<T: Real> DeviceReduction<T> {
    pub fn plan(&self) -> &ReductionPlan {
        &self.plan
    }

    pub fn result(&self) -> Option<&Buffer<T>> {
        self.result.as_ref()
    }

    /// Queues the read of the sum into `host[index]`.
    ///
    /// An empty reduction writes the additive identity directly.
    pub fn enqueue_read(&self, context: &DeviceContext<T>, host: &HostArray<T>, index: usize) -> BenchResult<()> {
        match &self.result {
            Some(buffer) => context.queue().enqueue_read(buffer, 0, host, index, 1).map(|_| ()),
            None => host.set(index, T::zero()),
        }
    }
}

/// Queues every pass needed to sum `source[..count]` on `context`'s stream.
///
/// Stride doubling overwrites `source`. Tree strategies leave it intact and
/// alternate between the context's ping and pong scratch buffers.
pub fn enqueue_reduction<T: Real>(
    context: &mut DeviceContext<T>,
    strategy: ReductionStrategy,
    source: &Buffer<T>,
    count: usize,
    work_group_size: usize,
) -> BenchResult<DeviceReduction<T>> {
    if count > source.len() {
        return Err(BenchError::out_of_bounds(format!(
            "reducing {count} elements of a {}-element buffer",
            source.len()
        )));
    }

    let plan = ReductionPlan::new(strategy, count, work_group_size)?;
    if count == 0 {
        return Ok(DeviceReduction { plan, result: None });
    }

    let scratch_len = plan.scratch_len();
    let (ping, pong) = if scratch_len > 0 {
        (
            Some(context.scratch(PING, scratch_len)),
            Some(context.scratch(PONG, scratch_len)),
        )
    } else {
        (None, None)
    };
    let slot = |slot: Slot| -> BenchResult<&Buffer<T>> {
        match slot {
            Slot::Source => Ok(source),
            Slot::Ping => ping.as_ref().ok_or_else(|| BenchError::backend("ping scratch missing")),
            Slot::Pong => pong.as_ref().ok_or_else(|| BenchError::backend("pong scratch missing")),
        }
    };

    for pass in plan.passes() {
        dispatch::invoke_reduction_pass(context, strategy, pass, slot(pass.input)?, slot(pass.output)?)?;
    }
    log::debug!(
        "device {}: {strategy} over {count} elements in {} passes",
        context.device().id,
        plan.passes().len()
    );

    let result = slot(plan.result_slot())?.clone();
    Ok(DeviceReduction {
        plan,
        result: Some(result),
    })
}

/// Uploads `values`, reduces them on `context` and waits for the sum.
pub fn reduce_on_device<T: Real>(
    context: &mut DeviceContext<T>,
    strategy: ReductionStrategy,
    values: &[T],
    work_group_size: usize,
) -> BenchResult<T> {
    let host = HostArray::new(values.to_vec());
    let source = Buffer::device_private(values.len(), MemoryAccess::ReadWrite);
    if !values.is_empty() {
        context.queue().enqueue_write(&host, 0, &source, 0, values.len())?;
    }

    let reduction = enqueue_reduction(context, strategy, &source, values.len(), work_group_size)?;
    let sum = HostArray::filled(1, T::zero());
    reduction.enqueue_read(context, &sum, 0)?;
    context.queue().finish()?;

    Ok(sum.to_vec()?.first().copied().unwrap_or_else(T::zero))
}
