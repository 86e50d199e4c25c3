//! Device summation, planned by [`ReductionPlan`].

use cubecl::Runtime;
use cubecl::client::ComputeClient;
use cubecl::prelude::*;
use cubecl::std::tensor::TensorHandle;

use super::{element_count, launch_error, launch_multiply};
use crate::error::{BenchError, BenchResult};
use crate::reduce::{ReductionPass, ReductionPlan, ReductionStrategy, Slot};

/// Sums `input` with `strategy`, returning the handle whose element 0 holds
/// the result.
///
/// Stride doubling reduces `input` in place and returns it. Tree strategies
/// leave `input` intact and alternate between two scratch tensors.
pub fn launch_reduction<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    strategy: ReductionStrategy,
    input: TensorHandle<R>,
    cube_size: u32,
) -> BenchResult<TensorHandle<R>> {
    let count: usize = input.shape.iter().product();
    let plan = ReductionPlan::new(strategy, count, cube_size as usize)?;
    let dtype = input.dtype;

    let scratch = plan.scratch_len().max(1);
    let mut ping = TensorHandle::zeros(client, vec![scratch], dtype);
    let mut pong = TensorHandle::zeros(client, vec![scratch], dtype);
    let mut source = input;

    for pass in plan.passes() {
        let target = element_count(pass.target)?;
        match (pass.input, pass.output) {
            (Slot::Source, Slot::Source) => launch_stride_pass::<R, E>(client, pass, &mut source, target)?,
            (Slot::Source, Slot::Ping) => launch_tree_pass::<R, E>(client, strategy, pass, &source, &mut ping, target)?,
            (Slot::Ping, Slot::Pong) => launch_tree_pass::<R, E>(client, strategy, pass, &ping, &mut pong, target)?,
            (Slot::Pong, Slot::Ping) => launch_tree_pass::<R, E>(client, strategy, pass, &pong, &mut ping, target)?,
            (from, to) => {
                return Err(BenchError::backend(format!("unplanned reduction pass {from:?} -> {to:?}")));
            }
        }
    }

    Ok(match plan.result_slot() {
        Slot::Source => source,
        Slot::Ping => ping,
        Slot::Pong => pong,
    })
}

/// Multiplies `lhs` by `rhs` into `product`, then reduces it.
pub fn launch_dot<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    strategy: ReductionStrategy,
    lhs: &TensorHandle<R>,
    rhs: &TensorHandle<R>,
    mut product: TensorHandle<R>,
    cube_size: u32,
) -> BenchResult<TensorHandle<R>> {
    launch_multiply::<R, E>(client, lhs, rhs, &mut product)?;
    launch_reduction::<R, E>(client, strategy, product, cube_size)
}

fn launch_stride_pass<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    pass: &ReductionPass,
    data: &mut TensorHandle<R>,
    target: u32,
) -> BenchResult<()> {
    let stride = element_count(pass.stride)?;
    let tasks = element_count(pass.shape.global)?;
    let (cube_count, cube_dim) = super::linear_launch(tasks);

    unsafe {
        reduce_stride_doubling::launch_unchecked::<R>(
            client,
            cube_count,
            cube_dim,
            data.as_arg(1),
            ScalarArg::new(target),
            ScalarArg::new(stride),
            ScalarArg::new(tasks),
            E::as_type_native_unchecked(),
        )
        .map_err(|e| launch_error("stride-doubling", e))
    }
}

fn launch_tree_pass<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    strategy: ReductionStrategy,
    pass: &ReductionPass,
    input: &TensorHandle<R>,
    output: &mut TensorHandle<R>,
    target: u32,
) -> BenchResult<()> {
    let local = pass
        .shape
        .local
        .ok_or_else(|| BenchError::work_shape(format!("{strategy} pass without a local size")))?;
    let local = element_count(local)?;
    let groups = element_count(pass.shape.group_count())?;
    let cube_dim = CubeDim { x: local, y: 1, z: 1 };
    let cube_count = CubeCount::Static(groups, 1, 1);
    let paired = strategy.reduction_factor() == 2;
    let fused = strategy == ReductionStrategy::FusedLoad;

    unsafe {
        reduce_tree::launch_unchecked::<R>(
            client,
            cube_count,
            cube_dim,
            input.as_arg(1),
            output.as_arg(1),
            ScalarArg::new(target),
            local,
            paired,
            fused,
            E::as_type_native_unchecked(),
        )
        .map_err(|e| launch_error(strategy.name(), e))
    }
}

#[cube(launch_unchecked)]
fn reduce_stride_doubling<N: Numeric>(
    data: &mut Tensor<Line<N>>,
    num_elements: u32,
    stride: u32,
    tasks: u32,
    #[define(N)] _dtype: StorageType,
) {
    if ABSOLUTE_POS < tasks {
        let left = ABSOLUTE_POS * 2 * stride;
        let right = left + stride;
        if right < num_elements {
            let value = data[right];
            data[left] += value;
        }
    }
}

/// One partial per cube. `paired` loads two elements one cube apart;
/// `fused` folds the first halving step into a single-width load.
#[cube(launch_unchecked)]
fn reduce_tree<N: Numeric>(
    input: &Tensor<Line<N>>,
    output: &mut Tensor<Line<N>>,
    num_elements: u32,
    #[comptime] cube_size: u32,
    #[comptime] paired: bool,
    #[comptime] fused: bool,
    #[define(N)] _dtype: StorageType,
) {
    let mut shared = SharedMemory::<N>::new(cube_size);
    let mut value = N::from_int(0);
    let mut active = cube_size.runtime() / 2;

    if paired {
        let first = CUBE_POS * CUBE_DIM * 2 + UNIT_POS;
        let second = first + CUBE_DIM;
        if first < num_elements {
            value += input[first][0];
        }
        if second < num_elements {
            value += input[second][0];
        }
    } else if fused {
        let half = CUBE_DIM / 2;
        let first = CUBE_POS * CUBE_DIM + UNIT_POS;
        if UNIT_POS < half {
            if first < num_elements {
                value += input[first][0];
            }
            if first + half < num_elements {
                value += input[first + half][0];
            }
        }
        active /= 2;
    } else if ABSOLUTE_POS < num_elements {
        value = input[ABSOLUTE_POS][0];
    }

    shared[UNIT_POS] = value;
    sync_cube();

    while active > 0 {
        if UNIT_POS < active {
            let other = shared[UNIT_POS + active];
            shared[UNIT_POS] += other;
        }
        sync_cube();
        active /= 2;
    }

    if UNIT_POS == 0 {
        output[CUBE_POS] = Line::new(shared[0]);
    }
}
