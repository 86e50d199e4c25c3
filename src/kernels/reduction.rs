//! Summation kernels, one per reduction strategy.
//!
//! `ReductionSum0` works in place over the whole array. The tree kernels
//! (`ReductionSum1..4`) read one array and write one partial per work-group;
//! each group owns a scratch array of `local` elements standing in for
//! device local memory. Lanes past `count` contribute zero.

use rayon::prelude::*;

use super::KernelName;
use crate::backend::Buffer;
use crate::error::BenchResult;
use crate::numeric::Real;

/// Input elements consumed by one work-group of a tree kernel.
pub(crate) fn elements_per_group(name: KernelName, local: usize) -> usize {
    match name {
        KernelName::ReductionSum3 | KernelName::ReductionSum4 => 2 * local,
        _ => local,
    }
}

/// One stride-doubling pass: task `t` adds `data[t*2s + s]` into `data[t*2s]`.
pub(super) fn stride_doubling<T: Real>(
    data: &Buffer<T>,
    count: usize,
    stride: usize,
    global: usize,
) -> BenchResult<()> {
    let mut data = data.write()?;
    data[..count]
        .par_chunks_mut(2 * stride)
        .take(global)
        .for_each(|pair| {
            if pair.len() > stride {
                pair[0] = pair[0] + pair[stride];
            }
        });
    Ok(())
}

/// One tree pass: `output[g]` receives the sum of group `g`'s inputs.
pub(super) fn tree<T: Real>(
    name: KernelName,
    output: &Buffer<T>,
    input: &Buffer<T>,
    count: usize,
    global: usize,
    local: usize,
) -> BenchResult<()> {
    let input = input.read()?;
    let mut output = output.write()?;

    let input: &[T] = &input;
    let load = |index: usize| if index < count { input[index] } else { T::zero() };
    let groups = global / local;

    output[..groups]
        .par_iter_mut()
        .enumerate()
        .for_each_init(
            || vec![T::zero(); local],
            |scratch, (group, partial)| {
                match name {
                    KernelName::ReductionSum1 => {
                        let base = group * local;
                        for lid in 0..local {
                            scratch[lid] = load(base + lid);
                        }
                        halve(scratch, local / 2);
                    }
                    KernelName::ReductionSum2 => {
                        // First halving step fused into the load.
                        let half = local / 2;
                        let base = group * local;
                        for lid in 0..half {
                            scratch[lid] = load(base + lid) + load(base + lid + half);
                        }
                        halve(scratch, half / 2);
                    }
                    KernelName::ReductionSum3 => {
                        let base = group * 2 * local;
                        for lid in 0..local {
                            scratch[lid] = load(base + lid) + load(base + lid + local);
                        }
                        halve(scratch, local / 2);
                    }
                    _ => {
                        let shift = local.trailing_zeros();
                        let base = group << (shift + 1);
                        for lid in 0..local {
                            scratch[lid] = load(base + lid) + load(base + lid + (1 << shift));
                        }
                        let mut active = local >> 1;
                        while active > 0 {
                            for lid in 0..active {
                                scratch[lid] = scratch[lid] + scratch[lid + active];
                            }
                            active >>= 1;
                        }
                    }
                }
                *partial = scratch[0];
            },
        );

    Ok(())
}

/// Halving steps starting at `active` lanes: lane `l < active` adds lane `l + active`.
fn halve<T: Real>(scratch: &mut [T], mut active: usize) {
    while active > 0 {
        for lid in 0..active {
            scratch[lid] = scratch[lid] + scratch[lid + active];
        }
        active /= 2;
    }
}
