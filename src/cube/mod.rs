//! Benchmark kernels on a cubecl runtime.
//!
//! Counterparts of the host-emulated kernels for real accelerators. Pass
//! planning is shared with [`crate::reduce`], so both backends run the same
//! launch sequence for a given strategy and group size.

mod elementwise;
mod matvec;
mod reduction;
mod verify;

pub use elementwise::{launch_add, launch_fill_dot_operands, launch_multiply};
pub use matvec::launch_matvec;
pub use reduction::{launch_dot, launch_reduction};
pub use verify::{verify_add, verify_dot, verify_matvec};

use cubecl::prelude::*;

use crate::error::{BenchError, BenchResult};

/// Threads per cube for the element-wise kernels.
pub const BLOCK_SIZE: u32 = 256;

fn launch_error(kernel: &str, err: impl core::fmt::Debug) -> BenchError {
    BenchError::backend(format!("{kernel} kernel failed: {err:?}"))
}

fn element_count(count: usize) -> BenchResult<u32> {
    u32::try_from(count)
        .map_err(|_| BenchError::too_large(format!("{count} elements exceed the 32-bit count argument")))
}

fn linear_launch(count: u32) -> (CubeCount, CubeDim) {
    (
        CubeCount::Static(count.div_ceil(BLOCK_SIZE), 1, 1),
        CubeDim {
            x: BLOCK_SIZE,
            y: 1,
            z: 1,
        },
    )
}
