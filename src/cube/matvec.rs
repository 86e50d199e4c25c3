//! Fixed-width sparse matrix x vector, one unit per row.

use cubecl::Runtime;
use cubecl::client::ComputeClient;
use cubecl::prelude::*;
use cubecl::std::tensor::TensorHandle;

use super::{element_count, launch_error, linear_launch};
use crate::error::{BenchError, BenchResult};

/// `output[row] = Σ values[row*width + k] * vector[columns[row*width + k]]`
/// over the row's live slots.
///
/// Column indices are not range-checked on the device.
pub fn launch_matvec<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    values: &TensorHandle<R>,
    vector: &TensorHandle<R>,
    columns: &TensorHandle<R>,
    nonzero_counts: &TensorHandle<R>,
    output: &mut TensorHandle<R>,
    width: usize,
) -> BenchResult<()> {
    let rows: usize = output.shape.iter().product();
    let slots: usize = values.shape.iter().product();
    if slots != rows * width || columns.shape != values.shape {
        return Err(BenchError::invalid_problem(format!(
            "{rows} rows of width {width} need {} slots, got {slots}",
            rows * width
        )));
    }
    let rows = element_count(rows)?;
    if rows == 0 {
        return Ok(());
    }
    let width = element_count(width)?;
    let (cube_count, cube_dim) = linear_launch(rows);

    unsafe {
        matvec_kernel::launch_unchecked::<R>(
            client,
            cube_count,
            cube_dim,
            values.as_arg(1),
            vector.as_arg(1),
            columns.as_arg(1),
            nonzero_counts.as_arg(1),
            output.as_arg(1),
            ScalarArg::new(rows),
            width,
            E::as_type_native_unchecked(),
        )
        .map_err(|e| launch_error("matvec", e))
    }
}

#[cube(launch_unchecked)]
fn matvec_kernel<E: Numeric>(
    values: &Tensor<Line<E>>,
    vector: &Tensor<Line<E>>,
    columns: &Tensor<Line<u32>>,
    nonzero_counts: &Tensor<Line<u32>>,
    output: &mut Tensor<Line<E>>,
    rows: u32,
    #[comptime] width: u32,
    #[define(E)] _dtype: StorageType,
) {
    if ABSOLUTE_POS < rows {
        let base = ABSOLUTE_POS * width;
        let live = nonzero_counts[ABSOLUTE_POS][0];
        let mut acc = E::from_int(0);
        for slot in 0..live {
            let column = columns[base + slot][0];
            acc += values[base + slot][0] * vector[column][0];
        }
        output[ABSOLUTE_POS] = Line::new(acc);
    }
}
