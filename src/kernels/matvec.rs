//! Fixed-width sparse matrix times dense vector, one work-item per row.

use rayon::prelude::*;

use crate::backend::{Buffer, BuildOptions};
use crate::error::{BenchError, BenchResult};
use crate::numeric::Real;

/// Slots per row, fixed at build time by `MAX_NONZERO_COUNT`.
pub(super) fn row_width(options: &BuildOptions) -> BenchResult<usize> {
    options
        .max_nonzero_count
        .ok_or_else(|| BenchError::backend("Matrix_x_Vector built without MAX_NONZERO_COUNT"))
}

/// `out[row] = Σ values[row*K + j] * vector[columns[row*K + j]]` over the
/// row's live slots.
#[allow(clippy::too_many_arguments)]
pub(super) fn multiply<T: Real>(
    out: &Buffer<T>,
    values: &Buffer<T>,
    vector: &Buffer<T>,
    columns: &Buffer<u32>,
    nonzero_counts: &Buffer<u32>,
    rows: usize,
    width: usize,
    global: usize,
) -> BenchResult<()> {
    let values = values.read()?;
    let vector = vector.read()?;
    let columns = columns.read()?;
    let nonzero_counts = nonzero_counts.read()?;
    let mut out = out.write()?;

    let (values, vector, columns, nonzero_counts): (&[T], &[T], &[u32], &[u32]) =
        (&values, &vector, &columns, &nonzero_counts);
    let rows = rows.min(global);

    out[..rows].par_iter_mut().enumerate().try_for_each(|(row, y)| {
        let live = nonzero_counts[row] as usize;
        if live > width {
            return Err(BenchError::out_of_bounds(format!(
                "row {row} claims {live} nonzeros, rows hold {width}"
            )));
        }

        let base = row * width;
        let mut acc = T::zero();
        for slot in base..base + live {
            let column = columns[slot] as usize;
            let x = vector.get(column).copied().ok_or_else(|| {
                BenchError::out_of_bounds(format!(
                    "row {row} references column {column} of a {}-entry vector",
                    vector.len()
                ))
            })?;
            acc = acc + values[slot] * x;
        }
        *y = acc;
        Ok(())
    })
}
