//! Element-wise add and multiply.

use cubecl::Runtime;
use cubecl::client::ComputeClient;
use cubecl::prelude::*;
use cubecl::std::tensor::TensorHandle;

use super::{element_count, launch_error, linear_launch};
use crate::error::{BenchError, BenchResult};

/// `output = lhs + rhs`, one element per unit.
pub fn launch_add<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    lhs: &TensorHandle<R>,
    rhs: &TensorHandle<R>,
    output: &mut TensorHandle<R>,
) -> BenchResult<()> {
    let count = checked_operands(lhs, rhs, output)?;
    if count == 0 {
        return Ok(());
    }
    let (cube_count, cube_dim) = linear_launch(count);

    unsafe {
        add_kernel::launch_unchecked::<R>(
            client,
            cube_count,
            cube_dim,
            lhs.as_arg(1),
            rhs.as_arg(1),
            output.as_arg(1),
            ScalarArg::new(count),
            E::as_type_native_unchecked(),
        )
        .map_err(|e| launch_error("add", e))
    }
}

/// `output = lhs * rhs`, one element per unit.
pub fn launch_multiply<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    lhs: &TensorHandle<R>,
    rhs: &TensorHandle<R>,
    output: &mut TensorHandle<R>,
) -> BenchResult<()> {
    let count = checked_operands(lhs, rhs, output)?;
    if count == 0 {
        return Ok(());
    }
    let (cube_count, cube_dim) = linear_launch(count);

    unsafe {
        multiply_kernel::launch_unchecked::<R>(
            client,
            cube_count,
            cube_dim,
            lhs.as_arg(1),
            rhs.as_arg(1),
            output.as_arg(1),
            ScalarArg::new(count),
            E::as_type_native_unchecked(),
        )
        .map_err(|e| launch_error("multiply", e))
    }
}

/// `lhs[i] = i / 10`, `rhs[i] = 1`: the dot-product inputs, generated on the device.
pub fn launch_fill_dot_operands<R: Runtime, E: CubePrimitive + Numeric>(
    client: &ComputeClient<R>,
    lhs: &mut TensorHandle<R>,
    rhs: &mut TensorHandle<R>,
) -> BenchResult<()> {
    let count = checked_operands(lhs, rhs, rhs)?;
    if count == 0 {
        return Ok(());
    }
    let (cube_count, cube_dim) = linear_launch(count);

    unsafe {
        fill_dot_operands::launch_unchecked::<R>(
            client,
            cube_count,
            cube_dim,
            lhs.as_arg(1),
            rhs.as_arg(1),
            ScalarArg::new(count),
            E::as_type_native_unchecked(),
        )
        .map_err(|e| launch_error("fill", e))
    }
}

fn checked_operands<R: Runtime>(
    lhs: &TensorHandle<R>,
    rhs: &TensorHandle<R>,
    output: &TensorHandle<R>,
) -> BenchResult<u32> {
    if lhs.shape != rhs.shape || lhs.shape != output.shape {
        return Err(BenchError::invalid_problem(format!(
            "operand shapes differ: {:?}, {:?} -> {:?}",
            lhs.shape, rhs.shape, output.shape
        )));
    }
    element_count(lhs.shape.iter().product())
}

#[cube(launch_unchecked)]
fn add_kernel<E: Numeric>(
    lhs: &Tensor<Line<E>>,
    rhs: &Tensor<Line<E>>,
    output: &mut Tensor<Line<E>>,
    num_elements: u32,
    #[define(E)] _dtype: StorageType,
) {
    if ABSOLUTE_POS < num_elements {
        output[ABSOLUTE_POS] = lhs[ABSOLUTE_POS] + rhs[ABSOLUTE_POS];
    }
}

#[cube(launch_unchecked)]
fn multiply_kernel<E: Numeric>(
    lhs: &Tensor<Line<E>>,
    rhs: &Tensor<Line<E>>,
    output: &mut Tensor<Line<E>>,
    num_elements: u32,
    #[define(E)] _dtype: StorageType,
) {
    if ABSOLUTE_POS < num_elements {
        output[ABSOLUTE_POS] = lhs[ABSOLUTE_POS] * rhs[ABSOLUTE_POS];
    }
}

#[cube(launch_unchecked)]
fn fill_dot_operands<E: Numeric>(
    lhs: &mut Tensor<Line<E>>,
    rhs: &mut Tensor<Line<E>>,
    num_elements: u32,
    #[define(E)] _dtype: StorageType,
) {
    if ABSOLUTE_POS < num_elements {
        let index = E::cast_from(ABSOLUTE_POS);
        lhs[ABSOLUTE_POS] = Line::new(index / E::from_int(10));
        rhs[ABSOLUTE_POS] = Line::new(E::from_int(1));
    }
}
