//! Device results checked against the host reference.

use cubecl::Runtime;
use cubecl::client::ComputeClient;
use cubecl::prelude::*;
use cubecl::std::tensor::TensorHandle;

use super::{launch_add, launch_dot, launch_fill_dot_operands, launch_matvec};
use crate::error::{BenchError, BenchResult};
use crate::numeric::Real;
use crate::problem::{MatvecProblem, VectorFill, VectorProblem};
use crate::reduce::ReductionStrategy;
use crate::verify::{Tolerance, Verification, verify_answer};

/// Mismatches kept per device check.
const MAX_REPORTED: usize = 10;

fn upload<R: Runtime, E: CubeElement>(client: &ComputeClient<R>, data: &[E]) -> TensorHandle<R> {
    let handle = client.create_from_slice(E::as_bytes(data));
    TensorHandle::new_contiguous(vec![data.len()], handle, E::as_type_native_unchecked())
}

fn download<R: Runtime, E: CubeElement>(client: &ComputeClient<R>, tensor: &TensorHandle<R>) -> Vec<E> {
    let bytes = client.read_one(tensor.handle.clone());
    E::from_bytes(&bytes).to_vec()
}

/// Runs the dot benchmark once on `client` and verifies the sum.
pub fn verify_dot<R: Runtime, E: CubeElement + Numeric + Real>(
    client: &ComputeClient<R>,
    strategy: ReductionStrategy,
    count: usize,
    cube_size: u32,
) -> BenchResult<Verification> {
    let dtype = E::as_type_native_unchecked();
    let mut lhs = TensorHandle::zeros(client, vec![count], dtype);
    let mut rhs = TensorHandle::zeros(client, vec![count], dtype);
    let product = TensorHandle::zeros(client, vec![count], dtype);
    launch_fill_dot_operands::<R, E>(client, &mut lhs, &mut rhs)?;

    let result = launch_dot::<R, E>(client, strategy, &lhs, &rhs, product, cube_size)?;
    let sum = download::<R, E>(client, &result)
        .first()
        .copied()
        .ok_or_else(|| BenchError::backend("empty read-back from the reduction result"))?;

    let answer = VectorProblem::<E>::generate(count, VectorFill::Dot).dot_answer();
    let verification = verify_answer(&[sum], &answer, Tolerance::for_precision(E::PRECISION), 1);
    if !verification.passed() {
        log::warn!("{strategy} on {count} elements: {sum:?} differs from the reference");
    }
    Ok(verification)
}

/// Adds the generated addition operands on `client` and verifies every element.
pub fn verify_add<R: Runtime, E: CubeElement + Numeric + Real>(
    client: &ComputeClient<R>,
    count: usize,
) -> BenchResult<Verification> {
    let problem = VectorProblem::<E>::generate(count, VectorFill::Addition);
    let lhs = upload(client, &problem.left);
    let rhs = upload(client, &problem.right);
    let mut output = TensorHandle::zeros(client, vec![count], E::as_type_native_unchecked());
    launch_add::<R, E>(client, &lhs, &rhs, &mut output)?;

    let results = download::<R, E>(client, &output);
    let verification = verify_answer(
        &results,
        &problem.addition_answer(),
        Tolerance::for_precision(E::PRECISION),
        MAX_REPORTED,
    );
    if !verification.passed() {
        log::warn!("add on {count} elements: {} mismatches", verification.mismatch_count);
    }
    Ok(verification)
}

/// Runs `problem` through the matvec kernel on `client` and verifies every row.
pub fn verify_matvec<R: Runtime, E: CubeElement + Numeric + Real>(
    client: &ComputeClient<R>,
    problem: &MatvecProblem<E>,
) -> BenchResult<Verification> {
    let matrix = &problem.matrix;
    let values = upload(client, matrix.values());
    let columns = upload(client, matrix.column_indices());
    let nonzero_counts = upload(client, matrix.nonzero_counts());
    let vector = upload(client, &problem.vector);
    let mut output = TensorHandle::zeros(client, vec![matrix.row_count()], E::as_type_native_unchecked());
    launch_matvec::<R, E>(
        client,
        &values,
        &vector,
        &columns,
        &nonzero_counts,
        &mut output,
        matrix.max_nonzero(),
    )?;

    let results = download::<R, E>(client, &output);
    let verification = verify_answer(
        &results,
        &problem.answer(),
        Tolerance::for_precision(E::PRECISION),
        MAX_REPORTED,
    );
    if !verification.passed() {
        log::warn!(
            "matvec on {} rows: {} mismatches",
            matrix.row_count(),
            verification.mismatch_count
        );
    }
    Ok(verification)
}
