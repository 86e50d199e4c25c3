//! Host execution paths: one thread, and a rayon pool.
//!
//! Parallel paths only write disjoint output elements or one private
//! accumulator slot per task.

use rayon::prelude::*;

use crate::error::{BenchError, BenchResult};
use crate::numeric::Real;
use crate::partition::PartitionPlan;
use crate::problem::EllMatrix;

fn check_lengths(what: &str, lengths: &[usize]) -> BenchResult<()> {
    if lengths.windows(2).any(|pair| pair[0] != pair[1]) {
        return Err(BenchError::invalid_problem(format!("{what}: operand lengths differ {lengths:?}")));
    }
    Ok(())
}

pub fn add_sequential<T: Real>(out: &mut [T], left: &[T], right: &[T]) -> BenchResult<()> {
    check_lengths("add", &[out.len(), left.len(), right.len()])?;
    for (out, (&l, &r)) in out.iter_mut().zip(left.iter().zip(right)) {
        *out = l + r;
    }
    Ok(())
}

pub fn add_parallel<T: Real>(out: &mut [T], left: &[T], right: &[T]) -> BenchResult<()> {
    check_lengths("add", &[out.len(), left.len(), right.len()])?;
    out.par_iter_mut()
        .zip(left.par_iter().zip(right.par_iter()))
        .for_each(|(out, (&l, &r))| *out = l + r);
    Ok(())
}

/// Left-to-right `Σ left[i] * right[i]`.
pub fn dot_sequential<T: Real>(left: &[T], right: &[T]) -> BenchResult<T> {
    check_lengths("dot", &[left.len(), right.len()])?;
    Ok(left
        .iter()
        .zip(right)
        .fold(T::zero(), |acc, (&l, &r)| acc + l * r))
}

/// Dot product split over `tasks` ranges, one accumulator per task,
/// combined in task order after the join.
pub fn dot_parallel<T: Real>(left: &[T], right: &[T], tasks: usize) -> BenchResult<T> {
    check_lengths("dot", &[left.len(), right.len()])?;
    if left.is_empty() {
        return Ok(T::zero());
    }

    let plan = PartitionPlan::new(left.len(), tasks)?;
    let mut partials = vec![T::zero(); plan.unit_count()];
    partials.par_iter_mut().enumerate().for_each(|(task, slot)| {
        let range = plan.range(task);
        *slot = left[range.clone()]
            .iter()
            .zip(&right[range])
            .fold(T::zero(), |acc, (&l, &r)| acc + l * r);
    });

    Ok(partials.into_iter().fold(T::zero(), |acc, partial| acc + partial))
}

fn check_matvec<T: Real>(out: &[T], matrix: &EllMatrix<T>, vector: &[T]) -> BenchResult<()> {
    check_lengths("matvec", &[out.len(), matrix.row_count(), vector.len()])
}

pub fn matvec_sequential<T: Real>(out: &mut [T], matrix: &EllMatrix<T>, vector: &[T]) -> BenchResult<()> {
    check_matvec(out, matrix, vector)?;
    for (y, row) in out.iter_mut().zip(matrix.rows()) {
        *y = row.dot(vector);
    }
    Ok(())
}

pub fn matvec_parallel<T: Real>(out: &mut [T], matrix: &EllMatrix<T>, vector: &[T]) -> BenchResult<()> {
    check_matvec(out, matrix, vector)?;
    out.par_iter_mut()
        .enumerate()
        .for_each(|(i, y)| *y = matrix.row(i).dot(vector));
    Ok(())
}
