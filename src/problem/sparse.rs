//! Fixed-width (ELLPACK-style) sparse matrix and the banded matvec problem.

use super::Answer;
use crate::error::{BenchError, BenchResult};
use crate::numeric::Real;

/// Which off-diagonal entries of the band become nonzeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandSelector {
    /// Every column of the window except the diagonal.
    #[default]
    AllOffDiagonal,
    /// Only columns at an odd distance from the diagonal.
    OddOffset,
}

impl BandSelector {
    pub fn includes(self, row: usize, column: usize) -> bool {
        if row == column {
            return false;
        }
        match self {
            BandSelector::AllOffDiagonal => true,
            BandSelector::OddOffset => row.abs_diff(column) % 2 == 1,
        }
    }
}

/// View of one matrix row: the first `nonzero_count` slots are live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseRow<'a, T> {
    pub nonzero_count: usize,
    pub values: &'a [T],
    pub column_indices: &'a [u32],
}

impl<T: Real> SparseRow<'_, T> {
    /// `Σ values[j] * vector[column_indices[j]]` over the live slots.
    pub fn dot(&self, vector: &[T]) -> T {
        let mut acc = T::zero();
        for j in 0..self.nonzero_count {
            acc = acc + self.values[j] * vector[self.column_indices[j] as usize];
        }
        acc
    }
}

/// Row-major fixed-width sparse matrix.
///
/// Row `i` owns slots `[i * K, (i + 1) * K)` of `values` and
/// `column_indices`; `nonzero_counts[i]` of them are live.
#[derive(Debug, Clone, PartialEq)]
pub struct EllMatrix<T> {
    row_count: usize,
    max_nonzero: usize,
    values: Vec<T>,
    column_indices: Vec<u32>,
    nonzero_counts: Vec<u32>,
}

impl<T: Real> EllMatrix<T> {
    /// Generates the banded matrix used by the benchmark.
    ///
    /// Row `i` connects to columns in `[i - K/2 + 1, i + K/2)` accepted by
    /// `selector`, with `a_ij = (i + j) / 10`. Slot 0 holds the diagonal,
    /// set to the sum of the row's off-diagonal values.
    pub fn banded(row_count: usize, max_nonzero: usize, selector: BandSelector) -> BenchResult<Self> {
        let slots = checked_layout(row_count, max_nonzero)?;

        let mut values = vec![T::zero(); slots];
        let mut column_indices = vec![0u32; slots];
        let mut nonzero_counts = vec![0u32; row_count];
        let half = max_nonzero / 2;

        for i in 0..row_count {
            let base = i * max_nonzero;
            let mut diagonal = 0.0f64;
            let mut count = 1usize;
            column_indices[base] = i as u32;

            let first = (i + 1).saturating_sub(half);
            let last = (i + half).min(row_count);
            for j in first..last {
                if !selector.includes(i, j) {
                    continue;
                }
                let a_ij = (i + j) as f64 / 10.0;
                values[base + count] = T::from_reference(a_ij);
                column_indices[base + count] = j as u32;
                diagonal += a_ij;
                count += 1;
            }

            values[base] = T::from_reference(diagonal);
            nonzero_counts[i] = count as u32;
        }

        Ok(Self {
            row_count,
            max_nonzero,
            values,
            column_indices,
            nonzero_counts,
        })
    }

    /// Builds a matrix from explicit `(column, value)` rows.
    pub fn from_rows(max_nonzero: usize, rows: &[Vec<(u32, T)>]) -> BenchResult<Self> {
        let row_count = rows.len();
        let slots = checked_layout(row_count, max_nonzero)?;

        let mut values = vec![T::zero(); slots];
        let mut column_indices = vec![0u32; slots];
        let mut nonzero_counts = Vec::with_capacity(row_count);

        for (i, row) in rows.iter().enumerate() {
            if row.len() > max_nonzero {
                return Err(BenchError::invalid_problem(format!(
                    "row {i} has {} nonzeros, capacity is {max_nonzero}",
                    row.len()
                )));
            }
            for (j, &(column, value)) in row.iter().enumerate() {
                if column as usize >= row_count {
                    return Err(BenchError::invalid_problem(format!(
                        "row {i} references column {column}, matrix has {row_count} columns"
                    )));
                }
                values[i * max_nonzero + j] = value;
                column_indices[i * max_nonzero + j] = column;
            }
            nonzero_counts.push(row.len() as u32);
        }

        Ok(Self {
            row_count,
            max_nonzero,
            values,
            column_indices,
            nonzero_counts,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn max_nonzero(&self) -> usize {
        self.max_nonzero
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn column_indices(&self) -> &[u32] {
        &self.column_indices
    }

    pub fn nonzero_counts(&self) -> &[u32] {
        &self.nonzero_counts
    }

    pub fn row(&self, index: usize) -> SparseRow<'_, T> {
        let slots = index * self.max_nonzero..(index + 1) * self.max_nonzero;
        SparseRow {
            nonzero_count: self.nonzero_counts[index] as usize,
            values: &self.values[slots.clone()],
            column_indices: &self.column_indices[slots],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = SparseRow<'_, T>> {
        (0..self.row_count).map(|i| self.row(i))
    }
}

fn checked_layout(row_count: usize, max_nonzero: usize) -> BenchResult<usize> {
    if max_nonzero == 0 {
        return Err(BenchError::invalid_problem(
            "rows need at least one slot for the diagonal",
        ));
    }
    if row_count > u32::MAX as usize {
        return Err(BenchError::too_large(format!(
            "{row_count} rows exceed the 32-bit column index range"
        )));
    }
    row_count.checked_mul(max_nonzero).ok_or_else(|| {
        BenchError::too_large(format!("{row_count} rows x {max_nonzero} slots overflows"))
    })
}

/// Sparse matrix plus the vector it multiplies.
#[derive(Debug, Clone)]
pub struct MatvecProblem<T> {
    pub matrix: EllMatrix<T>,
    pub vector: Vec<T>,
}

impl<T: Real> MatvecProblem<T> {
    /// Banded matrix with `x[i] = i / 10`.
    pub fn generate(row_count: usize, max_nonzero: usize, selector: BandSelector) -> BenchResult<Self> {
        let matrix = EllMatrix::banded(row_count, max_nonzero, selector)?;
        let vector = (0..row_count).map(|i| T::from_reference(i as f64 / 10.0)).collect();
        Ok(Self { matrix, vector })
    }

    pub fn new(matrix: EllMatrix<T>, vector: Vec<T>) -> BenchResult<Self> {
        if vector.len() != matrix.row_count() {
            return Err(BenchError::invalid_problem(format!(
                "vector has {} entries, matrix has {} rows",
                vector.len(),
                matrix.row_count()
            )));
        }
        Ok(Self { matrix, vector })
    }

    pub fn row_count(&self) -> usize {
        self.matrix.row_count()
    }

    /// `answer[i] = Σ_j row[i].value[j] * vector[row[i].column[j]]`.
    pub fn answer(&self) -> Answer {
        Answer::PerElement(
            self.matrix
                .rows()
                .map(|row| {
                    let mut sum = 0.0f64;
                    for j in 0..row.nonzero_count {
                        let x = self.vector[row.column_indices[j] as usize];
                        sum += row.values[j].to_reference() * x.to_reference();
                    }
                    sum
                })
                .collect(),
        )
    }
}
