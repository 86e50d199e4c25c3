//! Deterministic benchmark inputs and their reference answers.
//!
//! Every generated element is a pure function of its index, so two runs
//! (or two machines) always see the same data.

mod dense;
mod sparse;

pub use dense::{VectorFill, VectorProblem};
pub use sparse::{BandSelector, EllMatrix, MatvecProblem, SparseRow};

/// Reference result computed by straight sequential evaluation in `f64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Scalar(f64),
    PerElement(Vec<f64>),
}

impl Answer {
    /// Number of values the answer holds.
    pub fn len(&self) -> usize {
        match self {
            Answer::Scalar(_) => 1,
            Answer::PerElement(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            Answer::Scalar(value) => core::slice::from_ref(value),
            Answer::PerElement(values) => values,
        }
    }
}
