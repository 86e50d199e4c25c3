//! Dense vector inputs for addition and dot product.

use super::Answer;
use crate::numeric::Real;

/// Fill rule for the two operand vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFill {
    /// `left[i] = i / 10000`, `right[i] = 0`.
    Addition,
    /// `left[i] = i / 10`, `right[i] = 1`.
    Dot,
}

impl VectorFill {
    fn left(self, index: usize) -> f64 {
        match self {
            VectorFill::Addition => index as f64 / 10000.0,
            VectorFill::Dot => index as f64 / 10.0,
        }
    }

    fn right(self, _index: usize) -> f64 {
        match self {
            VectorFill::Addition => 0.0,
            VectorFill::Dot => 1.0,
        }
    }
}

/// Two equally sized operand vectors.
#[derive(Debug, Clone)]
pub struct VectorProblem<T> {
    pub left: Vec<T>,
    pub right: Vec<T>,
}

impl<T: Real> VectorProblem<T> {
    pub fn generate(count: usize, fill: VectorFill) -> Self {
        Self::from_fn(count, |i| fill.left(i), |i| fill.right(i))
    }

    /// Builds both operands from per-index functions.
    pub fn from_fn(
        count: usize,
        left: impl Fn(usize) -> f64,
        right: impl Fn(usize) -> f64,
    ) -> Self {
        Self {
            left: (0..count).map(|i| T::from_reference(left(i))).collect(),
            right: (0..count).map(|i| T::from_reference(right(i))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// `answer[i] = left[i] + right[i]`.
    pub fn addition_answer(&self) -> Answer {
        Answer::PerElement(
            self.left
                .iter()
                .zip(&self.right)
                .map(|(l, r)| l.to_reference() + r.to_reference())
                .collect(),
        )
    }

    /// `answer = Σ left[i] * right[i]`, summed left to right.
    pub fn dot_answer(&self) -> Answer {
        let mut sum = 0.0f64;
        for (l, r) in self.left.iter().zip(&self.right) {
            sum += l.to_reference() * r.to_reference();
        }
        Answer::Scalar(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_fill_is_index_driven() {
        let problem = VectorProblem::<f64>::generate(5, VectorFill::Addition);
        assert_eq!(problem.left, vec![0.0, 0.0001, 0.0002, 0.0003, 0.0004]);
        assert!(problem.right.iter().all(|&r| r == 0.0));
        assert_eq!(problem.addition_answer().as_slice(), problem.left.as_slice());
    }

    #[test]
    fn dot_answer_is_sequential_sum() {
        let problem = VectorProblem::<f64>::generate(4, VectorFill::Dot);
        // 0.0 + 0.1 + 0.2 + 0.3
        match problem.dot_answer() {
            Answer::Scalar(value) => assert!((value - 0.6).abs() < 1e-12),
            other => panic!("unexpected answer {other:?}"),
        }
    }

    #[test]
    fn generation_is_reproducible() {
        let a = VectorProblem::<f32>::generate(1000, VectorFill::Dot);
        let b = VectorProblem::<f32>::generate(1000, VectorFill::Dot);
        assert_eq!(a.left, b.left);
        assert_eq!(a.right, b.right);
    }
}
