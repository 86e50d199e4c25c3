use super::Tolerance;
use crate::numeric::Real;
use crate::problem::Answer;

/// One value outside tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub result: f64,
    pub expected: f64,
    /// `result - expected`.
    pub difference: f64,
}

/// Outcome of comparing results with the reference answer.
///
/// Every mismatch is counted; only the first few are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Verification {
    pub checked: usize,
    pub mismatch_count: usize,
    pub mismatches: Vec<Mismatch>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatch_count == 0
    }

    fn record(&mut self, mismatch: Mismatch, max_reported: usize) {
        self.mismatch_count += 1;
        if self.mismatches.len() < max_reported {
            self.mismatches.push(mismatch);
        }
    }
}

/// Compares `results` element by element with `expected`.
///
/// Missing results (a shorter `results`) count as NaN mismatches.
pub fn verify_elements<T: Real>(
    results: &[T],
    expected: &[f64],
    tolerance: Tolerance,
    max_reported: usize,
) -> Verification {
    let mut verification = Verification {
        checked: expected.len(),
        ..Verification::default()
    };

    for (index, &expected) in expected.iter().enumerate() {
        let result = results.get(index).map_or(f64::NAN, |value| value.to_reference());
        if !tolerance.within(result, expected) {
            verification.record(
                Mismatch {
                    index,
                    result,
                    expected,
                    difference: result - expected,
                },
                max_reported,
            );
        }
    }
    verification
}

pub fn verify_scalar<T: Real>(result: T, expected: f64, tolerance: Tolerance) -> Verification {
    verify_elements(&[result], &[expected], tolerance, 1)
}

/// Checks `results` against either kind of answer.
pub fn verify_answer<T: Real>(
    results: &[T],
    answer: &Answer,
    tolerance: Tolerance,
    max_reported: usize,
) -> Verification {
    verify_elements(results, answer.as_slice(), tolerance, max_reported)
}
