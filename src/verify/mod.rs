//! Timing and correctness checks against the reference answer.

mod check;
mod timer;
mod tolerance;

pub use check::{Mismatch, Verification, verify_answer, verify_elements, verify_scalar};
pub use timer::timed;
pub use tolerance::Tolerance;
