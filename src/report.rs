//! Plain-text rendering of benchmark results.

use core::fmt;
use std::time::Duration;

use crate::launch::{BenchFamily, ExecutionPath};
use crate::numeric::Precision;
use crate::verify::Verification;

/// One timed run of one variant.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub name: String,
    pub path: ExecutionPath,
    /// 0 for the cold run.
    pub repetition: usize,
    pub elapsed: Duration,
    pub verification: Verification,
}

impl Measurement {
    pub fn passed(&self) -> bool {
        self.verification.passed()
    }
}

/// Everything measured for one configuration.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub family: BenchFamily,
    pub precision: Precision,
    pub element_count: usize,
    pub platform: String,
    pub measurements: Vec<Measurement>,
}

impl BenchReport {
    pub fn all_passed(&self) -> bool {
        self.measurements.iter().all(Measurement::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter().filter(|m| !m.passed())
    }

    /// Measurements whose name contains `pattern`.
    pub fn find<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = &'a Measurement> + 'a {
        self.measurements.iter().filter(move |m| m.name.contains(pattern))
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "== {} / {} / {} elements ==",
            self.family.name(),
            self.precision.type_name(),
            self.element_count
        )?;
        writeln!(f, "{}", self.platform)?;
        for m in &self.measurements {
            let status = if m.passed() {
                "ok".to_string()
            } else {
                format!("FAILED ({} of {})", m.verification.mismatch_count, m.verification.checked)
            };
            writeln!(
                f,
                "  {:<48} #{} {:>12.3} ms  {}",
                m.name,
                m.repetition,
                m.elapsed.as_secs_f64() * 1e3,
                status
            )?;
            for mismatch in &m.verification.mismatches {
                writeln!(
                    f,
                    "      [{}] result {} expected {} difference {:e}",
                    mismatch.index, mismatch.result, mismatch.expected, mismatch.difference
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::Mismatch;

    #[test]
    fn failures_are_rendered_with_their_indices() {
        let report = BenchReport {
            family: BenchFamily::Dot,
            precision: Precision::Double,
            element_count: 4,
            platform: "test platform".to_string(),
            measurements: vec![
                Measurement {
                    name: "dot / single CPU".to_string(),
                    path: ExecutionPath::CpuSequential,
                    repetition: 0,
                    elapsed: Duration::from_millis(2),
                    verification: Verification {
                        checked: 1,
                        ..Verification::default()
                    },
                },
                Measurement {
                    name: "dot / single device / bit-shift".to_string(),
                    path: ExecutionPath::SingleDevice,
                    repetition: 1,
                    elapsed: Duration::from_millis(1),
                    verification: Verification {
                        checked: 1,
                        mismatch_count: 1,
                        mismatches: vec![Mismatch {
                            index: 0,
                            result: 1.0,
                            expected: 2.0,
                            difference: -1.0,
                        }],
                    },
                },
            ],
        };

        assert!(!report.all_passed());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.find("single device").count(), 1);
        let text = report.to_string();
        assert!(text.contains("vector dot / double / 4 elements"));
        assert!(text.contains("FAILED (1 of 1)"));
        assert!(text.contains("[0] result 1 expected 2"));
    }
}
