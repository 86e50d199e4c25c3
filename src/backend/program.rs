//! Program build: kernel source selection plus preprocessor-style flags.
//!
//! The flag string follows the OpenCL convention the kernels were written
//! against (`-D REAL=double -D MAX_NONZERO_COUNT=30 -Werror`). Build
//! diagnostics are collected into a log that is surfaced verbatim on failure.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use super::Platform;
use crate::error::{BenchError, BenchResult};
use crate::kernels::KernelName;
use crate::numeric::Precision;

pub const DEFINE_REAL: &str = "REAL";
pub const DEFINE_MAX_NONZERO: &str = "MAX_NONZERO_COUNT";
pub const DEFINE_COUNT_PER_WORK_ITEM: &str = "COUNT_PER_WORKITEM";
pub const DEFINE_VECTOR_WIDTH: &str = "VECTOR_WIDTH";

/// Vector widths the device vector types exist for.
const VECTOR_WIDTHS: [usize; 5] = [2, 3, 4, 8, 16];

/// A named set of kernels compiled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSource {
    pub name: &'static str,
    pub kernels: &'static [KernelName],
}

impl ProgramSource {
    pub const VECTOR_ADDITION: ProgramSource = ProgramSource {
        name: "VectorAddition",
        kernels: &[
            KernelName::AddOneElement,
            KernelName::AddMoreElement,
            KernelName::AddOneVector,
            KernelName::AddMoreVector,
        ],
    };

    pub const VECTOR_DOT: ProgramSource = ProgramSource {
        name: "VectorDot",
        kernels: &[
            KernelName::MultiplyEachElement,
            KernelName::ReductionSum0,
            KernelName::ReductionSum1,
            KernelName::ReductionSum2,
            KernelName::ReductionSum3,
            KernelName::ReductionSum4,
        ],
    };

    pub const MATRIX_X_VECTOR: ProgramSource = ProgramSource {
        name: "Matrix_x_Vector",
        kernels: &[KernelName::MatrixXVector],
    };
}

/// Parsed build flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub precision: Precision,
    pub max_nonzero_count: Option<usize>,
    pub count_per_work_item: Option<usize>,
    pub vector_width: Option<usize>,
    pub warnings_as_errors: bool,
    /// Defines the kernels do not interpret.
    pub extra_defines: BTreeMap<String, String>,
}

impl BuildOptions {
    pub fn new(precision: Precision) -> Self {
        Self {
            precision,
            max_nonzero_count: None,
            count_per_work_item: None,
            vector_width: None,
            warnings_as_errors: true,
            extra_defines: BTreeMap::new(),
        }
    }

    pub fn with_max_nonzero_count(mut self, count: usize) -> Self {
        self.max_nonzero_count = Some(count);
        self
    }

    pub fn with_count_per_work_item(mut self, count: usize) -> Self {
        self.count_per_work_item = Some(count);
        self
    }

    pub fn with_vector_width(mut self, width: usize) -> Self {
        self.vector_width = Some(width);
        self
    }

    /// Renders the options as a flag string.
    pub fn to_flags(&self) -> String {
        let mut flags = format!("-D {}={}", DEFINE_REAL, self.precision.type_name());
        if let Some(count) = self.max_nonzero_count {
            let _ = write!(flags, " -D {DEFINE_MAX_NONZERO}={count}");
        }
        if let Some(count) = self.count_per_work_item {
            let _ = write!(flags, " -D {DEFINE_COUNT_PER_WORK_ITEM}={count}");
        }
        if let Some(width) = self.vector_width {
            let _ = write!(flags, " -D {DEFINE_VECTOR_WIDTH}={width}");
        }
        for (name, value) in &self.extra_defines {
            let _ = write!(flags, " -D {name}={value}");
        }
        if self.warnings_as_errors {
            flags.push_str(" -Werror");
        }
        flags
    }

    /// Parses a flag string. On failure returns the diagnostic log.
    pub fn parse(flags: &str) -> Result<Self, String> {
        let mut log = String::new();
        let mut defines = BTreeMap::new();
        let mut warnings_as_errors = false;

        let mut tokens = flags.split_whitespace();
        while let Some(token) = tokens.next() {
            let define = if token == "-D" {
                match tokens.next() {
                    Some(define) => define,
                    None => {
                        let _ = writeln!(log, "error: macro name missing after '-D'");
                        continue;
                    }
                }
            } else if let Some(define) = token.strip_prefix("-D") {
                define
            } else if token == "-Werror" {
                warnings_as_errors = true;
                continue;
            } else {
                let _ = writeln!(log, "error: unsupported option '{token}'");
                continue;
            };

            let (name, value) = define.split_once('=').unwrap_or((define, "1"));
            if name.is_empty() {
                let _ = writeln!(log, "error: macro name missing in '-D{define}'");
                continue;
            }
            defines.insert(name.to_string(), value.to_string());
        }

        let precision = match defines.remove(DEFINE_REAL) {
            Some(real) => match Precision::from_type_name(&real) {
                Some(precision) => Some(precision),
                None => {
                    let _ = writeln!(log, "error: unknown type name '{real}'");
                    None
                }
            },
            None => {
                let _ = writeln!(log, "error: unknown type name 'REAL'");
                None
            }
        };

        let max_nonzero_count = take_positive(&mut defines, DEFINE_MAX_NONZERO, &mut log);
        let count_per_work_item = take_positive(&mut defines, DEFINE_COUNT_PER_WORK_ITEM, &mut log);
        let vector_width = take_positive(&mut defines, DEFINE_VECTOR_WIDTH, &mut log);
        if let Some(width) = vector_width.filter(|width| !VECTOR_WIDTHS.contains(width)) {
            let _ = writeln!(log, "error: invalid vector width {width}, expected one of {VECTOR_WIDTHS:?}");
        }

        match precision {
            Some(precision) if log.is_empty() => Ok(Self {
                precision,
                max_nonzero_count,
                count_per_work_item,
                vector_width,
                warnings_as_errors,
                extra_defines: defines,
            }),
            _ => Err(log),
        }
    }

    /// Define a kernel needs in order to compile, if it is missing.
    fn missing_define(&self, kernel: KernelName) -> Option<&'static str> {
        match kernel {
            KernelName::MatrixXVector if self.max_nonzero_count.is_none() => Some(DEFINE_MAX_NONZERO),
            KernelName::AddMoreElement | KernelName::AddMoreVector
                if self.count_per_work_item.is_none() =>
            {
                Some(DEFINE_COUNT_PER_WORK_ITEM)
            }
            KernelName::AddOneVector | KernelName::AddMoreVector if self.vector_width.is_none() => {
                Some(DEFINE_VECTOR_WIDTH)
            }
            _ => None,
        }
    }
}

fn take_positive(defines: &mut BTreeMap<String, String>, name: &str, log: &mut String) -> Option<usize> {
    let raw = defines.remove(name)?;
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            let _ = writeln!(log, "error: {name} must be a positive integer, got '{raw}'");
            None
        }
    }
}

/// Handle to a compiled kernel. Cheap to clone; one per device.
#[derive(Debug, Clone)]
pub struct Kernel {
    name: KernelName,
    options: Arc<BuildOptions>,
}

impl Kernel {
    pub fn name(&self) -> KernelName {
        self.name
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }
}

/// Successfully built program.
#[derive(Debug, Clone)]
pub struct Program {
    source: ProgramSource,
    options: Arc<BuildOptions>,
}

impl Program {
    pub fn name(&self) -> &'static str {
        self.source.name
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn kernel_names(&self) -> &'static [KernelName] {
        self.source.kernels
    }

    /// Creates a kernel handle by its stable name.
    pub fn create_kernel(&self, name: &str) -> BenchResult<Kernel> {
        self.source
            .kernels
            .iter()
            .find(|kernel| kernel.as_str() == name)
            .map(|&kernel| Kernel {
                name: kernel,
                options: Arc::clone(&self.options),
            })
            .ok_or_else(|| BenchError::KernelNotFound {
                name: name.to_string(),
            })
    }
}

/// Builds `source` for every device of `platform`.
pub fn build_program(platform: &Platform, source: ProgramSource, flags: &str) -> BenchResult<Program> {
    if platform.devices().is_empty() {
        return Err(BenchError::BackendUnavailable {
            message: format!("no devices to build '{}' for", source.name),
        });
    }

    let options = BuildOptions::parse(flags).map_err(|log| BenchError::BuildFailed {
        program: source.name.to_string(),
        log,
    })?;

    let mut log = String::new();
    for &kernel in source.kernels {
        if let Some(define) = options.missing_define(kernel) {
            let _ = writeln!(
                log,
                "{}:{}: error: use of undeclared identifier '{}'",
                source.name,
                kernel.as_str(),
                define
            );
        }
    }
    if !log.is_empty() {
        return Err(BenchError::BuildFailed {
            program: source.name.to_string(),
            log,
        });
    }

    log::info!(
        "Built program {} for {} device(s) with '{}'",
        source.name,
        platform.devices().len(),
        flags.trim()
    );

    Ok(Program {
        source,
        options: Arc::new(options),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_round_trip_through_parser() {
        let options = BuildOptions::new(Precision::Double)
            .with_max_nonzero_count(30)
            .with_vector_width(16)
            .with_count_per_work_item(16);
        let parsed = BuildOptions::parse(&options.to_flags()).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn attached_define_syntax_is_accepted() {
        let parsed = BuildOptions::parse("-DREAL=float -DMAX_NONZERO_COUNT=8").unwrap();
        assert_eq!(parsed.precision, Precision::Single);
        assert_eq!(parsed.max_nonzero_count, Some(8));
        assert!(!parsed.warnings_as_errors);
    }

    #[test]
    fn bad_flags_produce_a_log() {
        let log = BuildOptions::parse("-D REAL=quad -O9 -D VECTOR_WIDTH=5").unwrap_err();
        assert!(log.contains("unknown type name 'quad'"));
        assert!(log.contains("unsupported option '-O9'"));
        assert!(log.contains("invalid vector width 5"));
    }

    #[test]
    fn missing_define_fails_the_build() {
        let platform = Platform::host(1, 64).unwrap();
        let err = build_program(&platform, ProgramSource::MATRIX_X_VECTOR, "-D REAL=double").unwrap_err();
        match err {
            BenchError::BuildFailed { program, log } => {
                assert_eq!(program, "Matrix_x_Vector");
                assert!(log.contains("MAX_NONZERO_COUNT"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn kernels_are_found_by_name() {
        let platform = Platform::host(1, 64).unwrap();
        let program = build_program(&platform, ProgramSource::VECTOR_DOT, "-D REAL=double").unwrap();
        assert_eq!(program.create_kernel("ReductionSum3").unwrap().name(), KernelName::ReductionSum3);
        assert!(matches!(
            program.create_kernel("ReductionSum9"),
            Err(BenchError::KernelNotFound { .. })
        ));
    }
}
