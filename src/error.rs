//! Error types for benchmark setup and kernel dispatch.

/// Errors that can occur while preparing or running a benchmark.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BenchError {
    /// No usable compute backend or device.
    #[error("compute backend unavailable: {message}")]
    BackendUnavailable { message: String },

    /// Program build failed. `log` is the backend's build log, verbatim.
    #[error("program '{program}' failed to build\n{log}")]
    BuildFailed { program: String, log: String },

    /// Kernel name not present in the built program.
    #[error("kernel '{name}' not found")]
    KernelNotFound { name: String },

    /// Wrong number of arguments bound to a kernel.
    #[error("kernel '{kernel}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        kernel: &'static str,
        expected: usize,
        got: usize,
    },

    /// Argument of the wrong kind at a position.
    #[error("kernel '{kernel}' argument {position}: expected {expected}, got {got}")]
    ArgumentKind {
        kernel: &'static str,
        position: usize,
        expected: &'static str,
        got: &'static str,
    },

    /// Buffer access flags incompatible with how the kernel uses it.
    #[error("kernel '{kernel}' argument {position}: {message}")]
    BufferAccess {
        kernel: &'static str,
        position: usize,
        message: String,
    },

    /// Two buffer arguments share the same storage.
    #[error("kernel '{kernel}': arguments {first} and {second} share storage")]
    BufferAliasing {
        kernel: &'static str,
        first: usize,
        second: usize,
    },

    /// Element type does not match the precision the program was built for.
    #[error("kernel '{kernel}' was built for {built}, launched with {requested} buffers")]
    PrecisionMismatch {
        kernel: &'static str,
        built: &'static str,
        requested: &'static str,
    },

    /// Global/local sizes rejected by the device.
    #[error("invalid work shape: {message}")]
    InvalidWorkShape { message: String },

    /// Offset/length outside a buffer or host array.
    #[error("out of bounds: {message}")]
    OutOfBounds { message: String },

    /// Named buffer missing from a device context.
    #[error("buffer '{name}' not registered on device {device}")]
    BufferNotFound { name: String, device: usize },

    /// Partition request that cannot be satisfied.
    #[error("invalid partition: {message}")]
    InvalidPartition { message: String },

    /// Problem dimensions overflow the addressable range.
    #[error("problem too large: {message}")]
    ProblemTooLarge { message: String },

    /// Malformed problem input.
    #[error("invalid problem: {message}")]
    InvalidProblem { message: String },

    /// Unknown device ids or an empty selection.
    #[error("device selection: {message}")]
    DeviceSelection { message: String },

    /// Backend runtime failure (poisoned lock, closed stream, launch error).
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl BenchError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn work_shape(message: impl Into<String>) -> Self {
        Self::InvalidWorkShape {
            message: message.into(),
        }
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::OutOfBounds {
            message: message.into(),
        }
    }

    pub fn partition(message: impl Into<String>) -> Self {
        Self::InvalidPartition {
            message: message.into(),
        }
    }

    pub fn invalid_problem(message: impl Into<String>) -> Self {
        Self::InvalidProblem {
            message: message.into(),
        }
    }

    pub fn too_large(message: impl Into<String>) -> Self {
        Self::ProblemTooLarge {
            message: message.into(),
        }
    }

    /// Whether the error prevents any further measurement.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::BuildFailed { .. }
        )
    }
}

/// Result type for benchmark operations.
pub type BenchResult<T> = core::result::Result<T, BenchError>;
