//! # CubeK Reduction Bench
//!
//! Parallel reduction benchmarks: dense vector addition, dot product and
//! fixed-width sparse matrix-vector product, measured on a sequential CPU
//! path, a parallel CPU path and one or more accelerator queues.
//!
//! ## Features
//!
//! - Host-emulated compute backend with per-device in-order queues
//! - Five device reduction strategies sharing one pass planner
//! - Deterministic problems with `f64` reference answers
//! - Tolerance-based verification and wall-clock timing per measurement
//! - Optional cubecl kernels behind the `cube` feature
//!
//! ## Example
//!
//! ```ignore
//! use cubek_reduction_bench::{BenchConfig, Platform, run_benchmark};
//!
//! let platform = Platform::host(2, 256)?;
//! let report = run_benchmark(&platform, &BenchConfig::dot(1 << 20))?;
//! assert!(report.all_passed());
//! ```

pub mod backend;
pub mod error;
pub mod kernels;
pub mod launch;
pub mod numeric;
pub mod partition;
pub mod problem;
pub mod reduce;
pub mod report;
pub mod verify;

#[cfg(feature = "cube")]
pub mod cube;

pub use backend::{Buffer, CommandQueue, DeviceInfo, HostArray, MemoryAccess, Platform, Residency};
pub use error::{BenchError, BenchResult};
pub use launch::{
    AddVariant, BenchConfig, BenchFamily, DeviceSelection, ExecutionPath, run_benchmark, run_default_suite,
    run_suite,
};
pub use numeric::{Precision, Real};
pub use partition::PartitionPlan;
pub use reduce::{ReductionStrategy, reduce_on_device};
pub use report::{BenchReport, Measurement};
pub use verify::Tolerance;
