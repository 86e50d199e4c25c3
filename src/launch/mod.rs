//! Benchmark launch layer.
//!
//! Configuration, per-device contexts, kernel dispatch and the executor
//! that ties them into timed, verified measurements.

mod config;
mod context;
pub mod dispatch;
mod executor;

pub use config::{AddVariant, BenchConfig, BenchFamily, DeviceSelection, ExecutionPath};
pub use context::{DeviceContext, DeviceRegistry};
pub use executor::{run_benchmark, run_default_suite, run_suite};
