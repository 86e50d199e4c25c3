//! Integration tests for cubek-reduction-bench.

#[cfg(feature = "cube")]
mod cube_tests;
mod elementwise_tests;
mod executor_tests;
mod matvec_tests;
mod partition_tests;
mod reduction_tests;
mod verify_tests;
