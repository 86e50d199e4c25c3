use std::time::{Duration, Instant};

use crate::error::BenchResult;

/// Runs `f` and measures it on the monotonic clock.
///
/// `f` must only return once its results are on the host, i.e. after any
/// queue barrier and read-back, so the duration covers the whole operation.
pub fn timed<R>(f: impl FnOnce() -> BenchResult<R>) -> BenchResult<(R, Duration)> {
    let start = Instant::now();
    let value = f()?;
    Ok((value, start.elapsed()))
}
