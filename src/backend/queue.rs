//! In-order command streams.
//!
//! Each queue owns a worker thread that executes submissions strictly in
//! submission order. Different queues are unordered with respect to each
//! other; [`CommandQueue::finish`] is the only barrier.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use super::DeviceInfo;
use super::buffer::{Buffer, HostArray};
use crate::error::{BenchError, BenchResult};
use crate::kernels::KernelLaunch;
use crate::numeric::Real;

type Job = Box<dyn FnOnce() -> BenchResult<()> + Send + 'static>;

enum Command {
    Run {
        job: Job,
        done: mpsc::Sender<BenchResult<()>>,
    },
    Finish(mpsc::Sender<BenchResult<()>>),
}

/// Completion handle for one submitted command.
#[derive(Debug)]
pub struct Event {
    done: mpsc::Receiver<BenchResult<()>>,
}

impl Event {
    /// Blocks until the command has run and returns its outcome.
    pub fn wait(self) -> BenchResult<()> {
        self.done
            .recv()
            .map_err(|_| BenchError::backend("command stream closed before completion"))?
    }
}

/// Sequential command stream bound to one device.
#[derive(Debug)]
pub struct CommandQueue {
    device: usize,
    sender: Option<mpsc::Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl CommandQueue {
    pub fn new(device: &DeviceInfo) -> BenchResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("queue-{}", device.id))
            .spawn(move || run_stream(receiver))
            .map_err(|e| BenchError::backend(format!("cannot start command stream: {e}")))?;

        Ok(Self {
            device: device.id,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn device(&self) -> usize {
        self.device
    }

    fn submit(&self, job: Job) -> BenchResult<Event> {
        let (done, receiver) = mpsc::channel();
        self.sender
            .as_ref()
            .ok_or_else(|| BenchError::backend("command stream shut down"))?
            .send(Command::Run { job, done })
            .map_err(|_| BenchError::backend(format!("command stream {} closed", self.device)))?;
        Ok(Event { done: receiver })
    }

    /// Submits a validated kernel launch.
    pub fn enqueue_kernel<T: Real>(&self, launch: KernelLaunch<T>) -> BenchResult<Event> {
        log::debug!(
            "queue {}: {} global={} local={:?}",
            self.device,
            launch.kernel_name().as_str(),
            launch.shape().global,
            launch.shape().local
        );
        self.submit(Box::new(move || launch.execute()))
    }

    /// Copies `len` elements from `host[host_offset..]` into `buffer[buffer_offset..]`.
    pub fn enqueue_write<E>(
        &self,
        host: &HostArray<E>,
        host_offset: usize,
        buffer: &Buffer<E>,
        buffer_offset: usize,
        len: usize,
    ) -> BenchResult<Event>
    where
        E: Copy + Default + Send + Sync + 'static,
    {
        check_range("write source", host_offset, len, host.len()?)?;
        check_range("write target", buffer_offset, len, buffer.len())?;

        let host = host.clone();
        let buffer = buffer.clone();
        self.submit(Box::new(move || {
            if buffer.is_backed_by(&host) {
                let target = buffer.offset() + buffer_offset;
                if target != host_offset {
                    host.write()?
                        .copy_within(host_offset..host_offset + len, target);
                }
                return Ok(());
            }
            let source = host.read()?;
            let mut target = buffer.write()?;
            target[buffer_offset..buffer_offset + len]
                .copy_from_slice(&source[host_offset..host_offset + len]);
            Ok(())
        }))
    }

    /// Copies `len` elements from `buffer[buffer_offset..]` into `host[host_offset..]`.
    pub fn enqueue_read<E>(
        &self,
        buffer: &Buffer<E>,
        buffer_offset: usize,
        host: &HostArray<E>,
        host_offset: usize,
        len: usize,
    ) -> BenchResult<Event>
    where
        E: Copy + Default + Send + Sync + 'static,
    {
        check_range("read source", buffer_offset, len, buffer.len())?;
        check_range("read target", host_offset, len, host.len()?)?;

        let host = host.clone();
        let buffer = buffer.clone();
        self.submit(Box::new(move || {
            if buffer.is_backed_by(&host) {
                let source = buffer.offset() + buffer_offset;
                if source != host_offset {
                    host.write()?
                        .copy_within(source..source + len, host_offset);
                }
                return Ok(());
            }
            let source = buffer.read()?;
            let mut target = host.write()?;
            target[host_offset..host_offset + len]
                .copy_from_slice(&source[buffer_offset..buffer_offset + len]);
            Ok(())
        }))
    }

    /// Sets every element of `buffer` to `value`.
    pub fn enqueue_fill<E>(&self, buffer: &Buffer<E>, value: E) -> BenchResult<Event>
    where
        E: Copy + Default + Send + Sync + 'static,
    {
        let buffer = buffer.clone();
        self.submit(Box::new(move || {
            buffer.write()?.fill(value);
            Ok(())
        }))
    }

    /// Blocks until every submitted command has run.
    ///
    /// Returns the first error raised on this stream since the last barrier.
    pub fn finish(&self) -> BenchResult<()> {
        let (reply, receiver) = mpsc::channel();
        self.sender
            .as_ref()
            .ok_or_else(|| BenchError::backend("command stream shut down"))?
            .send(Command::Finish(reply))
            .map_err(|_| BenchError::backend(format!("command stream {} closed", self.device)))?;
        receiver
            .recv()
            .map_err(|_| BenchError::backend(format!("command stream {} died", self.device)))?
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_stream(receiver: mpsc::Receiver<Command>) {
    let mut first_error: Option<BenchError> = None;
    for command in receiver {
        match command {
            Command::Run { job, done } => {
                let result = job();
                if let Err(err) = &result {
                    log::debug!("command failed: {err}");
                    first_error.get_or_insert_with(|| err.clone());
                }
                let _ = done.send(result);
            }
            Command::Finish(reply) => {
                let _ = reply.send(first_error.take().map_or(Ok(()), Err));
            }
        }
    }
}

fn check_range(what: &str, offset: usize, len: usize, available: usize) -> BenchResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= available => Ok(()),
        _ => Err(BenchError::out_of_bounds(format!(
            "{what} {offset}..{} exceeds {available} elements",
            offset.saturating_add(len)
        ))),
    }
}
