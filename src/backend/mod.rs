//! Host-emulated compute backend.
//!
//! Mirrors the shape of an OpenCL-style runtime: a platform with an ordered
//! device list, programs built from source plus flags, buffers with access
//! and residency flags, and one in-order command queue per device. Kernels
//! execute on the host with rayon.

mod buffer;
mod program;
mod queue;

pub use buffer::{Buffer, HostArray, MemoryAccess, Residency};
pub use program::{
    BuildOptions, DEFINE_COUNT_PER_WORK_ITEM, DEFINE_MAX_NONZERO, DEFINE_REAL, DEFINE_VECTOR_WIDTH,
    Kernel, Program, ProgramSource, build_program,
};
pub use queue::{CommandQueue, Event};

use crate::error::{BenchError, BenchResult};

/// One compute unit of the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: usize,
    pub name: String,
    pub vendor: String,
    pub max_work_group_size: usize,
}

/// Ordered set of devices sharing one runtime.
#[derive(Debug, Clone)]
pub struct Platform {
    pub name: String,
    pub version: String,
    devices: Vec<DeviceInfo>,
}

impl Platform {
    /// Host platform exposing `device_count` emulated devices.
    pub fn host(device_count: usize, max_work_group_size: usize) -> BenchResult<Self> {
        if device_count == 0 {
            return Err(BenchError::BackendUnavailable {
                message: "platform has no devices".to_string(),
            });
        }
        if !max_work_group_size.is_power_of_two() {
            return Err(BenchError::BackendUnavailable {
                message: format!("max work-group size {max_work_group_size} is not a power of two"),
            });
        }

        let threads = rayon::current_num_threads();
        let devices = (0..device_count)
            .map(|id| DeviceInfo {
                id,
                name: format!("host-emulated device {id} ({threads} threads)"),
                vendor: "cubek".to_string(),
                max_work_group_size,
            })
            .collect();

        Ok(Self {
            name: "cubek host".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            devices,
        })
    }

    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    pub fn device(&self, id: usize) -> BenchResult<&DeviceInfo> {
        self.devices.get(id).ok_or_else(|| BenchError::DeviceSelection {
            message: format!("device {id} not present, platform has {}", self.devices.len()),
        })
    }

    /// Human-readable platform and device listing.
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}", self.name, self.version);
        for device in &self.devices {
            out.push_str(&format!(
                "\n  [{}] {} / {} (max work-group {})",
                device.id, device.name, device.vendor, device.max_work_group_size
            ));
        }
        out
    }
}
