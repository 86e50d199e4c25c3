use hashbrown::HashMap;

use crate::backend::{
    Buffer, CommandQueue, DeviceInfo, Kernel, MemoryAccess, Platform, Program,
};
use crate::error::{BenchError, BenchResult};
use crate::kernels::KernelName;
use crate::numeric::Real;

/// Per-device state: command stream, kernel handles and named buffers.
///
/// Buffers are looked up by name so the reduction engine can find its
/// scratch (`reduce.ping` / `reduce.pong`) and dispatch code can find the
/// problem operands without threading them through every call.
#[derive(Debug)]
pub struct DeviceContext<T> {
    device: DeviceInfo,
    queue: CommandQueue,
    kernels: HashMap<KernelName, Kernel>,
    buffers: HashMap<String, Buffer<T>>,
    index_buffers: HashMap<String, Buffer<u32>>,
}

impl<T: Real> DeviceContext<T> {
    pub fn new(device: &DeviceInfo) -> BenchResult<Self> {
        Ok(Self {
            device: device.clone(),
            queue: CommandQueue::new(device)?,
            kernels: HashMap::new(),
            buffers: HashMap::new(),
            index_buffers: HashMap::new(),
        })
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Creates a handle for every kernel of `program`.
    pub fn load_program(&mut self, program: &Program) -> BenchResult<()> {
        for &name in program.kernel_names() {
            let kernel = program.create_kernel(name.as_str())?;
            self.kernels.insert(name, kernel);
        }
        Ok(())
    }

    pub fn kernel(&self, name: KernelName) -> BenchResult<&Kernel> {
        self.kernels.get(&name).ok_or_else(|| BenchError::KernelNotFound {
            name: name.as_str().to_string(),
        })
    }

    /// Registers (or replaces) a named buffer.
    pub fn register(&mut self, name: &str, buffer: Buffer<T>) {
        self.buffers.insert(name.to_string(), buffer);
    }

    pub fn register_indices(&mut self, name: &str, buffer: Buffer<u32>) {
        self.index_buffers.insert(name.to_string(), buffer);
    }

    pub fn buffer(&self, name: &str) -> BenchResult<&Buffer<T>> {
        self.buffers.get(name).ok_or_else(|| self.missing(name))
    }

    pub fn indices(&self, name: &str) -> BenchResult<&Buffer<u32>> {
        self.index_buffers.get(name).ok_or_else(|| self.missing(name))
    }

    /// Read-write device buffer of at least `len` elements under `name`.
    ///
    /// An existing registration is reused when it is large enough.
    pub fn scratch(&mut self, name: &str, len: usize) -> Buffer<T> {
        match self.buffers.get(name) {
            Some(buffer) if buffer.len() >= len && buffer.access() == MemoryAccess::ReadWrite => {
                buffer.clone()
            }
            _ => {
                log::debug!("device {}: allocating {name} ({len} elements)", self.device.id);
                let buffer = Buffer::device_private(len, MemoryAccess::ReadWrite);
                self.buffers.insert(name.to_string(), buffer.clone());
                buffer
            }
        }
    }

    /// Drops every named buffer; kernels stay loaded.
    pub fn clear_buffers(&mut self) {
        self.buffers.clear();
        self.index_buffers.clear();
    }

    fn missing(&self, name: &str) -> BenchError {
        BenchError::BufferNotFound {
            name: name.to_string(),
            device: self.device.id,
        }
    }
}

/// Contexts for the selected devices, indexed by compute unit.
#[derive(Debug)]
pub struct DeviceRegistry<T> {
    contexts: Vec<DeviceContext<T>>,
}

impl<T: Real> DeviceRegistry<T> {
    /// Opens one context per selected device id, in selection order.
    pub fn open(platform: &Platform, selection: &[usize]) -> BenchResult<Self> {
        if selection.is_empty() {
            return Err(BenchError::DeviceSelection {
                message: "no devices selected".to_string(),
            });
        }
        let contexts = selection
            .iter()
            .map(|&id| DeviceContext::new(platform.device(id)?))
            .collect::<BenchResult<Vec<_>>>()?;
        Ok(Self { contexts })
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn get(&self, unit: usize) -> BenchResult<&DeviceContext<T>> {
        let count = self.contexts.len();
        self.contexts.get(unit).ok_or_else(|| BenchError::DeviceSelection {
            message: format!("unit {unit} out of {count}"),
        })
    }

    pub fn get_mut(&mut self, unit: usize) -> BenchResult<&mut DeviceContext<T>> {
        let count = self.contexts.len();
        self.contexts.get_mut(unit).ok_or_else(|| BenchError::DeviceSelection {
            message: format!("unit {unit} out of {count}"),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceContext<T>> {
        self.contexts.iter()
    }

    pub fn load_program(&mut self, program: &Program) -> BenchResult<()> {
        self.contexts
            .iter_mut()
            .try_for_each(|context| context.load_program(program))
    }

    /// Barrier on every stream. All streams are drained even if one failed;
    /// the first failure is returned.
    pub fn finish_all(&self) -> BenchResult<()> {
        let mut first = Ok(());
        for context in &self.contexts {
            if let Err(err) = context.queue().finish() {
                if first.is_ok() {
                    first = Err(err);
                }
            }
        }
        first
    }

    pub fn clear_buffers(&mut self) {
        self.contexts.iter_mut().for_each(DeviceContext::clear_buffers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ProgramSource, build_program};

    #[test]
    fn scratch_is_reused_when_large_enough() {
        let platform = Platform::host(1, 64).unwrap();
        let mut context = DeviceContext::<f64>::new(&platform.devices()[0]).unwrap();

        let first = context.scratch("reduce.ping", 16);
        let smaller = context.scratch("reduce.ping", 8);
        assert!(first.shares_storage_with(&smaller));

        let larger = context.scratch("reduce.ping", 32);
        assert!(!first.shares_storage_with(&larger));
        assert_eq!(context.buffer("reduce.ping").unwrap().len(), 32);
    }

    #[test]
    fn missing_names_are_reported() {
        let platform = Platform::host(2, 64).unwrap();
        let registry = DeviceRegistry::<f32>::open(&platform, &[1]).unwrap();
        let context = registry.get(0).unwrap();
        assert_eq!(context.device().id, 1);
        assert!(matches!(
            context.buffer("left"),
            Err(BenchError::BufferNotFound { device: 1, .. })
        ));
        assert!(matches!(
            context.kernel(KernelName::ReductionSum0),
            Err(BenchError::KernelNotFound { .. })
        ));
    }

    #[test]
    fn programs_load_on_every_unit() {
        let platform = Platform::host(2, 64).unwrap();
        let program = build_program(&platform, ProgramSource::VECTOR_DOT, "-D REAL=float").unwrap();
        let mut registry = DeviceRegistry::<f32>::open(&platform, &[0, 1]).unwrap();
        registry.load_program(&program).unwrap();
        for context in registry.iter() {
            assert!(context.kernel(KernelName::ReductionSum4).is_ok());
        }
        assert!(DeviceRegistry::<f32>::open(&platform, &[2]).is_err());
        registry.finish_all().unwrap();
    }
}
