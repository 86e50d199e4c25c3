//! Host arrays and device buffers.
//!
//! Both are views over shared, lock-protected storage. A buffer created with
//! [`Residency::HostPointer`] aliases the host array it was made from, so no
//! transfer is needed before a kernel reads it. A [`Residency::DevicePrivate`]
//! buffer owns its storage and must be filled through the command queue.

use core::ops::{Deref, DerefMut, Range};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BenchError, BenchResult};

/// How kernels may use a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl MemoryAccess {
    pub fn readable(self) -> bool {
        !matches!(self, MemoryAccess::WriteOnly)
    }

    pub fn writable(self) -> bool {
        !matches!(self, MemoryAccess::ReadOnly)
    }
}

/// Where the buffer's backing store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    /// Use the caller's host array directly.
    HostPointer,
    /// Separate device allocation, filled by explicit writes.
    DevicePrivate,
}

impl Residency {
    pub fn label(self) -> &'static str {
        match self {
            Residency::HostPointer => "host",
            Residency::DevicePrivate => "device",
        }
    }
}

type Storage<T> = Arc<RwLock<Vec<T>>>;

fn poisoned() -> BenchError {
    BenchError::backend("storage lock poisoned")
}

/// Host-side array that buffers may alias and reads may land in.
#[derive(Debug, Clone)]
pub struct HostArray<T> {
    storage: Storage<T>,
}

impl<T: Copy + Send + Sync + 'static> HostArray<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            storage: Arc::new(RwLock::new(values)),
        }
    }

    pub fn filled(len: usize, value: T) -> Self {
        Self::new(vec![value; len])
    }

    pub fn len(&self) -> BenchResult<usize> {
        Ok(self.storage.read().map_err(|_| poisoned())?.len())
    }

    pub fn to_vec(&self) -> BenchResult<Vec<T>> {
        Ok(self.storage.read().map_err(|_| poisoned())?.clone())
    }

    pub fn fill(&self, value: T) -> BenchResult<()> {
        self.storage.write().map_err(|_| poisoned())?.fill(value);
        Ok(())
    }

    pub fn set(&self, index: usize, value: T) -> BenchResult<()> {
        let mut values = self.write()?;
        let len = values.len();
        let slot = values.get_mut(index).ok_or_else(|| {
            BenchError::out_of_bounds(format!("index {index} of a {len}-element host array"))
        })?;
        *slot = value;
        Ok(())
    }

    pub(crate) fn read(&self) -> BenchResult<RwLockReadGuard<'_, Vec<T>>> {
        self.storage.read().map_err(|_| poisoned())
    }

    pub(crate) fn write(&self) -> BenchResult<RwLockWriteGuard<'_, Vec<T>>> {
        self.storage.write().map_err(|_| poisoned())
    }

    pub(crate) fn storage(&self) -> &Storage<T> {
        &self.storage
    }
}

/// Device buffer: a window `[offset, offset + len)` over some storage.
#[derive(Debug, Clone)]
pub struct Buffer<T> {
    storage: Storage<T>,
    offset: usize,
    len: usize,
    access: MemoryAccess,
    residency: Residency,
}

impl<T: Copy + Default + Send + Sync + 'static> Buffer<T> {
    /// Fresh device allocation, zero (default) initialised.
    pub fn device_private(len: usize, access: MemoryAccess) -> Self {
        Self {
            storage: Arc::new(RwLock::new(vec![T::default(); len])),
            offset: 0,
            len,
            access,
            residency: Residency::DevicePrivate,
        }
    }

    /// Buffer backed by the caller's host array.
    pub fn use_host(host: &HostArray<T>, access: MemoryAccess) -> BenchResult<Self> {
        let len = host.len()?;
        Ok(Self {
            storage: Arc::clone(host.storage()),
            offset: 0,
            len,
            access,
            residency: Residency::HostPointer,
        })
    }

    /// Window into this buffer's storage; shares data with the parent.
    pub fn sub_buffer(&self, offset: usize, len: usize, access: MemoryAccess) -> BenchResult<Self> {
        if offset + len > self.len {
            return Err(BenchError::out_of_bounds(format!(
                "sub-buffer {}..{} of a {}-element buffer",
                offset,
                offset + len,
                self.len
            )));
        }
        Ok(Self {
            storage: Arc::clone(&self.storage),
            offset: self.offset + offset,
            len,
            access,
            residency: self.residency,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn access(&self) -> MemoryAccess {
        self.access
    }

    pub fn residency(&self) -> Residency {
        self.residency
    }

    pub fn shares_storage_with(&self, other: &Buffer<T>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Identity of the backing storage, for alias checks across element types.
    pub(crate) fn storage_id(&self) -> usize {
        Arc::as_ptr(&self.storage) as *const () as usize
    }

    pub(crate) fn is_backed_by(&self, host: &HostArray<T>) -> bool {
        Arc::ptr_eq(&self.storage, host.storage())
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    fn window(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub(crate) fn read(&self) -> BenchResult<BufferRead<'_, T>> {
        Ok(BufferRead {
            guard: self.storage.read().map_err(|_| poisoned())?,
            range: self.window(),
        })
    }

    pub(crate) fn write(&self) -> BenchResult<BufferWrite<'_, T>> {
        Ok(BufferWrite {
            guard: self.storage.write().map_err(|_| poisoned())?,
            range: self.window(),
        })
    }
}

/// Read guard over a buffer's window.
pub(crate) struct BufferRead<'a, T> {
    guard: RwLockReadGuard<'a, Vec<T>>,
    range: Range<usize>,
}

impl<T> Deref for BufferRead<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard[self.range.clone()]
    }
}

/// Write guard over a buffer's window.
pub(crate) struct BufferWrite<'a, T> {
    guard: RwLockWriteGuard<'a, Vec<T>>,
    range: Range<usize>,
}

impl<T> Deref for BufferWrite<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.guard[self.range.clone()]
    }
}

impl<T> DerefMut for BufferWrite<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.guard[self.range.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_pointer_buffer_aliases_host_memory() {
        let host = HostArray::new(vec![1.0f32, 2.0, 3.0]);
        let buffer = Buffer::use_host(&host, MemoryAccess::ReadWrite).unwrap();
        buffer.write().unwrap()[1] = 9.0;
        assert_eq!(host.to_vec().unwrap(), vec![1.0, 9.0, 3.0]);
        assert!(buffer.is_backed_by(&host));
    }

    #[test]
    fn sub_buffer_windows_parent() {
        let parent = Buffer::<f64>::device_private(8, MemoryAccess::ReadWrite);
        let child = parent.sub_buffer(2, 3, MemoryAccess::WriteOnly).unwrap();
        child.write().unwrap().fill(4.0);
        let all = parent.read().unwrap().to_vec();
        assert_eq!(all, vec![0.0, 0.0, 4.0, 4.0, 4.0, 0.0, 0.0, 0.0]);
        assert!(child.shares_storage_with(&parent));
        assert!(parent.sub_buffer(6, 3, MemoryAccess::ReadOnly).is_err());
    }

    #[test]
    fn access_flags() {
        assert!(MemoryAccess::ReadOnly.readable());
        assert!(!MemoryAccess::ReadOnly.writable());
        assert!(!MemoryAccess::WriteOnly.readable());
        assert!(MemoryAccess::ReadWrite.writable());
    }
}
