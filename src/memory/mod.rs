//! Device memory: the allocator seam and the owning `Allocation` buffer.

pub mod host;
#[cfg(feature = "cudnn")]
pub mod cuda;

pub use host::{HostAllocator, HostMemoryStats};
#[cfg(feature = "cudnn")]
pub use cuda::CudaAllocator;

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::{DnnError, DnnResult};

/// Device allocation primitive.
///
/// Implementations hand out zero-initialised buffers and must accept every
/// pointer they returned back through `deallocate` with the same byte count.
pub trait DeviceAllocator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Allocate `bytes` (> 0) zeroed bytes.
    fn allocate(&self, bytes: usize) -> DnnResult<NonNull<u8>>;

    /// # Safety
    /// `ptr` must come from `allocate(bytes)` on this allocator and not be freed yet.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize);

    /// # Safety
    /// `dst` must point to at least `src.len()` bytes owned by this allocator.
    unsafe fn copy_to_device(&self, dst: NonNull<u8>, src: &[u8]) -> DnnResult<()>;

    /// # Safety
    /// `src` must point to at least `dst.len()` bytes owned by this allocator.
    unsafe fn copy_to_host(&self, dst: &mut [u8], src: NonNull<u8>) -> DnnResult<()>;

    /// Bytes currently handed out and not yet released.
    fn bytes_in_use(&self) -> usize;
}

/// An exclusively owned device buffer, released on drop.
///
/// Zero-sized allocations hold no pointer and never reach the allocator.
pub struct Allocation {
    ptr: Option<NonNull<u8>>,
    size: usize,
    allocator: Arc<dyn DeviceAllocator>,
}

// Device pointers are plain addresses; the allocator itself is Send + Sync.
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}

impl Allocation {
    pub fn new(allocator: &Arc<dyn DeviceAllocator>, size: usize) -> DnnResult<Self> {
        let ptr = if size == 0 {
            None
        } else {
            Some(allocator.allocate(size)?)
        };

        Ok(Self {
            ptr,
            size,
            allocator: Arc::clone(allocator),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Raw pointer for library calls; null for a zero-sized allocation.
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
            .map(|p| p.as_ptr() as *mut c_void)
            .unwrap_or(std::ptr::null_mut())
    }

    pub fn allocator(&self) -> &Arc<dyn DeviceAllocator> {
        &self.allocator
    }

    /// Copy host bytes into the start of the buffer.
    pub fn write(&mut self, bytes: &[u8]) -> DnnResult<()> {
        if bytes.len() > self.size {
            return Err(DnnError::InvariantViolation(format!(
                "cannot write {} bytes into an allocation of {} bytes",
                bytes.len(),
                self.size
            )));
        }
        match self.ptr {
            Some(ptr) => unsafe { self.allocator.copy_to_device(ptr, bytes) },
            None => Ok(()),
        }
    }

    /// Copy the whole buffer back to the host.
    pub fn read(&self) -> DnnResult<Vec<u8>> {
        let mut host = vec![0u8; self.size];
        if let Some(ptr) = self.ptr {
            unsafe { self.allocator.copy_to_host(&mut host, ptr)? };
        }
        Ok(host)
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("ptr", &self.as_ptr())
            .field("size", &self.size)
            .field("allocator", &self.allocator.name())
            .finish()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            unsafe { self.allocator.deallocate(ptr, self.size) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Arc<dyn DeviceAllocator> {
        Arc::new(HostAllocator::new())
    }

    #[test]
    fn test_zero_sized_allocation() {
        let allocator = host();
        let allocation = Allocation::new(&allocator, 0).unwrap();
        assert!(allocation.is_empty());
        assert!(allocation.as_ptr().is_null());
        assert_eq!(allocator.bytes_in_use(), 0);
        assert!(allocation.read().unwrap().is_empty());
    }

    #[test]
    fn test_allocation_round_trip() {
        let allocator = host();
        let before = allocator.bytes_in_use();
        {
            let mut allocation = Allocation::new(&allocator, 16).unwrap();
            assert_eq!(allocator.bytes_in_use(), before + 16);
            assert_eq!(allocation.read().unwrap(), vec![0u8; 16]);

            allocation.write(&[1, 2, 3, 4]).unwrap();
            assert_eq!(&allocation.read().unwrap()[..5], &[1, 2, 3, 4, 0]);
        }
        assert_eq!(allocator.bytes_in_use(), before);
    }

    #[test]
    fn test_oversized_write_rejected() {
        let allocator = host();
        let mut allocation = Allocation::new(&allocator, 4).unwrap();
        let err = allocation.write(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, DnnError::InvariantViolation(_)));
    }
}
