//! Host-memory stand-in for a device allocator, with usage accounting.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use parking_lot::Mutex;

use super::DeviceAllocator;
use crate::error::{DnnError, DnnResult};

/// Same alignment `cudaMalloc` guarantees.
const DEVICE_ALIGNMENT: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMemoryStats {
    pub bytes_in_use: usize,
    pub peak_bytes: usize,
    pub live_allocations: usize,
    pub total_allocations: usize,
}

/// Aligned host allocator that tracks every byte it hands out.
///
/// An optional capacity makes it behave like a device with a fixed amount of
/// memory, which is how exhaustion is exercised without a GPU.
pub struct HostAllocator {
    stats: Mutex<HostMemoryStats>,
    capacity: Option<usize>,
    alignment: usize,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(HostMemoryStats::default()),
            capacity: None,
            alignment: DEVICE_ALIGNMENT,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn stats(&self) -> HostMemoryStats {
        self.stats.lock().clone()
    }

    fn layout(&self, bytes: usize) -> DnnResult<Layout> {
        Layout::from_size_align(bytes, self.alignment)
            .map_err(|e| DnnError::InvariantViolation(format!("Invalid layout: {}", e)))
    }
}

impl Default for HostAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceAllocator for HostAllocator {
    fn name(&self) -> &'static str {
        "host"
    }

    fn allocate(&self, bytes: usize) -> DnnResult<NonNull<u8>> {
        if bytes == 0 {
            return Err(DnnError::InvariantViolation("Cannot allocate zero bytes".to_string()));
        }
        let layout = self.layout(bytes)?;
        let mut stats = self.stats.lock();

        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(stats.bytes_in_use);
            if bytes > available {
                return Err(DnnError::memory_error(bytes, available, "host allocator"));
            }
        }

        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| DnnError::memory_error(bytes, 0, "host allocator"))?;

        stats.bytes_in_use += bytes;
        stats.peak_bytes = stats.peak_bytes.max(stats.bytes_in_use);
        stats.live_allocations += 1;
        stats.total_allocations += 1;
        tracing::trace!(bytes, in_use = stats.bytes_in_use, "host allocation");

        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        let layout = Layout::from_size_align_unchecked(bytes, self.alignment);
        dealloc(ptr.as_ptr(), layout);

        let mut stats = self.stats.lock();
        stats.bytes_in_use -= bytes;
        stats.live_allocations -= 1;
    }

    unsafe fn copy_to_device(&self, dst: NonNull<u8>, src: &[u8]) -> DnnResult<()> {
        std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
        Ok(())
    }

    unsafe fn copy_to_host(&self, dst: &mut [u8], src: NonNull<u8>) -> DnnResult<()> {
        std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_mut_ptr(), dst.len());
        Ok(())
    }

    fn bytes_in_use(&self) -> usize {
        self.stats.lock().bytes_in_use
    }
}
