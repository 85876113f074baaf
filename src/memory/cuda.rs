//! CUDA runtime allocator, loaded from `libcudart` at runtime.

use std::ffi::{c_int, c_void};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use libloading::Library;

use super::DeviceAllocator;
use crate::error::{DnnError, DnnResult};

type CudaErrorT = c_int;
const CUDA_SUCCESS: CudaErrorT = 0;
const CUDA_ERROR_MEMORY_ALLOCATION: CudaErrorT = 2;

const CUDA_MEMCPY_HOST_TO_DEVICE: c_int = 1;
const CUDA_MEMCPY_DEVICE_TO_HOST: c_int = 2;

type FnCudaSetDevice = unsafe extern "C" fn(c_int) -> CudaErrorT;
type FnCudaMalloc = unsafe extern "C" fn(*mut *mut c_void, usize) -> CudaErrorT;
type FnCudaFree = unsafe extern "C" fn(*mut c_void) -> CudaErrorT;
type FnCudaMemset = unsafe extern "C" fn(*mut c_void, c_int, usize) -> CudaErrorT;
type FnCudaMemcpy = unsafe extern "C" fn(*mut c_void, *const c_void, usize, c_int) -> CudaErrorT;

const LIBRARY_NAMES: &[&str] = &["libcudart.so", "libcudart.so.12", "libcudart.so.11.0"];

/// Device allocator backed by `cudaMalloc`/`cudaFree`.
pub struct CudaAllocator {
    _lib: Library,
    device_id: usize,
    in_use: AtomicUsize,
    set_device: FnCudaSetDevice,
    malloc: FnCudaMalloc,
    free: FnCudaFree,
    memset: FnCudaMemset,
    memcpy: FnCudaMemcpy,
}

// Function pointers into the process-global runtime; the runtime is internally synchronized.
unsafe impl Send for CudaAllocator {}
unsafe impl Sync for CudaAllocator {}

impl CudaAllocator {
    pub fn load(device_id: usize) -> DnnResult<Self> {
        let lib = LIBRARY_NAMES
            .iter()
            .find_map(|name| unsafe { Library::new(name) }.ok())
            .ok_or_else(|| DnnError::LibraryUnavailable("libcudart not found".to_string()))?;

        let missing = |e: libloading::Error| DnnError::LibraryUnavailable(e.to_string());
        let allocator = unsafe {
            CudaAllocator {
                set_device: *lib.get::<FnCudaSetDevice>(b"cudaSetDevice\0").map_err(missing)?,
                malloc: *lib.get::<FnCudaMalloc>(b"cudaMalloc\0").map_err(missing)?,
                free: *lib.get::<FnCudaFree>(b"cudaFree\0").map_err(missing)?,
                memset: *lib.get::<FnCudaMemset>(b"cudaMemset\0").map_err(missing)?,
                memcpy: *lib.get::<FnCudaMemcpy>(b"cudaMemcpy\0").map_err(missing)?,
                device_id,
                in_use: AtomicUsize::new(0),
                _lib: lib,
            }
        };

        allocator.check(unsafe { (allocator.set_device)(device_id as c_int) }, "cudaSetDevice")?;
        tracing::info!("CUDA runtime loaded for device {}", device_id);
        Ok(allocator)
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    fn check(&self, code: CudaErrorT, context: &str) -> DnnResult<()> {
        match code {
            CUDA_SUCCESS => Ok(()),
            CUDA_ERROR_MEMORY_ALLOCATION => Err(DnnError::ResourceExhausted(format!(
                "{} on device {}",
                context, self.device_id
            ))),
            code => Err(DnnError::Configuration(format!(
                "CUDA error {} in {}",
                code, context
            ))),
        }
    }
}

impl DeviceAllocator for CudaAllocator {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn allocate(&self, bytes: usize) -> DnnResult<NonNull<u8>> {
        self.check(unsafe { (self.set_device)(self.device_id as c_int) }, "cudaSetDevice")?;

        let mut ptr: *mut c_void = std::ptr::null_mut();
        self.check(
            unsafe { (self.malloc)(&mut ptr, bytes) },
            &format!("cudaMalloc({} bytes)", bytes),
        )?;
        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| DnnError::memory_error(bytes, 0, "cudaMalloc returned null"))?;

        if let Err(e) = self.check(unsafe { (self.memset)(ptr.as_ptr() as *mut c_void, 0, bytes) }, "cudaMemset") {
            unsafe { (self.free)(ptr.as_ptr() as *mut c_void) };
            return Err(e);
        }

        self.in_use.fetch_add(bytes, Ordering::SeqCst);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
        let code = (self.free)(ptr.as_ptr() as *mut c_void);
        if code != CUDA_SUCCESS {
            tracing::warn!("cudaFree failed with code {} for {} bytes", code, bytes);
        }
        self.in_use.fetch_sub(bytes, Ordering::SeqCst);
    }

    unsafe fn copy_to_device(&self, dst: NonNull<u8>, src: &[u8]) -> DnnResult<()> {
        self.check(
            (self.memcpy)(
                dst.as_ptr() as *mut c_void,
                src.as_ptr() as *const c_void,
                src.len(),
                CUDA_MEMCPY_HOST_TO_DEVICE,
            ),
            "cudaMemcpy H2D",
        )
    }

    unsafe fn copy_to_host(&self, dst: &mut [u8], src: NonNull<u8>) -> DnnResult<()> {
        self.check(
            (self.memcpy)(
                dst.as_mut_ptr() as *mut c_void,
                src.as_ptr() as *const c_void,
                dst.len(),
                CUDA_MEMCPY_DEVICE_TO_HOST,
            ),
            "cudaMemcpy D2H",
        )
    }

    fn bytes_in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }
}
