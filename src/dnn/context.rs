//! Library context: the explicit process-wide state every wrapper is built from.
//!
//! Lifecycle: create one context per device at startup (`DnnContext::new`,
//! `with_config`, or `cudnn` with the `cudnn` feature), optionally bind a
//! stream, then hand `&Arc<DnnContext>` to descriptor and workspace
//! constructors. Each wrapper keeps a clone of the `Arc`, so the native
//! handle is destroyed only after the last wrapper is gone.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::ffi::{AlgorithmPreference, RawHandle, RawStream};
use super::library::DnnLibrary;
use crate::config::{self, DnnConfig};
use crate::error::{check, DnnResult};
use crate::memory::DeviceAllocator;

struct NativeState {
    handle: RawHandle,
    stream: RawStream,
}

pub struct DnnContext {
    library: Arc<dyn DnnLibrary>,
    allocator: Arc<dyn DeviceAllocator>,
    state: Mutex<NativeState>,
    config: DnnConfig,
}

// The native handle is only touched while `state` is locked.
unsafe impl Send for DnnContext {}
unsafe impl Sync for DnnContext {}

impl DnnContext {
    /// Create a context using a snapshot of the global configuration.
    pub fn new(library: Arc<dyn DnnLibrary>, allocator: Arc<dyn DeviceAllocator>) -> DnnResult<Arc<Self>> {
        Self::with_config(library, allocator, config::get_config())
    }

    pub fn with_config(
        library: Arc<dyn DnnLibrary>,
        allocator: Arc<dyn DeviceAllocator>,
        config: DnnConfig,
    ) -> DnnResult<Arc<Self>> {
        let handle = check(library.create_handle(), "cudnnCreate")?;
        tracing::info!(
            "{} context created on device {} with {} allocator",
            library.name(),
            config.device.device_id,
            allocator.name()
        );

        Ok(Arc::new(Self {
            library,
            allocator,
            state: Mutex::new(NativeState {
                handle,
                stream: std::ptr::null_mut(),
            }),
            config,
        }))
    }

    /// Context backed by the system cuDNN and CUDA runtime.
    #[cfg(feature = "cudnn")]
    pub fn cudnn(device_id: usize) -> DnnResult<Arc<Self>> {
        let mut config = config::get_config();
        config.device.device_id = device_id;

        let allocator = Arc::new(crate::memory::CudaAllocator::load(device_id)?);
        let library = Arc::new(super::cudnn::CudnnLibrary::load()?);
        Self::with_config(library, allocator, config)
    }

    pub fn library(&self) -> &dyn DnnLibrary {
        &*self.library
    }

    pub fn allocator(&self) -> &Arc<dyn DeviceAllocator> {
        &self.allocator
    }

    pub fn config(&self) -> &DnnConfig {
        &self.config
    }

    pub fn device_id(&self) -> usize {
        self.config.device.device_id
    }

    pub fn algorithm_preference(&self) -> AlgorithmPreference {
        self.config.algorithm.preference
    }

    /// Bind the execution stream later library calls are issued on.
    pub fn set_stream(&self, stream: RawStream) -> DnnResult<()> {
        let mut state = self.state.lock();
        check(self.library.set_stream(state.handle, stream), "cudnnSetStream")?;
        state.stream = stream;
        Ok(())
    }

    pub fn stream(&self) -> RawStream {
        self.state.lock().stream
    }

    /// Run `f` with exclusive use of the native handle.
    pub fn with_handle<T>(&self, f: impl FnOnce(&dyn DnnLibrary, RawHandle) -> T) -> T {
        let state = self.state.lock();
        f(&*self.library, state.handle)
    }
}

impl fmt::Debug for DnnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DnnContext")
            .field("library", &self.library.name())
            .field("allocator", &self.allocator.name())
            .field("device_id", &self.config.device.device_id)
            .finish()
    }
}

impl Drop for DnnContext {
    fn drop(&mut self) {
        let handle = self.state.get_mut().handle;
        if let Err(status) = self.library.destroy_handle(handle) {
            tracing::warn!("cudnnDestroy failed: {}", status);
        } else {
            tracing::debug!("{} context destroyed", self.library.name());
        }
    }
}
