//! Dropout descriptors and their RNG state buffer.

use std::sync::Arc;

use super::context::DnnContext;
use super::ffi::RawDropoutDescriptor;
use super::handle::{DropoutKind, OwnedDescriptor};
use crate::error::{check, DnnError, DnnResult};
use crate::memory::Allocation;

/// Owns a dropout descriptor and the device buffer holding its RNG state.
///
/// Field order matters: the descriptor is destroyed before its state buffer
/// is released, including when `new` fails after allocating the state.
pub struct DropoutDescriptor {
    handle: OwnedDescriptor<DropoutKind>,
    states: Allocation,
    dropout: f32,
    seed: u64,
}

impl DropoutDescriptor {
    pub fn new(context: &Arc<DnnContext>, dropout: f32, seed: u64) -> DnnResult<Self> {
        if !(0.0..1.0).contains(&dropout) {
            return Err(DnnError::Configuration(format!(
                "dropout probability {} must be in [0, 1)",
                dropout
            )));
        }

        let handle = OwnedDescriptor::<DropoutKind>::create(context)?;
        let state_bytes = context.with_handle(|library, native| {
            check(library.dropout_states_size(native), "cudnnDropoutGetStatesSize")
        })?;
        let descriptor = Self {
            handle,
            states: Allocation::new(context.allocator(), state_bytes)?,
            dropout,
            seed,
        };

        context.with_handle(|library, native| {
            check(
                library.set_dropout_descriptor(
                    descriptor.handle.raw(),
                    native,
                    dropout,
                    descriptor.states.as_ptr(),
                    descriptor.states.size(),
                    seed,
                ),
                "cudnnSetDropoutDescriptor",
            )
        })?;
        tracing::debug!("dropout {} with {} state bytes, seed {}", dropout, state_bytes, seed);

        Ok(descriptor)
    }

    pub fn descriptor(&self) -> RawDropoutDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// The handle must not be replaced or destroyed through this reference.
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawDropoutDescriptor {
        self.handle.raw_mut()
    }

    pub fn dropout(&self) -> f32 {
        self.dropout
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state_bytes(&self) -> usize {
        self.states.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnn::ffi::Status;
    use crate::dnn::mock::{MockCall, MockLibrary, ResourceKind, DROPOUT_STATE_BYTES};
    use crate::memory::{DeviceAllocator, HostAllocator};
    use parking_lot::Mutex;
    use std::ptr::NonNull;

    /// Host allocator that records how many dropout handles were live at each release.
    struct RecordingAllocator {
        inner: HostAllocator,
        library: Arc<MockLibrary>,
        live_at_release: Mutex<Vec<usize>>,
    }

    impl DeviceAllocator for RecordingAllocator {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn allocate(&self, bytes: usize) -> DnnResult<NonNull<u8>> {
            self.inner.allocate(bytes)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, bytes: usize) {
            self.live_at_release.lock().push(self.library.live(ResourceKind::Dropout));
            self.inner.deallocate(ptr, bytes)
        }

        unsafe fn copy_to_device(&self, dst: NonNull<u8>, src: &[u8]) -> DnnResult<()> {
            self.inner.copy_to_device(dst, src)
        }

        unsafe fn copy_to_host(&self, dst: &mut [u8], src: NonNull<u8>) -> DnnResult<()> {
            self.inner.copy_to_host(dst, src)
        }

        fn bytes_in_use(&self) -> usize {
            self.inner.bytes_in_use()
        }
    }

    fn setup() -> (Arc<MockLibrary>, Arc<HostAllocator>, Arc<DnnContext>) {
        let library = Arc::new(MockLibrary::new());
        let allocator = Arc::new(HostAllocator::new());
        let context = DnnContext::new(library.clone(), allocator.clone()).unwrap();
        (library, allocator, context)
    }

    #[test]
    fn test_dropout_owns_state() {
        let (library, allocator, context) = setup();
        let dropout = DropoutDescriptor::new(&context, 0.25, 42).unwrap();

        assert_eq!(dropout.state_bytes(), DROPOUT_STATE_BYTES);
        assert_eq!(allocator.bytes_in_use(), DROPOUT_STATE_BYTES);

        let described = library.dropout(dropout.descriptor()).unwrap();
        assert_eq!(described.dropout, 0.25);
        assert_eq!(described.seed, 42);
        assert_eq!(described.state_bytes, DROPOUT_STATE_BYTES);
        assert_ne!(described.states, 0);

        drop(dropout);
        assert_eq!(library.live(ResourceKind::Dropout), 0);
        assert_eq!(allocator.bytes_in_use(), 0);
    }

    #[test]
    fn test_invalid_probability() {
        let (library, _allocator, context) = setup();
        assert!(DropoutDescriptor::new(&context, 1.0, 0).is_err());
        assert!(DropoutDescriptor::new(&context, -0.1, 0).is_err());
        assert_eq!(library.created(ResourceKind::Dropout), 0);
    }

    #[test]
    fn test_set_failure_releases_everything() {
        let (library, allocator, context) = setup();
        library.fail_next(MockCall::SetDropout, Status::ExecutionFailed);

        let err = DropoutDescriptor::new(&context, 0.5, 7).err().unwrap();
        assert_eq!(err, DnnError::library("cudnnSetDropoutDescriptor", Status::ExecutionFailed));
        assert_eq!(library.live(ResourceKind::Dropout), 0);
        assert_eq!(allocator.bytes_in_use(), 0);
    }

    #[test]
    fn test_handle_destroyed_before_state_buffer() {
        let library = Arc::new(MockLibrary::new());
        let allocator = Arc::new(RecordingAllocator {
            inner: HostAllocator::new(),
            library: library.clone(),
            live_at_release: Mutex::new(Vec::new()),
        });
        let context = DnnContext::new(library.clone(), allocator.clone()).unwrap();

        drop(DropoutDescriptor::new(&context, 0.1, 1).unwrap());
        library.fail_next(MockCall::SetDropout, Status::BadParam);
        assert!(DropoutDescriptor::new(&context, 0.1, 2).is_err());

        assert_eq!(*allocator.live_at_release.lock(), vec![0, 0]);
        assert_eq!(allocator.bytes_in_use(), 0);
    }
}
