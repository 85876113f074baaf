//! 2-D pooling descriptors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::DnnContext;
use super::ffi::{NanPropagation, PoolingMode, RawPoolingDescriptor};
use super::handle::{OwnedDescriptor, PoolingKind};
use super::library::Pooling2dSettings;
use super::tensor::extents_to_i32;
use crate::error::{check, DnnError, DnnResult};

/// Window geometry and reduction mode. Pairs are `[height, width]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolingConfig {
    pub mode: PoolingMode,
    pub nan_propagation: NanPropagation,
    pub window: [usize; 2],
    pub padding: [usize; 2],
    pub stride: [usize; 2],
}

impl PoolingConfig {
    /// Max pooling with the given window and stride and no padding.
    pub fn max(window: [usize; 2], stride: [usize; 2]) -> Self {
        Self {
            mode: PoolingMode::Max,
            nan_propagation: NanPropagation::NotPropagate,
            window,
            padding: [0, 0],
            stride,
        }
    }

    pub fn with_mode(mut self, mode: PoolingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_padding(mut self, padding: [usize; 2]) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_nan_propagation(mut self, nan_propagation: NanPropagation) -> Self {
        self.nan_propagation = nan_propagation;
        self
    }

    fn settings(&self) -> DnnResult<Pooling2dSettings> {
        if self.window.contains(&0) || self.stride.contains(&0) {
            return Err(DnnError::Configuration(format!(
                "pooling window {:?} and stride {:?} must be non-zero",
                self.window, self.stride
            )));
        }

        let window = extents_to_i32(&self.window, "pooling window")?;
        let padding = extents_to_i32(&self.padding, "pooling padding")?;
        let stride = extents_to_i32(&self.stride, "pooling stride")?;

        Ok(Pooling2dSettings {
            mode: self.mode,
            nan_propagation: self.nan_propagation,
            window: [window[0], window[1]],
            padding: [padding[0], padding[1]],
            stride: [stride[0], stride[1]],
        })
    }
}

/// Owns a 2-D pooling descriptor.
///
/// Not `Clone`: the handle has exactly one owner.
///
/// ```compile_fail
/// use anvil_dnn::dnn::Pooling2dDescriptor;
///
/// fn duplicate(pooling: &Pooling2dDescriptor) -> Pooling2dDescriptor {
///     pooling.clone()
/// }
/// ```
pub struct Pooling2dDescriptor {
    handle: OwnedDescriptor<PoolingKind>,
    config: PoolingConfig,
}

impl Pooling2dDescriptor {
    pub fn new(context: &Arc<DnnContext>, config: PoolingConfig) -> DnnResult<Self> {
        let settings = config.settings()?;

        let handle = OwnedDescriptor::<PoolingKind>::create(context)?;
        check(
            handle.library().set_pooling_2d_descriptor(handle.raw(), &settings),
            "cudnnSetPooling2dDescriptor",
        )?;

        Ok(Self { handle, config })
    }

    /// Max pooling from positional width/height arguments.
    pub fn from_window(
        context: &Arc<DnnContext>,
        window_w: usize,
        window_h: usize,
        pad_w: usize,
        pad_h: usize,
        stride_w: usize,
        stride_h: usize,
    ) -> DnnResult<Self> {
        let config = PoolingConfig::max([window_h, window_w], [stride_h, stride_w]).with_padding([pad_h, pad_w]);
        Self::new(context, config)
    }

    pub fn descriptor(&self) -> RawPoolingDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// The handle must not be replaced or destroyed through this reference.
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawPoolingDescriptor {
        self.handle.raw_mut()
    }

    pub fn config(&self) -> &PoolingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnn::ffi::Status;
    use crate::dnn::mock::{MockCall, MockLibrary, ResourceKind};
    use crate::memory::HostAllocator;

    fn setup() -> (Arc<MockLibrary>, Arc<DnnContext>) {
        let library = Arc::new(MockLibrary::new());
        let context = DnnContext::new(library.clone(), Arc::new(HostAllocator::new())).unwrap();
        (library, context)
    }

    #[test]
    fn test_from_window_orders_height_first() {
        let (library, context) = setup();
        let pooling = Pooling2dDescriptor::from_window(&context, 3, 2, 1, 0, 2, 1).unwrap();

        let settings = library.pooling(pooling.descriptor()).unwrap();
        assert_eq!(settings.mode, PoolingMode::Max);
        assert_eq!(settings.window, [2, 3]);
        assert_eq!(settings.padding, [0, 1]);
        assert_eq!(settings.stride, [1, 2]);
    }

    #[test]
    fn test_pooling_modes() {
        let (library, context) = setup();
        let config = PoolingConfig::max([2, 2], [2, 2])
            .with_mode(PoolingMode::AverageCountExcludePadding)
            .with_nan_propagation(NanPropagation::Propagate);

        let pooling = Pooling2dDescriptor::new(&context, config.clone()).unwrap();
        let settings = library.pooling(pooling.descriptor()).unwrap();
        assert_eq!(settings.mode, PoolingMode::AverageCountExcludePadding);
        assert_eq!(settings.nan_propagation, NanPropagation::Propagate);
        assert_eq!(pooling.config(), &config);
    }

    #[test]
    fn test_zero_window_rejected() {
        let (library, context) = setup();
        let err = Pooling2dDescriptor::from_window(&context, 0, 2, 0, 0, 1, 1).err().unwrap();
        assert!(matches!(err, DnnError::Configuration(_)));
        assert_eq!(library.created(ResourceKind::Pooling), 0);
    }

    #[test]
    fn test_set_failure_destroys_handle() {
        let (library, context) = setup();
        library.fail_next(MockCall::SetPooling, Status::NotSupported);

        let err = Pooling2dDescriptor::new(&context, PoolingConfig::max([2, 2], [2, 2])).err().unwrap();
        assert_eq!(err, DnnError::library("cudnnSetPooling2dDescriptor", Status::NotSupported));
        assert_eq!(library.live(ResourceKind::Pooling), 0);
    }

    #[test]
    fn test_move_destroys_once() {
        let (library, context) = setup();
        let pooling = Pooling2dDescriptor::new(&context, PoolingConfig::max([2, 2], [2, 2])).unwrap();
        let raw = pooling.descriptor();

        let moved = std::thread::spawn(move || {
            let boxed = Box::new(pooling);
            boxed.descriptor() as usize
        })
        .join()
        .unwrap();

        assert_eq!(moved, raw as usize);
        assert_eq!(library.live(ResourceKind::Pooling), 0);
        assert_eq!(library.destroyed(ResourceKind::Pooling), 1);
        assert_eq!(library.invalid_destroys(), 0);
    }
}
