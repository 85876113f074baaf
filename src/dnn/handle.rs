//! Owned native descriptor handles.
//!
//! `OwnedDescriptor` pairs one create call with exactly one destroy call.
//! Wrappers create the handle first and configure it afterwards; if the
//! configuration step fails, the guard is dropped on the `?` path and the
//! handle is destroyed before the error reaches the caller.

use std::sync::Arc;

use super::context::DnnContext;
use super::ffi::{
    RawConvolutionDescriptor, RawDropoutDescriptor, RawFilterDescriptor, RawPoolingDescriptor, RawRnnDescriptor,
    RawTensorDescriptor,
};
use super::library::{DnnLibrary, LibraryResult};
use crate::error::{check, DnnResult};

pub(crate) trait DescriptorKind {
    type Raw: Copy + std::fmt::Debug;
    const CREATE: &'static str;
    const DESTROY: &'static str;

    fn create(library: &dyn DnnLibrary) -> LibraryResult<Self::Raw>;
    fn destroy(library: &dyn DnnLibrary, raw: Self::Raw) -> LibraryResult<()>;
}

macro_rules! descriptor_kind {
    ($kind:ident, $raw:ty, $create:ident, $destroy:ident, $create_name:literal, $destroy_name:literal) => {
        pub(crate) struct $kind;

        impl DescriptorKind for $kind {
            type Raw = $raw;
            const CREATE: &'static str = $create_name;
            const DESTROY: &'static str = $destroy_name;

            fn create(library: &dyn DnnLibrary) -> LibraryResult<$raw> {
                library.$create()
            }

            fn destroy(library: &dyn DnnLibrary, raw: $raw) -> LibraryResult<()> {
                library.$destroy(raw)
            }
        }
    };
}

descriptor_kind!(
    TensorKind,
    RawTensorDescriptor,
    create_tensor_descriptor,
    destroy_tensor_descriptor,
    "cudnnCreateTensorDescriptor",
    "cudnnDestroyTensorDescriptor"
);
descriptor_kind!(
    FilterKind,
    RawFilterDescriptor,
    create_filter_descriptor,
    destroy_filter_descriptor,
    "cudnnCreateFilterDescriptor",
    "cudnnDestroyFilterDescriptor"
);
descriptor_kind!(
    ConvolutionKind,
    RawConvolutionDescriptor,
    create_convolution_descriptor,
    destroy_convolution_descriptor,
    "cudnnCreateConvolutionDescriptor",
    "cudnnDestroyConvolutionDescriptor"
);
descriptor_kind!(
    PoolingKind,
    RawPoolingDescriptor,
    create_pooling_descriptor,
    destroy_pooling_descriptor,
    "cudnnCreatePoolingDescriptor",
    "cudnnDestroyPoolingDescriptor"
);
descriptor_kind!(
    DropoutKind,
    RawDropoutDescriptor,
    create_dropout_descriptor,
    destroy_dropout_descriptor,
    "cudnnCreateDropoutDescriptor",
    "cudnnDestroyDropoutDescriptor"
);
descriptor_kind!(
    RnnKind,
    RawRnnDescriptor,
    create_rnn_descriptor,
    destroy_rnn_descriptor,
    "cudnnCreateRNNDescriptor",
    "cudnnDestroyRNNDescriptor"
);

pub(crate) struct OwnedDescriptor<K: DescriptorKind> {
    raw: K::Raw,
    context: Arc<DnnContext>,
}

// Moving a descriptor to another thread and destroying it there is fine;
// sharing one between threads is not, so there is no Sync.
unsafe impl<K: DescriptorKind> Send for OwnedDescriptor<K> {}

impl<K: DescriptorKind> OwnedDescriptor<K> {
    pub(crate) fn create(context: &Arc<DnnContext>) -> DnnResult<Self> {
        let raw = check(K::create(context.library()), K::CREATE)?;
        tracing::debug!("{} -> {:?}", K::CREATE, raw);
        Ok(Self {
            raw,
            context: Arc::clone(context),
        })
    }

    pub(crate) fn raw(&self) -> K::Raw {
        self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut K::Raw {
        &mut self.raw
    }

    pub(crate) fn context(&self) -> &Arc<DnnContext> {
        &self.context
    }

    pub(crate) fn library(&self) -> &dyn DnnLibrary {
        self.context.library()
    }
}

impl<K: DescriptorKind> Drop for OwnedDescriptor<K> {
    fn drop(&mut self) {
        match K::destroy(self.context.library(), self.raw) {
            Ok(()) => tracing::debug!("{} <- {:?}", K::DESTROY, self.raw),
            Err(status) => tracing::warn!("{} failed for {:?}: {}", K::DESTROY, self.raw, status),
        }
    }
}
