//! The native library seam.
//!
//! Every method mirrors one C entry point. Implementations return the raw
//! status on failure; the wrappers turn it into a `DnnError` tagged with the
//! call name.

use std::ffi::c_void;

use super::ffi::{
    AlgorithmPreference, ConvolutionMode, DataType, NanPropagation, PoolingMode, RawConvolutionDescriptor,
    RawDropoutDescriptor, RawFilterDescriptor, RawHandle, RawPoolingDescriptor, RawRnnDescriptor, RawStream,
    RawTensorDescriptor, RnnAlgorithm, RnnDirection, RnnInputMode, RnnMode, Status, TensorFormat,
};

pub type LibraryResult<T> = Result<T, Status>;

/// Parameters of `cudnnSetRNNDescriptor`.
#[derive(Debug, Clone, Copy)]
pub struct RnnSettings {
    pub hidden_size: i32,
    pub num_layers: i32,
    pub dropout: RawDropoutDescriptor,
    pub input_mode: RnnInputMode,
    pub direction: RnnDirection,
    pub mode: RnnMode,
    pub algorithm: RnnAlgorithm,
    pub data_type: DataType,
}

/// Parameters of `cudnnSetPooling2dDescriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pooling2dSettings {
    pub mode: PoolingMode,
    pub nan_propagation: NanPropagation,
    /// `[height, width]`
    pub window: [i32; 2],
    pub padding: [i32; 2],
    pub stride: [i32; 2],
}

/// Paired create/set/destroy and query entry points of a cuDNN-style library.
///
/// Descriptor arguments are borrowed for the duration of the call only.
pub trait DnnLibrary: Send + Sync {
    fn name(&self) -> &'static str;

    // Library handle and stream

    fn create_handle(&self) -> LibraryResult<RawHandle>;
    fn destroy_handle(&self, handle: RawHandle) -> LibraryResult<()>;
    fn set_stream(&self, handle: RawHandle, stream: RawStream) -> LibraryResult<()>;

    // Tensor descriptors

    fn create_tensor_descriptor(&self) -> LibraryResult<RawTensorDescriptor>;
    fn set_tensor_descriptor(
        &self,
        desc: RawTensorDescriptor,
        data_type: DataType,
        dims: &[i32],
        strides: &[i32],
    ) -> LibraryResult<()>;
    fn destroy_tensor_descriptor(&self, desc: RawTensorDescriptor) -> LibraryResult<()>;

    // Filter descriptors

    fn create_filter_descriptor(&self) -> LibraryResult<RawFilterDescriptor>;
    fn set_filter_descriptor(
        &self,
        desc: RawFilterDescriptor,
        data_type: DataType,
        format: TensorFormat,
        dims: &[i32],
    ) -> LibraryResult<()>;
    fn destroy_filter_descriptor(&self, desc: RawFilterDescriptor) -> LibraryResult<()>;

    // Convolution descriptors

    fn create_convolution_descriptor(&self) -> LibraryResult<RawConvolutionDescriptor>;
    fn set_convolution_descriptor(
        &self,
        desc: RawConvolutionDescriptor,
        padding: &[i32],
        stride: &[i32],
        dilation: &[i32],
        mode: ConvolutionMode,
        compute_type: DataType,
    ) -> LibraryResult<()>;
    fn destroy_convolution_descriptor(&self, desc: RawConvolutionDescriptor) -> LibraryResult<()>;

    /// Forward output extents; `output.len()` is the tensor rank.
    fn convolution_forward_output_dim(
        &self,
        conv: RawConvolutionDescriptor,
        input: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        output: &mut [i32],
    ) -> LibraryResult<()>;

    // Pooling descriptors

    fn create_pooling_descriptor(&self) -> LibraryResult<RawPoolingDescriptor>;
    fn set_pooling_2d_descriptor(&self, desc: RawPoolingDescriptor, settings: &Pooling2dSettings) -> LibraryResult<()>;
    fn destroy_pooling_descriptor(&self, desc: RawPoolingDescriptor) -> LibraryResult<()>;

    // Dropout descriptors

    fn create_dropout_descriptor(&self) -> LibraryResult<RawDropoutDescriptor>;
    fn dropout_states_size(&self, handle: RawHandle) -> LibraryResult<usize>;
    #[allow(clippy::too_many_arguments)]
    fn set_dropout_descriptor(
        &self,
        desc: RawDropoutDescriptor,
        handle: RawHandle,
        dropout: f32,
        states: *mut c_void,
        state_bytes: usize,
        seed: u64,
    ) -> LibraryResult<()>;
    fn destroy_dropout_descriptor(&self, desc: RawDropoutDescriptor) -> LibraryResult<()>;

    // RNN descriptors

    fn create_rnn_descriptor(&self) -> LibraryResult<RawRnnDescriptor>;
    fn set_rnn_descriptor(&self, handle: RawHandle, desc: RawRnnDescriptor, settings: &RnnSettings) -> LibraryResult<()>;
    fn destroy_rnn_descriptor(&self, desc: RawRnnDescriptor) -> LibraryResult<()>;

    // Convolution algorithm selection and workspace sizing

    fn forward_algorithm(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        conv: RawConvolutionDescriptor,
        result: RawTensorDescriptor,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32>;

    fn forward_workspace_size(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        conv: RawConvolutionDescriptor,
        result: RawTensorDescriptor,
        algorithm: i32,
    ) -> LibraryResult<usize>;

    fn backward_data_algorithm(
        &self,
        handle: RawHandle,
        filter: RawFilterDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        input_deltas: RawTensorDescriptor,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32>;

    fn backward_data_workspace_size(
        &self,
        handle: RawHandle,
        filter: RawFilterDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        input_deltas: RawTensorDescriptor,
        algorithm: i32,
    ) -> LibraryResult<usize>;

    fn backward_filter_algorithm(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        filter_gradient: RawFilterDescriptor,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32>;

    fn backward_filter_workspace_size(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        filter_gradient: RawFilterDescriptor,
        algorithm: i32,
    ) -> LibraryResult<usize>;
}
