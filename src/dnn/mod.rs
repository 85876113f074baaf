//! RAII wrappers over the native deep-learning library

pub mod context;
pub mod convolution;
pub mod dropout;
pub mod ffi;
pub mod filter;
pub(crate) mod handle;
pub mod library;
pub mod mock;
pub mod pooling;
pub mod rnn;
pub mod scalar;
pub mod tensor;
pub mod workspace;
#[cfg(feature = "cudnn")]
pub mod cudnn;

pub use context::DnnContext;
pub use convolution::{ConvolutionConfig, ConvolutionDescriptor};
pub use dropout::DropoutDescriptor;
pub use ffi::{
    AlgorithmPreference, ConvolutionMode, DataType, NanPropagation, PoolingMode, RnnAlgorithm, RnnDirection,
    RnnInputMode, RnnMode, Status, TensorFormat,
};
pub use filter::{AsFilterDescriptor, FilterConstViewDescriptor, FilterDescriptor, FilterViewDescriptor};
pub use library::DnnLibrary;
pub use mock::MockLibrary;
pub use pooling::{Pooling2dDescriptor, PoolingConfig};
pub use rnn::{RnnConfig, RnnDescriptor};
pub use scalar::Scalar;
pub use tensor::{AsTensorDescriptor, TensorConstViewDescriptor, TensorDescriptor, TensorLayout, TensorViewDescriptor};
pub use workspace::{
    AlgorithmChoice, BackwardDataWorkspace, BackwardFilterWorkspace, ConvolutionPass, ForwardWorkspace, Workspace,
};
#[cfg(feature = "cudnn")]
pub use cudnn::CudnnLibrary;
