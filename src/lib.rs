//! Anvil DNN - lifetime-safe wrappers for cuDNN-style compute libraries
//!
//! Features:
//! - Owning and borrowed tensor and filter descriptors
//! - Convolution, pooling, dropout and RNN descriptors
//! - Host scalars in the width the library reads them
//! - Forward, backward-data and backward-filter workspaces sized for the chosen algorithm
//! - An in-process mock library for tests, and the system cuDNN behind the `cudnn` feature
//!
//! ```
//! use std::sync::Arc;
//! use anvil_dnn::dnn::{ConvolutionConfig, ConvolutionDescriptor, DnnContext, FilterDescriptor, ForwardWorkspace,
//!                      MockLibrary, TensorDescriptor};
//! use anvil_dnn::memory::HostAllocator;
//! use anvil_dnn::tensor::{Dimension, Matrix, Precision};
//!
//! # fn main() -> anvil_dnn::DnnResult<()> {
//! let context = DnnContext::new(Arc::new(MockLibrary::new()), Arc::new(HostAllocator::new()))?;
//!
//! let source = TensorDescriptor::zeros(&context, &Dimension::from([8, 3, 32, 32]), Precision::Single)?;
//! let weights = Matrix::zeros(context.allocator(), Dimension::from([16, 3, 3, 3]), Precision::Single)?;
//! let filter = FilterDescriptor::new(&context, &weights)?;
//! let convolution = ConvolutionDescriptor::new(&context, ConvolutionConfig::new_2d([0, 0], [1, 1]))?;
//!
//! let output = convolution.output_dimension(&source, &filter)?;
//! let result = TensorDescriptor::zeros(&context, &output, Precision::Single)?;
//! let workspace = ForwardWorkspace::new(&context, &source, &filter, &convolution, &result)?;
//! assert_eq!(output, Dimension::from([8, 16, 30, 30]));
//! assert!(workspace.algorithm() >= 0);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dnn;
pub mod error;
pub mod memory;
pub mod tensor;

pub use config::{ConfigBuilder, DnnConfig};
pub use dnn::{DnnContext, DnnLibrary};
pub use error::{DnnError, DnnResult};
pub use memory::{Allocation, DeviceAllocator};
pub use tensor::{Dimension, Matrix, Precision};

/// Install a `tracing-subscriber` fmt subscriber for the process.
///
/// The level comes from `development.verbose_logging` in the global
/// configuration. Safe to call more than once; later calls leave the existing
/// subscriber in place.
pub fn init() -> DnnResult<()> {
    let level = config::get_config().development.log_level();
    if tracing_subscriber::fmt().with_max_level(level).try_init().is_ok() {
        tracing::info!("anvil-dnn {} initialized", version());
    }
    Ok(())
}

/// Get the current crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
