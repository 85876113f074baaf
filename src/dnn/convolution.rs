//! Convolution descriptors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::DnnContext;
use super::ffi::{ConvolutionMode, RawConvolutionDescriptor, DIM_MAX};
use super::filter::AsFilterDescriptor;
use super::handle::{ConvolutionKind, OwnedDescriptor};
use super::tensor::{extents_to_i32, AsTensorDescriptor, MIN_DESCRIPTOR_RANK};
use crate::error::{check, DnnError, DnnResult};
use crate::tensor::{Dimension, Precision};

/// Per-spatial-dimension convolution parameters, outermost spatial dimension first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvolutionConfig {
    pub padding: Vec<usize>,
    pub stride: Vec<usize>,
    pub dilation: Vec<usize>,
    pub mode: ConvolutionMode,
    pub compute_precision: Precision,
}

impl ConvolutionConfig {
    /// 2-D cross-correlation (what deep learning calls convolution) in single precision.
    pub fn new_2d(padding: [usize; 2], stride: [usize; 2]) -> Self {
        Self {
            padding: padding.to_vec(),
            stride: stride.to_vec(),
            dilation: vec![1, 1],
            mode: ConvolutionMode::CrossCorrelation,
            compute_precision: Precision::Single,
        }
    }

    pub fn with_dilation(mut self, dilation: Vec<usize>) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_mode(mut self, mode: ConvolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_compute_precision(mut self, precision: Precision) -> Self {
        self.compute_precision = precision;
        self
    }

    pub fn spatial_rank(&self) -> usize {
        self.padding.len()
    }

    fn validate(&self) -> DnnResult<()> {
        // tensors are described with at least MIN_DESCRIPTOR_RANK extents
        let rank = self.spatial_rank();
        if rank + 2 < MIN_DESCRIPTOR_RANK || rank + 2 > DIM_MAX {
            return Err(DnnError::Configuration(format!(
                "convolution needs between {} and {} spatial dimensions, got {}",
                MIN_DESCRIPTOR_RANK - 2,
                DIM_MAX - 2,
                rank
            )));
        }
        if self.stride.len() != rank || self.dilation.len() != rank {
            return Err(DnnError::Configuration(format!(
                "padding, stride and dilation lengths differ: {} / {} / {}",
                rank,
                self.stride.len(),
                self.dilation.len()
            )));
        }
        if self.stride.iter().chain(&self.dilation).any(|&v| v == 0) {
            return Err(DnnError::Configuration("stride and dilation must be positive".to_string()));
        }
        if !self.compute_precision.is_float() {
            return Err(DnnError::UnsupportedPrecision(self.compute_precision));
        }
        Ok(())
    }
}

/// Owns a convolution descriptor. Not `Clone`; move it to relocate it.
pub struct ConvolutionDescriptor {
    handle: OwnedDescriptor<ConvolutionKind>,
    config: ConvolutionConfig,
}

impl ConvolutionDescriptor {
    pub fn new(context: &Arc<DnnContext>, config: ConvolutionConfig) -> DnnResult<Self> {
        config.validate()?;
        let padding = extents_to_i32(&config.padding, "padding")?;
        let stride = extents_to_i32(&config.stride, "stride")?;
        let dilation = extents_to_i32(&config.dilation, "dilation")?;

        let handle = OwnedDescriptor::<ConvolutionKind>::create(context)?;
        check(
            handle.library().set_convolution_descriptor(
                handle.raw(),
                &padding,
                &stride,
                &dilation,
                config.mode,
                config.compute_precision.data_type(),
            ),
            "cudnnSetConvolutionNdDescriptor",
        )?;

        Ok(Self { handle, config })
    }

    pub fn descriptor(&self) -> RawConvolutionDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// The handle must not be replaced or destroyed through this reference.
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawConvolutionDescriptor {
        self.handle.raw_mut()
    }

    pub fn config(&self) -> &ConvolutionConfig {
        &self.config
    }

    /// Extents of the forward output for this input and filter, as the library computes them.
    pub fn output_dimension(
        &self,
        input: &impl AsTensorDescriptor,
        filter: &impl AsFilterDescriptor,
    ) -> DnnResult<Dimension> {
        let input_dimension = input.described_dimension().ok_or_else(|| {
            DnnError::Configuration("cannot compute a convolution output for an empty tensor view".to_string())
        })?;
        let rank = input_dimension.rank().max(MIN_DESCRIPTOR_RANK);

        let mut output = vec![0i32; rank];
        check(
            self.handle.library().convolution_forward_output_dim(
                self.handle.raw(),
                input.raw_tensor(),
                filter.raw_filter(),
                &mut output,
            ),
            "cudnnGetConvolutionNdForwardOutputDim",
        )?;

        output
            .into_iter()
            .map(|d| {
                usize::try_from(d)
                    .map_err(|_| DnnError::Configuration(format!("library reported negative extent {}", d)))
            })
            .collect::<DnnResult<Vec<_>>>()
            .map(Dimension::new)
    }
}
