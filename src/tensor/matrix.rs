//! Dense tensor value consumed by the descriptor wrappers

use std::ffi::c_void;
use std::sync::Arc;

use crate::error::{DnnError, DnnResult};
use crate::memory::{Allocation, DeviceAllocator};

use super::dimension::Dimension;
use super::precision::{Element, Precision};

/// A dense tensor: extents, element precision and a device buffer.
///
/// Cloning shares the buffer, matching how the owning descriptors keep a
/// private handle to the tensor they describe.
#[derive(Debug, Clone)]
pub struct Matrix {
    allocation: Arc<Allocation>,
    dimension: Dimension,
    precision: Precision,
}

impl Matrix {
    /// Allocate a zero-filled tensor.
    pub fn zeros(
        allocator: &Arc<dyn DeviceAllocator>,
        dimension: Dimension,
        precision: Precision,
    ) -> DnnResult<Self> {
        let bytes = dimension
            .total_elements()
            .and_then(|elements| elements.checked_mul(precision.size()))
            .ok_or_else(|| {
                DnnError::shape_error(
                    &format!("a {:?} tensor addressable in usize bytes", precision),
                    &dimension.to_string(),
                    None,
                )
            })?;
        let allocation = Allocation::new(allocator, bytes)?;
        Ok(Self {
            allocation: Arc::new(allocation),
            dimension,
            precision,
        })
    }

    /// Upload host elements into a new tensor.
    pub fn from_host<T: Element>(
        allocator: &Arc<dyn DeviceAllocator>,
        dimension: Dimension,
        data: &[T],
    ) -> DnnResult<Self> {
        if dimension.total_elements() != Some(data.len()) {
            return Err(DnnError::shape_error(
                &format!("{} elements", dimension),
                &format!("{} elements", data.len()),
                None,
            ));
        }

        let mut allocation = Allocation::new(allocator, std::mem::size_of_val(data))?;
        allocation.write(bytemuck::cast_slice(data))?;

        Ok(Self {
            allocation: Arc::new(allocation),
            dimension,
            precision: T::PRECISION,
        })
    }

    /// Download the tensor into host elements of the matching precision.
    pub fn to_host<T: Element>(&self) -> DnnResult<Vec<T>> {
        if T::PRECISION != self.precision {
            return Err(DnnError::UnsupportedPrecision(T::PRECISION));
        }
        let bytes = self.allocation.read()?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }

    pub fn dimension(&self) -> &Dimension {
        &self.dimension
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn elements(&self) -> usize {
        self.allocation.size() / self.precision.size()
    }

    pub fn bytes(&self) -> usize {
        self.allocation.size()
    }

    /// Raw device pointer; null for a tensor with no elements.
    pub fn data(&self) -> *mut c_void {
        self.allocation.as_ptr()
    }

    /// Whether another `Matrix` shares this buffer.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.allocation) > 1
    }
}
