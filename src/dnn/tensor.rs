//! Tensor descriptors: the owning wrapper and the two borrowed views.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;

use super::context::DnnContext;
use super::ffi::{RawTensorDescriptor, DIM_MAX};
use super::handle::{OwnedDescriptor, TensorKind};
use super::library::DnnLibrary;
use crate::error::{check, DnnError, DnnResult};
use crate::tensor::{Dimension, Matrix, Precision};

/// Tensors of lower rank are described with trailing unit extents up to this.
pub const MIN_DESCRIPTOR_RANK: usize = 4;

/// Shape and precision a view was described with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorLayout {
    pub dimension: Dimension,
    pub precision: Precision,
}

/// Anything that can lend a tensor descriptor to a library call.
pub trait AsTensorDescriptor {
    fn raw_tensor(&self) -> RawTensorDescriptor;

    /// Extents the descriptor was set with; `None` for an empty view.
    fn described_dimension(&self) -> Option<&Dimension>;
}

/// Convert extents to the library's `int` arguments.
pub(crate) fn extents_to_i32(values: &[usize], what: &str) -> DnnResult<Vec<i32>> {
    values
        .iter()
        .map(|&v| {
            i32::try_from(v).map_err(|_| {
                DnnError::shape_error(&format!("{} that fit in i32", what), &v.to_string(), None)
            })
        })
        .collect()
}

pub(crate) fn validate_dimension(dimension: &Dimension, what: &str) -> DnnResult<()> {
    if !dimension.is_valid() {
        return Err(DnnError::Configuration(format!(
            "{} extents {} must be non-empty and non-zero",
            what, dimension
        )));
    }
    if dimension.rank() > DIM_MAX {
        return Err(DnnError::shape_error(
            &format!("{} rank <= {}", what, DIM_MAX),
            &format!("rank {}", dimension.rank()),
            Some("Merge trailing dimensions before describing the tensor"),
        ));
    }
    if dimension.total_elements().is_none() {
        return Err(DnnError::shape_error(
            &format!("{} element count that fits in usize", what),
            &dimension.to_string(),
            None,
        ));
    }
    Ok(())
}

/// Set a packed `Nd` tensor descriptor for `dimension`.
pub(crate) fn describe_tensor(
    library: &dyn DnnLibrary,
    raw: RawTensorDescriptor,
    dimension: &Dimension,
    precision: Precision,
) -> DnnResult<()> {
    validate_dimension(dimension, "tensor")?;

    let padded = dimension.padded_to(MIN_DESCRIPTOR_RANK);
    let dims = extents_to_i32(padded.as_slice(), "tensor extents")?;
    let strides = padded.packed_strides().ok_or_else(|| {
        DnnError::shape_error("tensor strides that fit in usize", &dimension.to_string(), None)
    })?;
    let strides = extents_to_i32(&strides, "tensor strides")?;

    check(
        library.set_tensor_descriptor(raw, precision.data_type(), &dims, &strides),
        "cudnnSetTensorNdDescriptor",
    )
}

/// Tensor descriptor that owns a handle to the tensor it describes.
pub struct TensorDescriptor {
    handle: OwnedDescriptor<TensorKind>,
    tensor: Matrix,
}

impl TensorDescriptor {
    pub fn new(context: &Arc<DnnContext>, tensor: &Matrix) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<TensorKind>::create(context)?;
        describe_tensor(handle.library(), handle.raw(), tensor.dimension(), tensor.precision())?;

        Ok(Self {
            handle,
            tensor: tensor.clone(),
        })
    }

    /// Describe `dimension` and allocate a zeroed tensor of that shape.
    pub fn zeros(context: &Arc<DnnContext>, dimension: &Dimension, precision: Precision) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<TensorKind>::create(context)?;
        describe_tensor(handle.library(), handle.raw(), dimension, precision)?;
        let tensor = Matrix::zeros(context.allocator(), dimension.clone(), precision)?;

        Ok(Self { handle, tensor })
    }

    pub fn descriptor(&self) -> RawTensorDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// The handle may be passed to calls that take `cudnnTensorDescriptor_t*`,
    /// but must not be replaced or destroyed through this reference.
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawTensorDescriptor {
        self.handle.raw_mut()
    }

    pub fn data(&self) -> *mut c_void {
        self.tensor.data()
    }

    pub fn bytes(&self) -> usize {
        self.tensor.bytes()
    }

    pub fn dimension(&self) -> &Dimension {
        self.tensor.dimension()
    }

    pub fn precision(&self) -> Precision {
        self.tensor.precision()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.tensor
    }

    pub fn context(&self) -> &Arc<DnnContext> {
        self.handle.context()
    }
}

impl AsTensorDescriptor for TensorDescriptor {
    fn raw_tensor(&self) -> RawTensorDescriptor {
        self.descriptor()
    }

    fn described_dimension(&self) -> Option<&Dimension> {
        Some(self.dimension())
    }
}

/// Tensor descriptor over data that somebody else owns, writable through `data()`.
///
/// `empty` produces the "no tensor" state used where an operation has no
/// bias or hidden-state input: the handle is live but unset and `data()` is null.
pub struct TensorViewDescriptor<'a> {
    handle: OwnedDescriptor<TensorKind>,
    data: Option<NonNull<c_void>>,
    layout: Option<TensorLayout>,
    _data: PhantomData<&'a mut c_void>,
}

// The view only lends its pointer to library calls; see `OwnedDescriptor`.
unsafe impl Send for TensorViewDescriptor<'_> {}

impl<'a> TensorViewDescriptor<'a> {
    /// View `tensor` for writing.
    ///
    /// The borrow is exclusive for this `Matrix` value only. Clones of it,
    /// including the one a [`TensorDescriptor`] keeps, share the buffer and see
    /// writes made through the view; check [`Matrix::is_shared`] when that matters.
    pub fn new(context: &Arc<DnnContext>, tensor: &'a mut Matrix) -> DnnResult<Self> {
        unsafe { Self::from_raw(context, tensor.data(), tensor.dimension(), tensor.precision()) }
    }

    /// # Safety
    /// `data` must stay valid for writes of the described size for `'a`,
    /// or be null to describe a shape with no data behind it.
    pub unsafe fn from_raw(
        context: &Arc<DnnContext>,
        data: *mut c_void,
        dimension: &Dimension,
        precision: Precision,
    ) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<TensorKind>::create(context)?;
        describe_tensor(handle.library(), handle.raw(), dimension, precision)?;

        Ok(Self {
            handle,
            data: NonNull::new(data),
            layout: Some(TensorLayout {
                dimension: dimension.clone(),
                precision,
            }),
            _data: PhantomData,
        })
    }

    pub fn empty(context: &Arc<DnnContext>) -> DnnResult<Self> {
        Ok(Self {
            handle: OwnedDescriptor::<TensorKind>::create(context)?,
            data: None,
            layout: None,
            _data: PhantomData,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    pub fn descriptor(&self) -> RawTensorDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// See [`TensorDescriptor::descriptor_mut`].
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawTensorDescriptor {
        self.handle.raw_mut()
    }

    /// Null when the view is empty.
    pub fn data(&self) -> *mut c_void {
        self.data.map(NonNull::as_ptr).unwrap_or(std::ptr::null_mut())
    }

    pub fn layout(&self) -> Option<&TensorLayout> {
        self.layout.as_ref()
    }
}

impl AsTensorDescriptor for TensorViewDescriptor<'_> {
    fn raw_tensor(&self) -> RawTensorDescriptor {
        self.descriptor()
    }

    fn described_dimension(&self) -> Option<&Dimension> {
        self.layout.as_ref().map(|l| &l.dimension)
    }
}

/// Read-only counterpart of [`TensorViewDescriptor`].
pub struct TensorConstViewDescriptor<'a> {
    handle: OwnedDescriptor<TensorKind>,
    data: Option<NonNull<c_void>>,
    layout: Option<TensorLayout>,
    _data: PhantomData<&'a c_void>,
}

unsafe impl Send for TensorConstViewDescriptor<'_> {}

impl<'a> TensorConstViewDescriptor<'a> {
    pub fn new(context: &Arc<DnnContext>, tensor: &'a Matrix) -> DnnResult<Self> {
        unsafe { Self::from_raw(context, tensor.data(), tensor.dimension(), tensor.precision()) }
    }

    /// # Safety
    /// `data` must stay valid for reads of the described size for `'a`, or be null.
    pub unsafe fn from_raw(
        context: &Arc<DnnContext>,
        data: *const c_void,
        dimension: &Dimension,
        precision: Precision,
    ) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<TensorKind>::create(context)?;
        describe_tensor(handle.library(), handle.raw(), dimension, precision)?;

        Ok(Self {
            handle,
            data: NonNull::new(data as *mut c_void),
            layout: Some(TensorLayout {
                dimension: dimension.clone(),
                precision,
            }),
            _data: PhantomData,
        })
    }

    pub fn empty(context: &Arc<DnnContext>) -> DnnResult<Self> {
        Ok(Self {
            handle: OwnedDescriptor::<TensorKind>::create(context)?,
            data: None,
            layout: None,
            _data: PhantomData,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    pub fn descriptor(&self) -> RawTensorDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// See [`TensorDescriptor::descriptor_mut`].
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawTensorDescriptor {
        self.handle.raw_mut()
    }

    /// Null when the view is empty.
    pub fn data(&self) -> *const c_void {
        self.data
            .map(|p| p.as_ptr() as *const c_void)
            .unwrap_or(std::ptr::null())
    }

    pub fn layout(&self) -> Option<&TensorLayout> {
        self.layout.as_ref()
    }
}

impl AsTensorDescriptor for TensorConstViewDescriptor<'_> {
    fn raw_tensor(&self) -> RawTensorDescriptor {
        self.descriptor()
    }

    fn described_dimension(&self) -> Option<&Dimension> {
        self.layout.as_ref().map(|l| &l.dimension)
    }
}
