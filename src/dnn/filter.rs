//! Filter descriptors (convolution weights, `[K, C, R, S]` in NCHW order).

use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::Arc;

use super::context::DnnContext;
use super::ffi::{RawFilterDescriptor, TensorFormat};
use super::handle::{FilterKind, OwnedDescriptor};
use super::library::DnnLibrary;
use super::tensor::{extents_to_i32, validate_dimension, TensorLayout, MIN_DESCRIPTOR_RANK};
use crate::error::{check, DnnResult};
use crate::tensor::{Dimension, Matrix, Precision};

/// Anything that can lend a filter descriptor to a library call.
pub trait AsFilterDescriptor {
    fn raw_filter(&self) -> RawFilterDescriptor;
    fn described_dimension(&self) -> &Dimension;
}

pub(crate) fn describe_filter(
    library: &dyn DnnLibrary,
    raw: RawFilterDescriptor,
    dimension: &Dimension,
    precision: Precision,
) -> DnnResult<()> {
    validate_dimension(dimension, "filter")?;

    let padded = dimension.padded_to(MIN_DESCRIPTOR_RANK);
    let dims = extents_to_i32(padded.as_slice(), "filter extents")?;

    check(
        library.set_filter_descriptor(raw, precision.data_type(), TensorFormat::Nchw, &dims),
        "cudnnSetFilterNdDescriptor",
    )
}

/// Filter descriptor that owns a handle to the weights it describes.
pub struct FilterDescriptor {
    handle: OwnedDescriptor<FilterKind>,
    filter: Matrix,
}

impl FilterDescriptor {
    pub fn new(context: &Arc<DnnContext>, filter: &Matrix) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<FilterKind>::create(context)?;
        describe_filter(handle.library(), handle.raw(), filter.dimension(), filter.precision())?;

        Ok(Self {
            handle,
            filter: filter.clone(),
        })
    }

    pub fn descriptor(&self) -> RawFilterDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// The handle must not be replaced or destroyed through this reference.
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawFilterDescriptor {
        self.handle.raw_mut()
    }

    pub fn data(&self) -> *mut c_void {
        self.filter.data()
    }

    pub fn dimension(&self) -> &Dimension {
        self.filter.dimension()
    }

    pub fn precision(&self) -> Precision {
        self.filter.precision()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.filter
    }
}

impl AsFilterDescriptor for FilterDescriptor {
    fn raw_filter(&self) -> RawFilterDescriptor {
        self.descriptor()
    }

    fn described_dimension(&self) -> &Dimension {
        self.dimension()
    }
}

/// Filter descriptor over weights owned elsewhere, writable (e.g. a gradient).
pub struct FilterViewDescriptor<'a> {
    handle: OwnedDescriptor<FilterKind>,
    data: *mut c_void,
    layout: TensorLayout,
    _data: PhantomData<&'a mut c_void>,
}

unsafe impl Send for FilterViewDescriptor<'_> {}

impl<'a> FilterViewDescriptor<'a> {
    /// View `filter` for writing.
    ///
    /// Like [`TensorViewDescriptor::new`](super::tensor::TensorViewDescriptor::new),
    /// clones of `filter` (a [`FilterDescriptor`] keeps one) alias the same buffer.
    pub fn new(context: &Arc<DnnContext>, filter: &'a mut Matrix) -> DnnResult<Self> {
        unsafe { Self::from_raw(context, filter.data(), filter.dimension(), filter.precision()) }
    }

    /// # Safety
    /// `data` must stay valid for writes of the described size for `'a`.
    pub unsafe fn from_raw(
        context: &Arc<DnnContext>,
        data: *mut c_void,
        dimension: &Dimension,
        precision: Precision,
    ) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<FilterKind>::create(context)?;
        describe_filter(handle.library(), handle.raw(), dimension, precision)?;

        Ok(Self {
            handle,
            data,
            layout: TensorLayout {
                dimension: dimension.clone(),
                precision,
            },
            _data: PhantomData,
        })
    }

    pub fn descriptor(&self) -> RawFilterDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// See [`FilterDescriptor::descriptor_mut`].
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawFilterDescriptor {
        self.handle.raw_mut()
    }

    pub fn data(&self) -> *mut c_void {
        self.data
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }
}

impl AsFilterDescriptor for FilterViewDescriptor<'_> {
    fn raw_filter(&self) -> RawFilterDescriptor {
        self.descriptor()
    }

    fn described_dimension(&self) -> &Dimension {
        &self.layout.dimension
    }
}

/// Read-only filter view.
pub struct FilterConstViewDescriptor<'a> {
    handle: OwnedDescriptor<FilterKind>,
    data: *const c_void,
    layout: TensorLayout,
    _data: PhantomData<&'a c_void>,
}

unsafe impl Send for FilterConstViewDescriptor<'_> {}

impl<'a> FilterConstViewDescriptor<'a> {
    pub fn new(context: &Arc<DnnContext>, filter: &'a Matrix) -> DnnResult<Self> {
        unsafe { Self::from_raw(context, filter.data(), filter.dimension(), filter.precision()) }
    }

    /// # Safety
    /// `data` must stay valid for reads of the described size for `'a`.
    pub unsafe fn from_raw(
        context: &Arc<DnnContext>,
        data: *const c_void,
        dimension: &Dimension,
        precision: Precision,
    ) -> DnnResult<Self> {
        let handle = OwnedDescriptor::<FilterKind>::create(context)?;
        describe_filter(handle.library(), handle.raw(), dimension, precision)?;

        Ok(Self {
            handle,
            data,
            layout: TensorLayout {
                dimension: dimension.clone(),
                precision,
            },
            _data: PhantomData,
        })
    }

    pub fn descriptor(&self) -> RawFilterDescriptor {
        self.handle.raw()
    }

    /// # Safety
    /// See [`FilterDescriptor::descriptor_mut`].
    pub unsafe fn descriptor_mut(&mut self) -> &mut RawFilterDescriptor {
        self.handle.raw_mut()
    }

    pub fn data(&self) -> *const c_void {
        self.data
    }

    pub fn layout(&self) -> &TensorLayout {
        &self.layout
    }
}

impl AsFilterDescriptor for FilterConstViewDescriptor<'_> {
    fn raw_filter(&self) -> RawFilterDescriptor {
        self.descriptor()
    }

    fn described_dimension(&self) -> &Dimension {
        &self.layout.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnn::ffi::{DataType, Status};
    use crate::dnn::mock::{MockCall, MockLibrary, ResourceKind};
    use crate::error::DnnError;
    use crate::memory::HostAllocator;

    fn setup() -> (Arc<MockLibrary>, Arc<DnnContext>) {
        let library = Arc::new(MockLibrary::new());
        let context = DnnContext::new(library.clone(), Arc::new(HostAllocator::new())).unwrap();
        (library, context)
    }

    #[test]
    fn test_filter_descriptor() {
        let (library, context) = setup();
        let weights = Matrix::zeros(context.allocator(), Dimension::from([16, 3, 3, 3]), Precision::Half).unwrap();

        let filter = FilterDescriptor::new(&context, &weights).unwrap();
        assert_eq!(filter.data(), weights.data());
        assert_eq!(filter.precision(), Precision::Half);

        let described = library.filter(filter.descriptor()).unwrap();
        assert_eq!(described.data_type, DataType::Half);
        assert_eq!(described.format, TensorFormat::Nchw);
        assert_eq!(described.dims, vec![16, 3, 3, 3]);

        drop(filter);
        assert_eq!(library.live(ResourceKind::Filter), 0);
    }

    #[test]
    fn test_filter_lifecycle_does_not_leak() {
        let (library, context) = setup();

        for _ in 0..16 {
            let dims = [fastrand::usize(1..9), fastrand::usize(1..5), fastrand::usize(1..6), fastrand::usize(1..6)];
            let weights = Matrix::zeros(context.allocator(), Dimension::from(dims), Precision::Single).unwrap();
            let filter = FilterDescriptor::new(&context, &weights).unwrap();
            assert_eq!(library.live(ResourceKind::Filter), 1);
            drop(filter);
        }

        assert_eq!(library.live(ResourceKind::Filter), 0);
        assert_eq!(library.created(ResourceKind::Filter), 16);
        assert_eq!(library.invalid_destroys(), 0);
    }

    #[test]
    fn test_filter_set_failure_destroys_handle() {
        let (library, context) = setup();
        let weights = Matrix::zeros(context.allocator(), Dimension::from([4, 4, 3, 3]), Precision::Single).unwrap();
        library.fail_next(MockCall::SetFilter, Status::NotSupported);

        let err = FilterDescriptor::new(&context, &weights).err().unwrap();
        assert_eq!(err, DnnError::library("cudnnSetFilterNdDescriptor", Status::NotSupported));
        assert_eq!(library.live(ResourceKind::Filter), 0);
        assert!(!weights.is_shared());
    }

    #[test]
    fn test_filter_views() {
        let (library, context) = setup();
        let mut gradient = Matrix::zeros(context.allocator(), Dimension::from([8, 2, 5, 5]), Precision::Double).unwrap();
        let expected = gradient.data();

        {
            let view = FilterViewDescriptor::new(&context, &mut gradient).unwrap();
            assert_eq!(view.data(), expected);
            assert_eq!(view.layout().precision, Precision::Double);
            assert_eq!(library.filter(view.descriptor()).unwrap().data_type, DataType::Double);
        }

        let view = FilterConstViewDescriptor::new(&context, &gradient).unwrap();
        assert_eq!(view.data(), expected as *const c_void);
        assert_eq!(view.described_dimension(), gradient.dimension());
        drop(view);

        assert_eq!(library.live(ResourceKind::Filter), 0);
    }

    #[test]
    fn test_view_of_shared_filter_aliases_owner() {
        let (_library, context) = setup();
        let mut weights = Matrix::zeros(context.allocator(), Dimension::from([1, 1, 2, 2]), Precision::Double).unwrap();
        let owner = FilterDescriptor::new(&context, &weights).unwrap();
        assert!(weights.is_shared());

        let view = FilterViewDescriptor::new(&context, &mut weights).unwrap();
        assert_eq!(view.data(), owner.data());
        unsafe { *(view.data() as *mut f64).add(3) = -1.5 };
        drop(view);

        assert_eq!(owner.matrix().to_host::<f64>().unwrap(), vec![0.0, 0.0, 0.0, -1.5]);
    }
}
