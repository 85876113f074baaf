//! Convolution workspaces: algorithm choice plus the scratch buffer it needs.
//!
//! Construction walks `Uninitialized -> AlgorithmSelected -> SizeQueried ->
//! Allocated`. Each step consumes the previous state, so the size is always
//! queried for the algorithm that was actually selected and the buffer is
//! always exactly the queried size. Dropping the workspace releases the buffer.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::context::DnnContext;
use super::convolution::ConvolutionDescriptor;
use super::ffi::{AlgorithmPreference, RawConvolutionDescriptor, RawFilterDescriptor, RawHandle, RawTensorDescriptor};
use super::filter::AsFilterDescriptor;
use super::library::{DnnLibrary, LibraryResult};
use super::tensor::AsTensorDescriptor;
use crate::error::{check, DnnError, DnnResult, ErrorContext, WithContext};
use crate::memory::{Allocation, DeviceAllocator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvolutionPass {
    Forward,
    BackwardData,
    BackwardFilter,
}

impl ConvolutionPass {
    fn algorithm_call(&self) -> &'static str {
        match self {
            ConvolutionPass::Forward => "cudnnGetConvolutionForwardAlgorithm_v7",
            ConvolutionPass::BackwardData => "cudnnGetConvolutionBackwardDataAlgorithm_v7",
            ConvolutionPass::BackwardFilter => "cudnnGetConvolutionBackwardFilterAlgorithm_v7",
        }
    }

    fn size_call(&self) -> &'static str {
        match self {
            ConvolutionPass::Forward => "cudnnGetConvolutionForwardWorkspaceSize",
            ConvolutionPass::BackwardData => "cudnnGetConvolutionBackwardDataWorkspaceSize",
            ConvolutionPass::BackwardFilter => "cudnnGetConvolutionBackwardFilterWorkspaceSize",
        }
    }
}

impl fmt::Display for ConvolutionPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvolutionPass::Forward => "forward",
            ConvolutionPass::BackwardData => "backward data",
            ConvolutionPass::BackwardFilter => "backward filter",
        };
        f.write_str(name)
    }
}

/// Algorithm tag and the workspace it needs, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmChoice {
    pub algorithm: i32,
    pub workspace_bytes: usize,
}

/// Type-level tag for the convolution pass a workspace serves.
pub trait PassKind {
    const PASS: ConvolutionPass;
}

pub struct ForwardPass;
pub struct BackwardDataPass;
pub struct BackwardFilterPass;

impl PassKind for ForwardPass {
    const PASS: ConvolutionPass = ConvolutionPass::Forward;
}

impl PassKind for BackwardDataPass {
    const PASS: ConvolutionPass = ConvolutionPass::BackwardData;
}

impl PassKind for BackwardFilterPass {
    const PASS: ConvolutionPass = ConvolutionPass::BackwardFilter;
}

pub type ForwardWorkspace = Workspace<ForwardPass>;
pub type BackwardDataWorkspace = Workspace<BackwardDataPass>;
pub type BackwardFilterWorkspace = Workspace<BackwardFilterPass>;

/// Raw descriptors lent to the selection and size queries.
enum Operands {
    Forward {
        source: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        convolution: RawConvolutionDescriptor,
        result: RawTensorDescriptor,
    },
    BackwardData {
        filter: RawFilterDescriptor,
        output_deltas: RawTensorDescriptor,
        convolution: RawConvolutionDescriptor,
        input_deltas: RawTensorDescriptor,
    },
    BackwardFilter {
        source: RawTensorDescriptor,
        output_deltas: RawTensorDescriptor,
        convolution: RawConvolutionDescriptor,
        filter_gradient: RawFilterDescriptor,
    },
}

impl Operands {
    fn pass(&self) -> ConvolutionPass {
        match self {
            Operands::Forward { .. } => ConvolutionPass::Forward,
            Operands::BackwardData { .. } => ConvolutionPass::BackwardData,
            Operands::BackwardFilter { .. } => ConvolutionPass::BackwardFilter,
        }
    }

    fn algorithm(
        &self,
        library: &dyn DnnLibrary,
        handle: RawHandle,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32> {
        match *self {
            Operands::Forward {
                source,
                filter,
                convolution,
                result,
            } => library.forward_algorithm(handle, source, filter, convolution, result, preference),
            Operands::BackwardData {
                filter,
                output_deltas,
                convolution,
                input_deltas,
            } => library.backward_data_algorithm(handle, filter, output_deltas, convolution, input_deltas, preference),
            Operands::BackwardFilter {
                source,
                output_deltas,
                convolution,
                filter_gradient,
            } => library.backward_filter_algorithm(
                handle,
                source,
                output_deltas,
                convolution,
                filter_gradient,
                preference,
            ),
        }
    }

    fn workspace_size(&self, library: &dyn DnnLibrary, handle: RawHandle, algorithm: i32) -> LibraryResult<usize> {
        match *self {
            Operands::Forward {
                source,
                filter,
                convolution,
                result,
            } => library.forward_workspace_size(handle, source, filter, convolution, result, algorithm),
            Operands::BackwardData {
                filter,
                output_deltas,
                convolution,
                input_deltas,
            } => library.backward_data_workspace_size(handle, filter, output_deltas, convolution, input_deltas, algorithm),
            Operands::BackwardFilter {
                source,
                output_deltas,
                convolution,
                filter_gradient,
            } => library.backward_filter_workspace_size(
                handle,
                source,
                output_deltas,
                convolution,
                filter_gradient,
                algorithm,
            ),
        }
    }
}

// Construction states. Only `Uninitialized` can be made directly.

struct Uninitialized<'o> {
    operands: &'o Operands,
}

struct AlgorithmSelected<'o> {
    operands: &'o Operands,
    algorithm: i32,
}

struct SizeQueried {
    choice: AlgorithmChoice,
}

impl<'o> Uninitialized<'o> {
    fn select(
        self,
        library: &dyn DnnLibrary,
        handle: RawHandle,
        preference: AlgorithmPreference,
    ) -> DnnResult<AlgorithmSelected<'o>> {
        let pass = self.operands.pass();
        let algorithm = check(self.operands.algorithm(library, handle, preference), pass.algorithm_call())?;
        if algorithm < 0 {
            return Err(DnnError::Configuration(format!(
                "{} returned invalid algorithm {}",
                pass.algorithm_call(),
                algorithm
            )));
        }

        Ok(AlgorithmSelected {
            operands: self.operands,
            algorithm,
        })
    }
}

impl AlgorithmSelected<'_> {
    fn query_size(self, library: &dyn DnnLibrary, handle: RawHandle) -> DnnResult<SizeQueried> {
        let pass = self.operands.pass();
        let workspace_bytes = check(
            self.operands.workspace_size(library, handle, self.algorithm),
            pass.size_call(),
        )?;

        Ok(SizeQueried {
            choice: AlgorithmChoice {
                algorithm: self.algorithm,
                workspace_bytes,
            },
        })
    }
}

impl SizeQueried {
    fn within_limit(self, limit: Option<usize>) -> DnnResult<Self> {
        match limit {
            Some(limit) if self.choice.workspace_bytes > limit => Err(DnnError::memory_error(
                self.choice.workspace_bytes,
                limit,
                "convolution workspace (max_workspace_bytes)",
            )),
            _ => Ok(self),
        }
    }

    fn allocate<P: PassKind>(self, allocator: &Arc<dyn DeviceAllocator>) -> DnnResult<Workspace<P>> {
        let allocation = Allocation::new(allocator, self.choice.workspace_bytes)?;
        Ok(Workspace {
            choice: self.choice,
            allocation,
            _pass: PhantomData,
        })
    }
}

/// Scratch buffer for one convolution pass, sized for the algorithm it was built with.
pub struct Workspace<P: PassKind> {
    choice: AlgorithmChoice,
    allocation: Allocation,
    _pass: PhantomData<P>,
}

impl<P: PassKind> Workspace<P> {
    fn build(
        context: &Arc<DnnContext>,
        operands: Operands,
        preference: AlgorithmPreference,
        shapes: impl FnOnce() -> Vec<String>,
    ) -> DnnResult<Self> {
        let pass = P::PASS;
        let limit = context.config().memory.max_workspace_bytes;

        let result = context
            .with_handle(|library, handle| {
                Uninitialized { operands: &operands }
                    .select(library, handle, preference)?
                    .query_size(library, handle)
            })
            .and_then(|queried| queried.within_limit(limit))
            .and_then(|queried| queried.allocate::<P>(context.allocator()));

        let workspace = result.with_context(|| {
            let mut error_context = ErrorContext::new(&format!("{} convolution workspace", pass))
                .with_device(&format!("{} device {}", context.library().name(), context.device_id()))
                .with_suggestion("Try AlgorithmPreference::NoWorkspace or a tighter WorkspaceLimit");
            for shape in shapes() {
                error_context = error_context.with_shape(&shape);
            }
            error_context
        })?;

        tracing::info!(
            "{} convolution: algorithm {} with {} workspace bytes ({:?})",
            pass,
            workspace.choice.algorithm,
            workspace.choice.workspace_bytes,
            preference
        );
        Ok(workspace)
    }

    pub fn pass(&self) -> ConvolutionPass {
        P::PASS
    }

    pub fn algorithm(&self) -> i32 {
        self.choice.algorithm
    }

    /// Null when the algorithm needs no workspace.
    pub fn data(&self) -> *mut c_void {
        self.allocation.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.allocation.size()
    }

    pub fn choice(&self) -> AlgorithmChoice {
        self.choice
    }
}

impl<P: PassKind> fmt::Debug for Workspace<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("pass", &P::PASS)
            .field("choice", &self.choice)
            .field("allocation", &self.allocation)
            .finish()
    }
}

fn tensor_shape(what: &str, tensor: &impl AsTensorDescriptor) -> String {
    match tensor.described_dimension() {
        Some(dimension) => format!("{} {}", what, dimension),
        None => format!("{} (empty)", what),
    }
}

fn filter_shape(what: &str, filter: &impl AsFilterDescriptor) -> String {
    format!("{} {}", what, filter.described_dimension())
}

impl Workspace<ForwardPass> {
    /// Workspace for `result = conv(source, filter)` with the context's preference.
    pub fn new(
        context: &Arc<DnnContext>,
        source: &impl AsTensorDescriptor,
        filter: &impl AsFilterDescriptor,
        convolution: &ConvolutionDescriptor,
        result: &impl AsTensorDescriptor,
    ) -> DnnResult<Self> {
        Self::with_preference(context, source, filter, convolution, result, context.algorithm_preference())
    }

    pub fn with_preference(
        context: &Arc<DnnContext>,
        source: &impl AsTensorDescriptor,
        filter: &impl AsFilterDescriptor,
        convolution: &ConvolutionDescriptor,
        result: &impl AsTensorDescriptor,
        preference: AlgorithmPreference,
    ) -> DnnResult<Self> {
        let operands = Operands::Forward {
            source: source.raw_tensor(),
            filter: filter.raw_filter(),
            convolution: convolution.descriptor(),
            result: result.raw_tensor(),
        };
        Self::build(context, operands, preference, || {
            vec![
                tensor_shape("source", source),
                filter_shape("filter", filter),
                tensor_shape("result", result),
            ]
        })
    }
}

impl Workspace<BackwardDataPass> {
    /// Workspace for computing `input_deltas` from `output_deltas` through `filter`.
    pub fn new(
        context: &Arc<DnnContext>,
        filter: &impl AsFilterDescriptor,
        output_deltas: &impl AsTensorDescriptor,
        convolution: &ConvolutionDescriptor,
        input_deltas: &impl AsTensorDescriptor,
    ) -> DnnResult<Self> {
        Self::with_preference(
            context,
            filter,
            output_deltas,
            convolution,
            input_deltas,
            context.algorithm_preference(),
        )
    }

    pub fn with_preference(
        context: &Arc<DnnContext>,
        filter: &impl AsFilterDescriptor,
        output_deltas: &impl AsTensorDescriptor,
        convolution: &ConvolutionDescriptor,
        input_deltas: &impl AsTensorDescriptor,
        preference: AlgorithmPreference,
    ) -> DnnResult<Self> {
        let operands = Operands::BackwardData {
            filter: filter.raw_filter(),
            output_deltas: output_deltas.raw_tensor(),
            convolution: convolution.descriptor(),
            input_deltas: input_deltas.raw_tensor(),
        };
        Self::build(context, operands, preference, || {
            vec![
                filter_shape("filter", filter),
                tensor_shape("output deltas", output_deltas),
                tensor_shape("input deltas", input_deltas),
            ]
        })
    }
}

impl Workspace<BackwardFilterPass> {
    /// Workspace for computing `filter_gradient` from `source` and `output_deltas`.
    pub fn new(
        context: &Arc<DnnContext>,
        source: &impl AsTensorDescriptor,
        output_deltas: &impl AsTensorDescriptor,
        convolution: &ConvolutionDescriptor,
        filter_gradient: &impl AsFilterDescriptor,
    ) -> DnnResult<Self> {
        Self::with_preference(
            context,
            source,
            output_deltas,
            convolution,
            filter_gradient,
            context.algorithm_preference(),
        )
    }

    pub fn with_preference(
        context: &Arc<DnnContext>,
        source: &impl AsTensorDescriptor,
        output_deltas: &impl AsTensorDescriptor,
        convolution: &ConvolutionDescriptor,
        filter_gradient: &impl AsFilterDescriptor,
        preference: AlgorithmPreference,
    ) -> DnnResult<Self> {
        let operands = Operands::BackwardFilter {
            source: source.raw_tensor(),
            output_deltas: output_deltas.raw_tensor(),
            convolution: convolution.descriptor(),
            filter_gradient: filter_gradient.raw_filter(),
        };
        Self::build(context, operands, preference, || {
            vec![
                tensor_shape("source", source),
                tensor_shape("output deltas", output_deltas),
                filter_shape("filter gradient", filter_gradient),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, DnnConfig};
    use crate::dnn::convolution::ConvolutionConfig;
    use crate::dnn::ffi::Status;
    use crate::dnn::filter::{FilterDescriptor, FilterViewDescriptor};
    use crate::dnn::mock::{MockCall, MockLibrary, GEMM, IMPLICIT_GEMM};
    use crate::dnn::tensor::{TensorConstViewDescriptor, TensorDescriptor};
    use crate::error::ErrorCode;
    use crate::memory::HostAllocator;
    use crate::tensor::{Dimension, Matrix, Precision};

    struct Fixture {
        library: Arc<MockLibrary>,
        allocator: Arc<HostAllocator>,
        context: Arc<DnnContext>,
    }

    fn fixture_with(library: MockLibrary, allocator: HostAllocator, config: DnnConfig) -> Fixture {
        let library = Arc::new(library);
        let allocator = Arc::new(allocator);
        let context = DnnContext::with_config(library.clone(), allocator.clone(), config).unwrap();
        Fixture {
            library,
            allocator,
            context,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockLibrary::new(), HostAllocator::new(), DnnConfig::default())
    }

    /// `[8,3,32,32]` input, `[16,3,3,3]` filter, stride 1, no padding.
    struct Problem {
        source: TensorDescriptor,
        filter: FilterDescriptor,
        convolution: ConvolutionDescriptor,
        result: TensorDescriptor,
    }

    fn problem(context: &Arc<DnnContext>) -> Problem {
        let source = TensorDescriptor::zeros(context, &Dimension::from([8, 3, 32, 32]), Precision::Single).unwrap();
        let weights = Matrix::zeros(context.allocator(), Dimension::from([16, 3, 3, 3]), Precision::Single).unwrap();
        let filter = FilterDescriptor::new(context, &weights).unwrap();
        let convolution = ConvolutionDescriptor::new(context, ConvolutionConfig::new_2d([0, 0], [1, 1])).unwrap();
        let output = convolution.output_dimension(&source, &filter).unwrap();
        let result = TensorDescriptor::zeros(context, &output, Precision::Single).unwrap();
        Problem {
            source,
            filter,
            convolution,
            result,
        }
    }

    const IM2COL_BYTES: usize = 3 * 3 * 3 * 30 * 30 * 4;

    #[test]
    fn test_forward_end_to_end() {
        let f = fixture();
        let p = problem(&f.context);
        assert_eq!(p.result.dimension(), &Dimension::from([8, 16, 30, 30]));

        let baseline = f.allocator.bytes_in_use();
        let workspace = ForwardWorkspace::new(&f.context, &p.source, &p.filter, &p.convolution, &p.result).unwrap();

        assert!(workspace.algorithm() >= 0);
        assert_eq!(workspace.pass(), ConvolutionPass::Forward);
        assert_eq!(workspace.size(), IM2COL_BYTES);
        assert!(!workspace.data().is_null());
        assert_eq!(
            workspace.choice(),
            AlgorithmChoice {
                algorithm: GEMM,
                workspace_bytes: IM2COL_BYTES
            }
        );
        assert_eq!(f.allocator.bytes_in_use(), baseline + IM2COL_BYTES);

        drop(workspace);
        assert_eq!(f.allocator.bytes_in_use(), baseline);
        assert_eq!(f.allocator.stats().live_allocations, 3);
    }

    #[test]
    fn test_preferences() {
        let f = fixture();
        let p = problem(&f.context);
        let build = |preference| {
            ForwardWorkspace::with_preference(&f.context, &p.source, &p.filter, &p.convolution, &p.result, preference)
                .unwrap()
        };

        let none = build(AlgorithmPreference::NoWorkspace);
        assert_eq!(none.algorithm(), IMPLICIT_GEMM);
        assert_eq!(none.size(), 0);
        assert!(none.data().is_null());

        assert_eq!(build(AlgorithmPreference::WorkspaceLimit(IM2COL_BYTES - 1)).size(), 0);
        assert_eq!(build(AlgorithmPreference::WorkspaceLimit(IM2COL_BYTES)).size(), IM2COL_BYTES);
        assert_eq!(build(AlgorithmPreference::Exhaustive).algorithm(), GEMM);
    }

    #[test]
    fn test_preference_from_config() {
        let config = ConfigBuilder::new()
            .algorithm(|a| a.preference = AlgorithmPreference::NoWorkspace)
            .build();
        let f = fixture_with(MockLibrary::new(), HostAllocator::new(), config);
        let p = problem(&f.context);

        let workspace = ForwardWorkspace::new(&f.context, &p.source, &p.filter, &p.convolution, &p.result).unwrap();
        assert_eq!(workspace.choice().workspace_bytes, 0);
    }

    #[test]
    fn test_size_matches_library_answer() {
        let library = MockLibrary::new()
            .with_choice(ConvolutionPass::BackwardData, 3, 4096)
            .with_choice(ConvolutionPass::BackwardFilter, 2, 1000);
        let f = fixture_with(library, HostAllocator::new(), DnnConfig::default());
        let p = problem(&f.context);

        let data = BackwardDataWorkspace::new(&f.context, &p.filter, &p.result, &p.convolution, &p.source).unwrap();
        assert_eq!(data.algorithm(), 3);
        assert_eq!(data.size(), 4096);

        let mut gradient = p.filter.matrix().clone();
        let gradient_view = FilterViewDescriptor::new(&f.context, &mut gradient).unwrap();
        let deltas = TensorConstViewDescriptor::new(&f.context, p.result.matrix()).unwrap();
        let filter = BackwardFilterWorkspace::new(&f.context, &p.source, &deltas, &p.convolution, &gradient_view).unwrap();
        assert_eq!(filter.choice(), AlgorithmChoice { algorithm: 2, workspace_bytes: 1000 });

        assert_eq!(f.library.calls(MockCall::BackwardDataAlgorithm), 1);
        assert_eq!(f.library.calls(MockCall::BackwardFilterWorkspaceSize), 1);
    }

    #[test]
    fn test_workspace_limit_enforced_before_allocation() {
        let config = ConfigBuilder::new().memory(|m| m.max_workspace_bytes = Some(1024)).build();
        let f = fixture_with(MockLibrary::new(), HostAllocator::new(), config);
        let p = problem(&f.context);
        let baseline = f.allocator.stats().total_allocations;

        let err = ForwardWorkspace::new(&f.context, &p.source, &p.filter, &p.convolution, &p.result).unwrap_err();
        assert!(matches!(err, DnnError::ResourceExhausted(_)));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("forward convolution workspace"));
        assert_eq!(f.allocator.stats().total_allocations, baseline);
    }

    #[test]
    fn test_allocation_failure_is_exhaustion() {
        let tensors = (8 * 3 * 32 * 32 + 16 * 3 * 3 * 3 + 8 * 16 * 30 * 30) * 4;
        let f = fixture_with(MockLibrary::new(), HostAllocator::with_capacity(tensors + 1024), DnnConfig::default());
        let p = problem(&f.context);
        let baseline = f.allocator.bytes_in_use();

        let err = ForwardWorkspace::new(&f.context, &p.source, &p.filter, &p.convolution, &p.result).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfMemory);
        assert_eq!(f.allocator.bytes_in_use(), baseline);

        let fallback = ForwardWorkspace::with_preference(
            &f.context,
            &p.source,
            &p.filter,
            &p.convolution,
            &p.result,
            AlgorithmPreference::WorkspaceLimit(1024),
        )
        .unwrap();
        assert_eq!(fallback.size(), 0);
    }

    #[test]
    fn test_backward_workspace_limit_enforced() {
        let config = ConfigBuilder::new().memory(|m| m.max_workspace_bytes = Some(1024)).build();
        let f = fixture_with(MockLibrary::new(), HostAllocator::new(), config);
        let p = problem(&f.context);
        let in_use = f.allocator.bytes_in_use();
        let allocations = f.allocator.stats().total_allocations;

        let err = BackwardDataWorkspace::new(&f.context, &p.filter, &p.result, &p.convolution, &p.source).unwrap_err();
        assert!(matches!(err, DnnError::ResourceExhausted(_)));
        assert!(err.to_string().contains("backward data convolution workspace"));

        let gradient = TensorConstViewDescriptor::new(&f.context, p.result.matrix()).unwrap();
        let err = BackwardFilterWorkspace::new(&f.context, &p.source, &gradient, &p.convolution, &p.filter).unwrap_err();
        assert!(matches!(err, DnnError::ResourceExhausted(_)));
        assert!(err.to_string().contains("backward filter convolution workspace"));

        assert_eq!(f.allocator.bytes_in_use(), in_use);
        assert_eq!(f.allocator.stats().total_allocations, allocations);
    }

    #[test]
    fn test_backward_allocation_failure_is_exhaustion() {
        let tensors = (8 * 3 * 32 * 32 + 16 * 3 * 3 * 3 + 8 * 16 * 30 * 30) * 4;
        let f = fixture_with(MockLibrary::new(), HostAllocator::with_capacity(tensors + 1024), DnnConfig::default());
        let p = problem(&f.context);
        let baseline = f.allocator.bytes_in_use();

        let err = BackwardDataWorkspace::new(&f.context, &p.filter, &p.result, &p.convolution, &p.source).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfMemory);
        assert!(err.is_recoverable());
        assert_eq!(f.allocator.bytes_in_use(), baseline);

        let err = BackwardFilterWorkspace::new(&f.context, &p.source, &p.result, &p.convolution, &p.filter).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfMemory);
        assert_eq!(f.allocator.bytes_in_use(), baseline);

        let fallback = BackwardFilterWorkspace::with_preference(
            &f.context,
            &p.source,
            &p.result,
            &p.convolution,
            &p.filter,
            AlgorithmPreference::NoWorkspace,
        )
        .unwrap();
        assert_eq!(fallback.size(), 0);
        assert_eq!(f.allocator.bytes_in_use(), baseline);
    }

    #[test]
    fn test_library_failures_keep_status() {
        let f = fixture();
        let p = problem(&f.context);

        f.library.fail_next(MockCall::ForwardWorkspaceSize, Status::AllocFailed);
        let err = ForwardWorkspace::new(&f.context, &p.source, &p.filter, &p.convolution, &p.result).unwrap_err();
        assert_eq!(
            err,
            DnnError::library("cudnnGetConvolutionForwardWorkspaceSize", Status::AllocFailed)
        );
        assert!(err.is_recoverable());

        // source and result swapped: shapes disagree with the convolution
        let err = ForwardWorkspace::new(&f.context, &p.result, &p.filter, &p.convolution, &p.source).unwrap_err();
        assert_eq!(
            err,
            DnnError::library("cudnnGetConvolutionForwardAlgorithm_v7", Status::BadParam)
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_negative_algorithm_rejected() {
        let library = MockLibrary::new().with_choice(ConvolutionPass::Forward, -1, 0);
        let f = fixture_with(library, HostAllocator::new(), DnnConfig::default());
        let p = problem(&f.context);

        let err = ForwardWorkspace::new(&f.context, &p.source, &p.filter, &p.convolution, &p.result).unwrap_err();
        assert!(matches!(err, DnnError::Configuration(_)));
        assert_eq!(f.library.calls(MockCall::ForwardWorkspaceSize), 0);
    }

    #[test]
    fn test_workspace_round_trip_leaves_allocator_unchanged() {
        let f = fixture();
        let baseline = f.allocator.bytes_in_use();

        for _ in 0..8 {
            let batch = fastrand::usize(1..4);
            let channels = fastrand::usize(1..4);
            let extent = fastrand::usize(3..12);
            let source = TensorDescriptor::zeros(
                &f.context,
                &Dimension::from([batch, channels, extent, extent]),
                Precision::Single,
            )
            .unwrap();
            let weights = Matrix::zeros(f.context.allocator(), Dimension::from([4, channels, 3, 3]), Precision::Single).unwrap();
            let filter = FilterDescriptor::new(&f.context, &weights).unwrap();
            let convolution = ConvolutionDescriptor::new(&f.context, ConvolutionConfig::new_2d([1, 1], [1, 1])).unwrap();
            let output = convolution.output_dimension(&source, &filter).unwrap();
            let result = TensorDescriptor::zeros(&f.context, &output, Precision::Single).unwrap();

            let workspace = ForwardWorkspace::new(&f.context, &source, &filter, &convolution, &result).unwrap();
            assert_eq!(workspace.size(), channels * 9 * extent * extent * 4);
        }

        assert_eq!(f.allocator.bytes_in_use(), baseline);
    }
}
