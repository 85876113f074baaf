//! In-process stand-in for the native library.
//!
//! `MockLibrary` hands out non-null fake handles, records every descriptor it
//! is given, and validates arguments the way the real library does for the
//! calls this crate makes. It also counts creates and destroys per resource
//! kind, so leak and double-destroy checks are plain assertions. Failures can
//! be injected one call at a time with [`MockLibrary::fail_next`].
//!
//! Algorithm selection is deterministic: tag [`IMPLICIT_GEMM`] needs no
//! workspace, tag [`GEMM`] needs an im2col buffer of
//! `C * prod(filter spatial) * prod(output spatial) * element size` bytes.

use std::collections::HashMap;
use std::ffi::c_void;

use parking_lot::{Mutex, MutexGuard};

use super::ffi::{
    AlgorithmPreference, ConvolutionMode, DataType, RawConvolutionDescriptor, RawDropoutDescriptor,
    RawFilterDescriptor, RawHandle, RawPoolingDescriptor, RawRnnDescriptor, RawStream, RawTensorDescriptor,
    RnnAlgorithm, RnnDirection, RnnInputMode, RnnMode, Status, TensorFormat, DIM_MAX,
};
use super::library::{DnnLibrary, LibraryResult, Pooling2dSettings, RnnSettings};
use super::workspace::ConvolutionPass;

/// Algorithm tag that runs without a workspace.
pub const IMPLICIT_GEMM: i32 = 0;
/// Algorithm tag that needs an im2col workspace.
pub const GEMM: i32 = 1;

/// Bytes of RNG state a dropout descriptor asks for.
pub const DROPOUT_STATE_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Handle,
    Tensor,
    Filter,
    Convolution,
    Pooling,
    Dropout,
    Rnn,
}

/// Entry points that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    CreateHandle,
    SetStream,
    CreateTensor,
    SetTensor,
    CreateFilter,
    SetFilter,
    CreateConvolution,
    SetConvolution,
    OutputDim,
    CreatePooling,
    SetPooling,
    CreateDropout,
    DropoutStatesSize,
    SetDropout,
    CreateRnn,
    SetRnn,
    ForwardAlgorithm,
    ForwardWorkspaceSize,
    BackwardDataAlgorithm,
    BackwardDataWorkspaceSize,
    BackwardFilterAlgorithm,
    BackwardFilterWorkspaceSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTensor {
    pub data_type: DataType,
    pub dims: Vec<i32>,
    pub strides: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockFilter {
    pub data_type: DataType,
    pub format: TensorFormat,
    pub dims: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConvolution {
    pub padding: Vec<i32>,
    pub stride: Vec<i32>,
    pub dilation: Vec<i32>,
    pub mode: ConvolutionMode,
    pub compute_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockDropout {
    pub dropout: f32,
    pub states: usize,
    pub state_bytes: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRnn {
    pub hidden_size: i32,
    pub num_layers: i32,
    /// Id of the dropout descriptor the RNN was set with.
    pub dropout: usize,
    pub input_mode: RnnInputMode,
    pub direction: RnnDirection,
    pub mode: RnnMode,
    pub algorithm: RnnAlgorithm,
    pub data_type: DataType,
}

enum Record {
    Handle,
    Tensor(Option<MockTensor>),
    Filter(Option<MockFilter>),
    Convolution(Option<MockConvolution>),
    Pooling(Option<Pooling2dSettings>),
    Dropout(Option<MockDropout>),
    Rnn(Option<MockRnn>),
}

impl Record {
    fn kind(&self) -> ResourceKind {
        match self {
            Record::Handle => ResourceKind::Handle,
            Record::Tensor(_) => ResourceKind::Tensor,
            Record::Filter(_) => ResourceKind::Filter,
            Record::Convolution(_) => ResourceKind::Convolution,
            Record::Pooling(_) => ResourceKind::Pooling,
            Record::Dropout(_) => ResourceKind::Dropout,
            Record::Rnn(_) => ResourceKind::Rnn,
        }
    }
}

#[derive(Default)]
struct MockState {
    next_id: usize,
    records: HashMap<usize, Record>,
    created: HashMap<ResourceKind, usize>,
    destroyed: HashMap<ResourceKind, usize>,
    invalid_destroys: usize,
    calls: HashMap<MockCall, usize>,
    failures: HashMap<MockCall, Status>,
    stream: Option<usize>,
}

pub struct MockLibrary {
    state: Mutex<MockState>,
    choices: HashMap<ConvolutionPass, (i32, usize)>,
}

impl Default for MockLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLibrary {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: 0x1000,
                ..MockState::default()
            }),
            choices: HashMap::new(),
        }
    }

    /// Make `pass` always report `algorithm` with a workspace of `bytes`.
    pub fn with_choice(mut self, pass: ConvolutionPass, algorithm: i32, bytes: usize) -> Self {
        self.choices.insert(pass, (algorithm, bytes));
        self
    }

    /// Make the next invocation of `call` return `status`.
    pub fn fail_next(&self, call: MockCall, status: Status) {
        self.state.lock().failures.insert(call, status);
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        let state = self.state.lock();
        state.records.values().filter(|r| r.kind() == kind).count()
    }

    pub fn created(&self, kind: ResourceKind) -> usize {
        self.state.lock().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn destroyed(&self, kind: ResourceKind) -> usize {
        self.state.lock().destroyed.get(&kind).copied().unwrap_or(0)
    }

    /// Destroy calls made with a handle that was never created or is already gone.
    pub fn invalid_destroys(&self) -> usize {
        self.state.lock().invalid_destroys
    }

    pub fn calls(&self, call: MockCall) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn current_stream(&self) -> Option<usize> {
        self.state.lock().stream
    }

    pub fn tensor(&self, desc: RawTensorDescriptor) -> Option<MockTensor> {
        match self.state.lock().records.get(&(desc as usize)) {
            Some(Record::Tensor(settings)) => settings.clone(),
            _ => None,
        }
    }

    pub fn filter(&self, desc: RawFilterDescriptor) -> Option<MockFilter> {
        match self.state.lock().records.get(&(desc as usize)) {
            Some(Record::Filter(settings)) => settings.clone(),
            _ => None,
        }
    }

    pub fn convolution(&self, desc: RawConvolutionDescriptor) -> Option<MockConvolution> {
        match self.state.lock().records.get(&(desc as usize)) {
            Some(Record::Convolution(settings)) => settings.clone(),
            _ => None,
        }
    }

    pub fn pooling(&self, desc: RawPoolingDescriptor) -> Option<Pooling2dSettings> {
        match self.state.lock().records.get(&(desc as usize)) {
            Some(Record::Pooling(settings)) => *settings,
            _ => None,
        }
    }

    pub fn dropout(&self, desc: RawDropoutDescriptor) -> Option<MockDropout> {
        match self.state.lock().records.get(&(desc as usize)) {
            Some(Record::Dropout(settings)) => settings.clone(),
            _ => None,
        }
    }

    pub fn rnn(&self, desc: RawRnnDescriptor) -> Option<MockRnn> {
        match self.state.lock().records.get(&(desc as usize)) {
            Some(Record::Rnn(settings)) => settings.clone(),
            _ => None,
        }
    }

    /// Decode an `alpha`/`beta` pointer the way the library does for `data_type`.
    ///
    /// # Safety
    /// `ptr` must point at a readable `f64` for `DataType::Double` and at an
    /// `f32` otherwise.
    pub unsafe fn read_scalar(ptr: *const c_void, data_type: DataType) -> f64 {
        match data_type {
            DataType::Double => *(ptr as *const f64),
            _ => *(ptr as *const f32) as f64,
        }
    }

    // -- bookkeeping ---------------------------------------------------------

    fn begin(&self, call: MockCall) -> LibraryResult<MutexGuard<'_, MockState>> {
        let mut state = self.state.lock();
        *state.calls.entry(call).or_insert(0) += 1;
        let injected = state.failures.remove(&call);
        match injected {
            Some(status) => {
                tracing::trace!("mock: injected {} for {:?}", status, call);
                Err(status)
            }
            None => Ok(state),
        }
    }

    fn create(&self, call: MockCall, record: Record) -> LibraryResult<usize> {
        let mut state = self.begin(call)?;
        let id = state.next_id;
        state.next_id += 0x10;
        *state.created.entry(record.kind()).or_insert(0) += 1;
        state.records.insert(id, record);
        Ok(id)
    }

    fn destroy(&self, id: usize, kind: ResourceKind) -> LibraryResult<()> {
        let mut state = self.state.lock();
        if state.records.get(&id).map(Record::kind) == Some(kind) {
            state.records.remove(&id);
            *state.destroyed.entry(kind).or_insert(0) += 1;
            Ok(())
        } else {
            state.invalid_destroys += 1;
            tracing::trace!("mock: invalid destroy of {:?} {:#x}", kind, id);
            Err(Status::BadParam)
        }
    }

    fn choose(&self, pass: ConvolutionPass, preference: AlgorithmPreference, im2col_bytes: usize) -> i32 {
        if let Some(&(algorithm, _)) = self.choices.get(&pass) {
            return algorithm;
        }
        match preference {
            AlgorithmPreference::Fastest | AlgorithmPreference::Exhaustive => GEMM,
            AlgorithmPreference::WorkspaceLimit(limit) if im2col_bytes <= limit => GEMM,
            AlgorithmPreference::WorkspaceLimit(_) | AlgorithmPreference::NoWorkspace => IMPLICIT_GEMM,
        }
    }

    fn workspace_for(&self, pass: ConvolutionPass, algorithm: i32, im2col_bytes: usize) -> LibraryResult<usize> {
        if let Some(&(chosen, bytes)) = self.choices.get(&pass) {
            if chosen == algorithm {
                return Ok(bytes);
            }
        }
        match algorithm {
            IMPLICIT_GEMM => Ok(0),
            GEMM => Ok(im2col_bytes),
            _ => Err(Status::BadParam),
        }
    }
}

fn element_size(data_type: DataType) -> usize {
    match data_type {
        DataType::Half => 2,
        DataType::Float | DataType::Int32 => 4,
        DataType::Double => 8,
        DataType::Int8 => 1,
    }
}

fn valid_rank(rank: usize) -> bool {
    (3..=DIM_MAX).contains(&rank)
}

fn require_handle(state: &MockState, handle: RawHandle) -> LibraryResult<()> {
    match state.records.get(&(handle as usize)) {
        Some(Record::Handle) => Ok(()),
        _ => Err(Status::BadParam),
    }
}

fn tensor_settings(state: &MockState, desc: RawTensorDescriptor) -> LibraryResult<&MockTensor> {
    match state.records.get(&(desc as usize)) {
        Some(Record::Tensor(Some(settings))) => Ok(settings),
        _ => Err(Status::BadParam),
    }
}

fn filter_settings(state: &MockState, desc: RawFilterDescriptor) -> LibraryResult<&MockFilter> {
    match state.records.get(&(desc as usize)) {
        Some(Record::Filter(Some(settings))) => Ok(settings),
        _ => Err(Status::BadParam),
    }
}

fn convolution_settings(state: &MockState, desc: RawConvolutionDescriptor) -> LibraryResult<&MockConvolution> {
    match state.records.get(&(desc as usize)) {
        Some(Record::Convolution(Some(settings))) => Ok(settings),
        _ => Err(Status::BadParam),
    }
}

/// `[N, K, spatial...]` for `input` convolved with `filter`.
fn output_dims(input: &MockTensor, filter: &MockFilter, conv: &MockConvolution) -> LibraryResult<Vec<i32>> {
    let rank = input.dims.len();
    if filter.dims.len() != rank || conv.padding.len() + 2 != rank {
        return Err(Status::BadParam);
    }
    if input.data_type != filter.data_type || input.dims[1] != filter.dims[1] {
        return Err(Status::BadParam);
    }

    let mut output = vec![input.dims[0], filter.dims[0]];
    for i in 0..conv.padding.len() {
        let padded = input.dims[i + 2] + 2 * conv.padding[i];
        let extent = (filter.dims[i + 2] - 1) * conv.dilation[i] + 1;
        if extent > padded {
            return Err(Status::BadParam);
        }
        output.push((padded - extent) / conv.stride[i] + 1);
    }
    Ok(output)
}

/// Validate a convolution problem and return the im2col buffer size it would need.
fn im2col_bytes(
    state: &MockState,
    handle: RawHandle,
    input: RawTensorDescriptor,
    filter: RawFilterDescriptor,
    conv: RawConvolutionDescriptor,
    output: RawTensorDescriptor,
) -> LibraryResult<usize> {
    require_handle(state, handle)?;
    let input = tensor_settings(state, input)?;
    let filter = filter_settings(state, filter)?;
    let conv = convolution_settings(state, conv)?;
    let output = tensor_settings(state, output)?;

    let expected = output_dims(input, filter, conv)?;
    if output.dims != expected || output.data_type != input.data_type {
        return Err(Status::BadParam);
    }

    let filter_volume: usize = filter.dims[1..].iter().map(|&d| d as usize).product();
    let output_spatial: usize = expected[2..].iter().map(|&d| d as usize).product();
    Ok(filter_volume * output_spatial * element_size(input.data_type))
}

impl DnnLibrary for MockLibrary {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn create_handle(&self) -> LibraryResult<RawHandle> {
        self.create(MockCall::CreateHandle, Record::Handle).map(|id| id as RawHandle)
    }

    fn destroy_handle(&self, handle: RawHandle) -> LibraryResult<()> {
        self.destroy(handle as usize, ResourceKind::Handle)
    }

    fn set_stream(&self, handle: RawHandle, stream: RawStream) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetStream)?;
        require_handle(&state, handle)?;
        state.stream = (!stream.is_null()).then_some(stream as usize);
        Ok(())
    }

    fn create_tensor_descriptor(&self) -> LibraryResult<RawTensorDescriptor> {
        self.create(MockCall::CreateTensor, Record::Tensor(None))
            .map(|id| id as RawTensorDescriptor)
    }

    fn set_tensor_descriptor(
        &self,
        desc: RawTensorDescriptor,
        data_type: DataType,
        dims: &[i32],
        strides: &[i32],
    ) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetTensor)?;
        if !valid_rank(dims.len()) || dims.len() != strides.len() {
            return Err(Status::BadParam);
        }
        if dims.iter().chain(strides).any(|&v| v <= 0) {
            return Err(Status::BadParam);
        }
        match state.records.get_mut(&(desc as usize)) {
            Some(Record::Tensor(settings)) => {
                *settings = Some(MockTensor {
                    data_type,
                    dims: dims.to_vec(),
                    strides: strides.to_vec(),
                });
                Ok(())
            }
            _ => Err(Status::BadParam),
        }
    }

    fn destroy_tensor_descriptor(&self, desc: RawTensorDescriptor) -> LibraryResult<()> {
        self.destroy(desc as usize, ResourceKind::Tensor)
    }

    fn create_filter_descriptor(&self) -> LibraryResult<RawFilterDescriptor> {
        self.create(MockCall::CreateFilter, Record::Filter(None))
            .map(|id| id as RawFilterDescriptor)
    }

    fn set_filter_descriptor(
        &self,
        desc: RawFilterDescriptor,
        data_type: DataType,
        format: TensorFormat,
        dims: &[i32],
    ) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetFilter)?;
        if !valid_rank(dims.len()) || dims.iter().any(|&v| v <= 0) {
            return Err(Status::BadParam);
        }
        match state.records.get_mut(&(desc as usize)) {
            Some(Record::Filter(settings)) => {
                *settings = Some(MockFilter {
                    data_type,
                    format,
                    dims: dims.to_vec(),
                });
                Ok(())
            }
            _ => Err(Status::BadParam),
        }
    }

    fn destroy_filter_descriptor(&self, desc: RawFilterDescriptor) -> LibraryResult<()> {
        self.destroy(desc as usize, ResourceKind::Filter)
    }

    fn create_convolution_descriptor(&self) -> LibraryResult<RawConvolutionDescriptor> {
        self.create(MockCall::CreateConvolution, Record::Convolution(None))
            .map(|id| id as RawConvolutionDescriptor)
    }

    fn set_convolution_descriptor(
        &self,
        desc: RawConvolutionDescriptor,
        padding: &[i32],
        stride: &[i32],
        dilation: &[i32],
        mode: ConvolutionMode,
        compute_type: DataType,
    ) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetConvolution)?;
        let rank = padding.len();
        if rank == 0 || rank + 2 > DIM_MAX || stride.len() != rank || dilation.len() != rank {
            return Err(Status::BadParam);
        }
        if padding.iter().any(|&p| p < 0) || stride.iter().chain(dilation).any(|&v| v <= 0) {
            return Err(Status::BadParam);
        }
        match state.records.get_mut(&(desc as usize)) {
            Some(Record::Convolution(settings)) => {
                *settings = Some(MockConvolution {
                    padding: padding.to_vec(),
                    stride: stride.to_vec(),
                    dilation: dilation.to_vec(),
                    mode,
                    compute_type,
                });
                Ok(())
            }
            _ => Err(Status::BadParam),
        }
    }

    fn destroy_convolution_descriptor(&self, desc: RawConvolutionDescriptor) -> LibraryResult<()> {
        self.destroy(desc as usize, ResourceKind::Convolution)
    }

    fn convolution_forward_output_dim(
        &self,
        conv: RawConvolutionDescriptor,
        input: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        output: &mut [i32],
    ) -> LibraryResult<()> {
        let state = self.begin(MockCall::OutputDim)?;
        let dims = output_dims(
            tensor_settings(&state, input)?,
            filter_settings(&state, filter)?,
            convolution_settings(&state, conv)?,
        )?;
        if dims.len() != output.len() {
            return Err(Status::BadParam);
        }
        output.copy_from_slice(&dims);
        Ok(())
    }

    fn create_pooling_descriptor(&self) -> LibraryResult<RawPoolingDescriptor> {
        self.create(MockCall::CreatePooling, Record::Pooling(None))
            .map(|id| id as RawPoolingDescriptor)
    }

    fn set_pooling_2d_descriptor(&self, desc: RawPoolingDescriptor, settings: &Pooling2dSettings) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetPooling)?;
        let positive = settings.window.iter().chain(&settings.stride).all(|&v| v > 0);
        if !positive || settings.padding.iter().any(|&p| p < 0) {
            return Err(Status::BadParam);
        }
        match state.records.get_mut(&(desc as usize)) {
            Some(Record::Pooling(slot)) => {
                *slot = Some(*settings);
                Ok(())
            }
            _ => Err(Status::BadParam),
        }
    }

    fn destroy_pooling_descriptor(&self, desc: RawPoolingDescriptor) -> LibraryResult<()> {
        self.destroy(desc as usize, ResourceKind::Pooling)
    }

    fn create_dropout_descriptor(&self) -> LibraryResult<RawDropoutDescriptor> {
        self.create(MockCall::CreateDropout, Record::Dropout(None))
            .map(|id| id as RawDropoutDescriptor)
    }

    fn dropout_states_size(&self, handle: RawHandle) -> LibraryResult<usize> {
        let state = self.begin(MockCall::DropoutStatesSize)?;
        require_handle(&state, handle)?;
        Ok(DROPOUT_STATE_BYTES)
    }

    fn set_dropout_descriptor(
        &self,
        desc: RawDropoutDescriptor,
        handle: RawHandle,
        dropout: f32,
        states: *mut c_void,
        state_bytes: usize,
        seed: u64,
    ) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetDropout)?;
        require_handle(&state, handle)?;
        if !(0.0..1.0).contains(&dropout) || states.is_null() || state_bytes < DROPOUT_STATE_BYTES {
            return Err(Status::BadParam);
        }
        match state.records.get_mut(&(desc as usize)) {
            Some(Record::Dropout(settings)) => {
                *settings = Some(MockDropout {
                    dropout,
                    states: states as usize,
                    state_bytes,
                    seed,
                });
                Ok(())
            }
            _ => Err(Status::BadParam),
        }
    }

    fn destroy_dropout_descriptor(&self, desc: RawDropoutDescriptor) -> LibraryResult<()> {
        self.destroy(desc as usize, ResourceKind::Dropout)
    }

    fn create_rnn_descriptor(&self) -> LibraryResult<RawRnnDescriptor> {
        self.create(MockCall::CreateRnn, Record::Rnn(None))
            .map(|id| id as RawRnnDescriptor)
    }

    fn set_rnn_descriptor(&self, handle: RawHandle, desc: RawRnnDescriptor, settings: &RnnSettings) -> LibraryResult<()> {
        let mut state = self.begin(MockCall::SetRnn)?;
        require_handle(&state, handle)?;
        if settings.hidden_size <= 0 || settings.num_layers <= 0 {
            return Err(Status::BadParam);
        }
        if matches!(settings.data_type, DataType::Int8 | DataType::Int32) {
            return Err(Status::NotSupported);
        }
        if !matches!(state.records.get(&(settings.dropout as usize)), Some(Record::Dropout(Some(_)))) {
            return Err(Status::BadParam);
        }
        match state.records.get_mut(&(desc as usize)) {
            Some(Record::Rnn(slot)) => {
                *slot = Some(MockRnn {
                    hidden_size: settings.hidden_size,
                    num_layers: settings.num_layers,
                    dropout: settings.dropout as usize,
                    input_mode: settings.input_mode,
                    direction: settings.direction,
                    mode: settings.mode,
                    algorithm: settings.algorithm,
                    data_type: settings.data_type,
                });
                Ok(())
            }
            _ => Err(Status::BadParam),
        }
    }

    fn destroy_rnn_descriptor(&self, desc: RawRnnDescriptor) -> LibraryResult<()> {
        self.destroy(desc as usize, ResourceKind::Rnn)
    }

    fn forward_algorithm(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        conv: RawConvolutionDescriptor,
        result: RawTensorDescriptor,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32> {
        let state = self.begin(MockCall::ForwardAlgorithm)?;
        let bytes = im2col_bytes(&state, handle, source, filter, conv, result)?;
        Ok(self.choose(ConvolutionPass::Forward, preference, bytes))
    }

    fn forward_workspace_size(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        conv: RawConvolutionDescriptor,
        result: RawTensorDescriptor,
        algorithm: i32,
    ) -> LibraryResult<usize> {
        let state = self.begin(MockCall::ForwardWorkspaceSize)?;
        let bytes = im2col_bytes(&state, handle, source, filter, conv, result)?;
        self.workspace_for(ConvolutionPass::Forward, algorithm, bytes)
    }

    fn backward_data_algorithm(
        &self,
        handle: RawHandle,
        filter: RawFilterDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        input_deltas: RawTensorDescriptor,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32> {
        let state = self.begin(MockCall::BackwardDataAlgorithm)?;
        let bytes = im2col_bytes(&state, handle, input_deltas, filter, conv, output_deltas)?;
        Ok(self.choose(ConvolutionPass::BackwardData, preference, bytes))
    }

    fn backward_data_workspace_size(
        &self,
        handle: RawHandle,
        filter: RawFilterDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        input_deltas: RawTensorDescriptor,
        algorithm: i32,
    ) -> LibraryResult<usize> {
        let state = self.begin(MockCall::BackwardDataWorkspaceSize)?;
        let bytes = im2col_bytes(&state, handle, input_deltas, filter, conv, output_deltas)?;
        self.workspace_for(ConvolutionPass::BackwardData, algorithm, bytes)
    }

    fn backward_filter_algorithm(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        filter_gradient: RawFilterDescriptor,
        preference: AlgorithmPreference,
    ) -> LibraryResult<i32> {
        let state = self.begin(MockCall::BackwardFilterAlgorithm)?;
        let bytes = im2col_bytes(&state, handle, source, filter_gradient, conv, output_deltas)?;
        Ok(self.choose(ConvolutionPass::BackwardFilter, preference, bytes))
    }

    fn backward_filter_workspace_size(
        &self,
        handle: RawHandle,
        source: RawTensorDescriptor,
        output_deltas: RawTensorDescriptor,
        conv: RawConvolutionDescriptor,
        filter_gradient: RawFilterDescriptor,
        algorithm: i32,
    ) -> LibraryResult<usize> {
        let state = self.begin(MockCall::BackwardFilterWorkspaceSize)?;
        let bytes = im2col_bytes(&state, handle, source, filter_gradient, conv, output_deltas)?;
        self.workspace_for(ConvolutionPass::BackwardFilter, algorithm, bytes)
    }
}
