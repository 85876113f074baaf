//! `DnnLibrary` backed by the system cuDNN 8, loaded with dlopen.
//!
//! Only the entry points this crate wraps are resolved. Heuristic algorithm
//! selection goes through the `_v7` queries; `AlgorithmPreference::Exhaustive`
//! uses the `Find*` calls, which benchmark on the device.

use std::ffi::{c_int, c_void};

use libloading::Library;

use super::ffi::{
    AlgorithmPreference, ConvolutionMode, DataType, RawConvolutionDescriptor, RawDropoutDescriptor,
    RawFilterDescriptor, RawHandle, RawPoolingDescriptor, RawRnnDescriptor, RawStream, RawTensorDescriptor, Status,
    TensorFormat,
};
use super::library::{DnnLibrary, LibraryResult, Pooling2dSettings, RnnSettings};
use crate::error::{DnnError, DnnResult};

type StatusT = c_int;

/// `cudnnConvolution{Fwd,BwdData,BwdFilter}AlgoPerf_t` share this layout.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct AlgorithmPerf {
    algo: c_int,
    status: StatusT,
    time: f32,
    memory: usize,
    determinism: c_int,
    math_type: c_int,
    reserved: [c_int; 3],
}

impl AlgorithmPerf {
    const EMPTY: Self = Self {
        algo: -1,
        status: 0,
        time: 0.0,
        memory: 0,
        determinism: 0,
        math_type: 0,
        reserved: [0; 3],
    };
}

const REQUESTED_ALGORITHMS: usize = 8;

// Handle and stream
type FnCreate = unsafe extern "C" fn(*mut RawHandle) -> StatusT;
type FnDestroy = unsafe extern "C" fn(RawHandle) -> StatusT;
type FnSetStream = unsafe extern "C" fn(RawHandle, RawStream) -> StatusT;

// Tensor
type FnCreateTensor = unsafe extern "C" fn(*mut RawTensorDescriptor) -> StatusT;
type FnSetTensorNd = unsafe extern "C" fn(RawTensorDescriptor, c_int, c_int, *const c_int, *const c_int) -> StatusT;
type FnDestroyTensor = unsafe extern "C" fn(RawTensorDescriptor) -> StatusT;

// Filter
type FnCreateFilter = unsafe extern "C" fn(*mut RawFilterDescriptor) -> StatusT;
type FnSetFilterNd = unsafe extern "C" fn(RawFilterDescriptor, c_int, c_int, c_int, *const c_int) -> StatusT;
type FnDestroyFilter = unsafe extern "C" fn(RawFilterDescriptor) -> StatusT;

// Convolution
type FnCreateConvolution = unsafe extern "C" fn(*mut RawConvolutionDescriptor) -> StatusT;
type FnSetConvolutionNd = unsafe extern "C" fn(
    RawConvolutionDescriptor,
    c_int,        // arrayLength
    *const c_int, // padA
    *const c_int, // filterStrideA
    *const c_int, // dilationA
    c_int,        // mode
    c_int,        // computeType
) -> StatusT;
type FnDestroyConvolution = unsafe extern "C" fn(RawConvolutionDescriptor) -> StatusT;
type FnForwardOutputDim = unsafe extern "C" fn(
    RawConvolutionDescriptor,
    RawTensorDescriptor,
    RawFilterDescriptor,
    c_int,
    *mut c_int,
) -> StatusT;

// Pooling
type FnCreatePooling = unsafe extern "C" fn(*mut RawPoolingDescriptor) -> StatusT;
type FnSetPooling2d = unsafe extern "C" fn(
    RawPoolingDescriptor,
    c_int, // mode
    c_int, // maxpoolingNanOpt
    c_int, // windowHeight
    c_int, // windowWidth
    c_int, // verticalPadding
    c_int, // horizontalPadding
    c_int, // verticalStride
    c_int, // horizontalStride
) -> StatusT;
type FnDestroyPooling = unsafe extern "C" fn(RawPoolingDescriptor) -> StatusT;

// Dropout
type FnCreateDropout = unsafe extern "C" fn(*mut RawDropoutDescriptor) -> StatusT;
type FnDropoutStatesSize = unsafe extern "C" fn(RawHandle, *mut usize) -> StatusT;
type FnSetDropout = unsafe extern "C" fn(RawDropoutDescriptor, RawHandle, f32, *mut c_void, usize, u64) -> StatusT;
type FnDestroyDropout = unsafe extern "C" fn(RawDropoutDescriptor) -> StatusT;

// RNN
type FnCreateRnn = unsafe extern "C" fn(*mut RawRnnDescriptor) -> StatusT;
type FnSetRnnV6 = unsafe extern "C" fn(
    RawHandle,
    RawRnnDescriptor,
    c_int, // hiddenSize
    c_int, // numLayers
    RawDropoutDescriptor,
    c_int, // inputMode
    c_int, // direction
    c_int, // mode
    c_int, // algo
    c_int, // mathPrec
) -> StatusT;
type FnDestroyRnn = unsafe extern "C" fn(RawRnnDescriptor) -> StatusT;

// Algorithm queries. Argument order differs per pass but the shape is the same:
// four descriptors, a requested count, a returned count and the perf array.
type FnForwardAlgorithms = unsafe extern "C" fn(
    RawHandle,
    RawTensorDescriptor,
    RawFilterDescriptor,
    RawConvolutionDescriptor,
    RawTensorDescriptor,
    c_int,
    *mut c_int,
    *mut AlgorithmPerf,
) -> StatusT;
type FnBackwardDataAlgorithms = unsafe extern "C" fn(
    RawHandle,
    RawFilterDescriptor,
    RawTensorDescriptor,
    RawConvolutionDescriptor,
    RawTensorDescriptor,
    c_int,
    *mut c_int,
    *mut AlgorithmPerf,
) -> StatusT;
type FnBackwardFilterAlgorithms = unsafe extern "C" fn(
    RawHandle,
    RawTensorDescriptor,
    RawTensorDescriptor,
    RawConvolutionDescriptor,
    RawFilterDescriptor,
    c_int,
    *mut c_int,
    *mut AlgorithmPerf,
) -> StatusT;

type FnForwardWorkspaceSize = unsafe extern "C" fn(
    RawHandle,
    RawTensorDescriptor,
    RawFilterDescriptor,
    RawConvolutionDescriptor,
    RawTensorDescriptor,
    c_int,
    *mut usize,
) -> StatusT;
type FnBackwardDataWorkspaceSize = unsafe extern "C" fn(
    RawHandle,
    RawFilterDescriptor,
    RawTensorDescriptor,
    RawConvolutionDescriptor,
    RawTensorDescriptor,
    c_int,
    *mut usize,
) -> StatusT;
type FnBackwardFilterWorkspaceSize = unsafe extern "C" fn(
    RawHandle,
    RawTensorDescriptor,
    RawTensorDescriptor,
    RawConvolutionDescriptor,
    RawFilterDescriptor,
    c_int,
    *mut usize,
) -> StatusT;

const LIBRARY_NAMES: &[&str] = &["libcudnn.so", "libcudnn.so.8"];

pub struct CudnnLibrary {
    _lib: Library,
    create: FnCreate,
    destroy: FnDestroy,
    set_stream: FnSetStream,
    create_tensor: FnCreateTensor,
    set_tensor_nd: FnSetTensorNd,
    destroy_tensor: FnDestroyTensor,
    create_filter: FnCreateFilter,
    set_filter_nd: FnSetFilterNd,
    destroy_filter: FnDestroyFilter,
    create_convolution: FnCreateConvolution,
    set_convolution_nd: FnSetConvolutionNd,
    destroy_convolution: FnDestroyConvolution,
    forward_output_dim: FnForwardOutputDim,
    create_pooling: FnCreatePooling,
    set_pooling_2d: FnSetPooling2d,
    destroy_pooling: FnDestroyPooling,
    create_dropout: FnCreateDropout,
    dropout_states_size: FnDropoutStatesSize,
    set_dropout: FnSetDropout,
    destroy_dropout: FnDestroyDropout,
    create_rnn: FnCreateRnn,
    set_rnn_v6: FnSetRnnV6,
    destroy_rnn: FnDestroyRnn,
    forward_algorithm_v7: FnForwardAlgorithms,
    find_forward_algorithm: FnForwardAlgorithms,
    forward_workspace_size: FnForwardWorkspaceSize,
    backward_data_algorithm_v7: FnBackwardDataAlgorithms,
    find_backward_data_algorithm: FnBackwardDataAlgorithms,
    backward_data_workspace_size: FnBackwardDataWorkspaceSize,
    backward_filter_algorithm_v7: FnBackwardFilterAlgorithms,
    find_backward_filter_algorithm: FnBackwardFilterAlgorithms,
    backward_filter_workspace_size: FnBackwardFilterWorkspaceSize,
}

// Plain function pointers into a library that stays loaded as long as `_lib`.
unsafe impl Send for CudnnLibrary {}
unsafe impl Sync for CudnnLibrary {}

macro_rules! symbol {
    ($lib:expr, $name:literal) => {
        *$lib
            .get(concat!($name, "\0").as_bytes())
            .map_err(|e: libloading::Error| DnnError::LibraryUnavailable(format!("{}: {}", $name, e)))?
    };
}

impl CudnnLibrary {
    pub fn load() -> DnnResult<Self> {
        let lib = LIBRARY_NAMES
            .iter()
            .find_map(|name| unsafe { Library::new(name) }.ok())
            .ok_or_else(|| DnnError::LibraryUnavailable("libcudnn not found".to_string()))?;

        let library = unsafe {
            CudnnLibrary {
                create: symbol!(lib, "cudnnCreate"),
                destroy: symbol!(lib, "cudnnDestroy"),
                set_stream: symbol!(lib, "cudnnSetStream"),
                create_tensor: symbol!(lib, "cudnnCreateTensorDescriptor"),
                set_tensor_nd: symbol!(lib, "cudnnSetTensorNdDescriptor"),
                destroy_tensor: symbol!(lib, "cudnnDestroyTensorDescriptor"),
                create_filter: symbol!(lib, "cudnnCreateFilterDescriptor"),
                set_filter_nd: symbol!(lib, "cudnnSetFilterNdDescriptor"),
                destroy_filter: symbol!(lib, "cudnnDestroyFilterDescriptor"),
                create_convolution: symbol!(lib, "cudnnCreateConvolutionDescriptor"),
                set_convolution_nd: symbol!(lib, "cudnnSetConvolutionNdDescriptor"),
                destroy_convolution: symbol!(lib, "cudnnDestroyConvolutionDescriptor"),
                forward_output_dim: symbol!(lib, "cudnnGetConvolutionNdForwardOutputDim"),
                create_pooling: symbol!(lib, "cudnnCreatePoolingDescriptor"),
                set_pooling_2d: symbol!(lib, "cudnnSetPooling2dDescriptor"),
                destroy_pooling: symbol!(lib, "cudnnDestroyPoolingDescriptor"),
                create_dropout: symbol!(lib, "cudnnCreateDropoutDescriptor"),
                dropout_states_size: symbol!(lib, "cudnnDropoutGetStatesSize"),
                set_dropout: symbol!(lib, "cudnnSetDropoutDescriptor"),
                destroy_dropout: symbol!(lib, "cudnnDestroyDropoutDescriptor"),
                create_rnn: symbol!(lib, "cudnnCreateRNNDescriptor"),
                set_rnn_v6: symbol!(lib, "cudnnSetRNNDescriptor_v6"),
                destroy_rnn: symbol!(lib, "cudnnDestroyRNNDescriptor"),
                forward_algorithm_v7: symbol!(lib, "cudnnGetConvolutionForwardAlgorithm_v7"),
                find_forward_algorithm: symbol!(lib, "cudnnFindConvolutionForwardAlgorithm"),
                forward_workspace_size: symbol!(lib, "cudnnGetConvolutionForwardWorkspaceSize"),
                backward_data_algorithm_v7: symbol!(lib, "cudnnGetConvolutionBackwardDataAlgorithm_v7"),
                find_backward_data_algorithm: symbol!(lib, "cudnnFindConvolutionBackwardDataAlgorithm"),
                backward_data_workspace_size: symbol!(lib, "cudnnGetConvolutionBackwardDataWorkspaceSize"),
                backward_filter_algorithm_v7: symbol!(lib, "cudnnGetConvolutionBackwardFilterAlgorithm_v7"),
                find_backward_filter_algorithm: symbol!(lib, "cudnnFindConvolutionBackwardFilterAlgorithm"),
                backward_filter_workspace_size: symbol!(lib, "cudnnGetConvolutionBackwardFilterWorkspaceSize"),
                _lib: lib,
            }
        };

        tracing::info!("cuDNN loaded");
        Ok(library)
    }
}

fn create_with<T>(f: impl FnOnce(*mut T) -> StatusT) -> LibraryResult<T>
where
    T: Copy,
{
    let mut raw = std::mem::MaybeUninit::<T>::uninit();
    Status::check(f(raw.as_mut_ptr()))?;
    Ok(unsafe { raw.assume_init() })
}

fn rank(len: usize) -> LibraryResult<c_int> {
    c_int::try_from(len).map_err(|_| Status::BadParam)
}

/// Pick from a perf list sorted fastest first.
fn pick(perf: &[AlgorithmPerf], preference: AlgorithmPreference) -> LibraryResult<i32> {
    perf.iter()
        .filter(|p| p.status == Status::SUCCESS && p.algo >= 0)
        .find(|p| match preference {
            AlgorithmPreference::Fastest | AlgorithmPreference::Exhaustive => true,
            AlgorithmPreference::WorkspaceLimit(limit) => p.memory <= limit,
            AlgorithmPreference::NoWorkspace => p.memory == 0,
        })
        .map(|p| p.algo)
        .ok_or(Status::NotSupported)
}

/// Run a heuristic or find query and pick from its results.
fn select(
    preference: AlgorithmPreference,
    query: impl FnOnce(c_int, *mut c_int, *mut AlgorithmPerf) -> StatusT,
) -> LibraryResult<i32> {
    let mut perf = [AlgorithmPerf::EMPTY; REQUESTED_ALGORITHMS];
    let mut returned: c_int = 0;
    Status::check(query(REQUESTED_ALGORITHMS as c_int, &mut returned, perf.as_mut_ptr()))?;

    let returned = (returned.max(0) as usize).min(REQUESTED_ALGORITHMS);
    pick(&perf[..returned], preference)
}

fn query_size(f: impl FnOnce(*mut usize) -> StatusT) -> LibraryResult<usize> {
    let mut bytes = 0usize;
    Status::check(f(&mut bytes))?;
    Ok(bytes)
}

impl DnnLibrary for CudnnLibrary {
    fn name(&self) -> &'static str {
        "cudnn"
    }

    fn create_handle(&self) -> LibraryResult<RawHandle> {
        create_with(|out| unsafe { (self.create)(out) })
    }

    fn destroy_handle(&self, handle: RawHandle) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy)(handle) })
    }

    fn set_stream(&self, handle: RawHandle, stream: RawStream) -> LibraryResult<()> {
        Status::check(unsafe { (self.set_stream)(handle, stream) })
    }

    fn create_tensor_descriptor(&self) -> LibraryResult<RawTensorDescriptor> {
        create_with(|out| unsafe { (self.create_tensor)(out) })
    }

    fn set_tensor_descriptor(
        &self,
        desc: RawTensorDescriptor,
        data_type: DataType,
        dims: &[i32],
        strides: &[i32],
    ) -> LibraryResult<()> {
        if dims.len() != strides.len() {
            return Err(Status::BadParam);
        }
        Status::check(unsafe {
            (self.set_tensor_nd)(
                desc,
                data_type.as_raw(),
                rank(dims.len())?,
                dims.as_ptr(),
                strides.as_ptr(),
            )
        })
    }

    fn destroy_tensor_descriptor(&self, desc: RawTensorDescriptor) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy_tensor)(desc) })
    }

    fn create_filter_descriptor(&self) -> LibraryResult<RawFilterDescriptor> {
        create_with(|out| unsafe { (self.create_filter)(out) })
    }

    fn set_filter_descriptor(
        &self,
        desc: RawFilterDescriptor,
        data_type: DataType,
        format: TensorFormat,
        dims: &[i32],
    ) -> LibraryResult<()> {
        Status::check(unsafe {
            (self.set_filter_nd)(
                desc,
                data_type.as_raw(),
                format.as_raw(),
                rank(dims.len())?,
                dims.as_ptr(),
            )
        })
    }

    fn destroy_filter_descriptor(&self, desc: RawFilterDescriptor) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy_filter)(desc) })
    }

    fn create_convolution_descriptor(&self) -> LibraryResult<RawConvolutionDescriptor> {
        create_with(|out| unsafe { (self.create_convolution)(out) })
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
        if stride.len() != padding.len() || dilation.len() != padding.len() {
            return Err(Status::BadParam);
        }
        Status::check(unsafe {
            (self.set_convolution_nd)(
                desc,
                rank(padding.len())?,
                padding.as_ptr(),
                stride.as_ptr(),
                dilation.as_ptr(),
                mode.as_raw(),
                compute_type.as_raw(),
            )
        })
    }

    fn destroy_convolution_descriptor(&self, desc: RawConvolutionDescriptor) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy_convolution)(desc) })
    }

    fn convolution_forward_output_dim(
        &self,
        conv: RawConvolutionDescriptor,
        input: RawTensorDescriptor,
        filter: RawFilterDescriptor,
        output: &mut [i32],
    ) -> LibraryResult<()> {
        Status::check(unsafe {
            (self.forward_output_dim)(conv, input, filter, rank(output.len())?, output.as_mut_ptr())
        })
    }

    fn create_pooling_descriptor(&self) -> LibraryResult<RawPoolingDescriptor> {
        create_with(|out| unsafe { (self.create_pooling)(out) })
    }

    fn set_pooling_2d_descriptor(&self, desc: RawPoolingDescriptor, settings: &Pooling2dSettings) -> LibraryResult<()> {
        Status::check(unsafe {
            (self.set_pooling_2d)(
                desc,
                settings.mode.as_raw(),
                settings.nan_propagation.as_raw(),
                settings.window[0],
                settings.window[1],
                settings.padding[0],
                settings.padding[1],
                settings.stride[0],
                settings.stride[1],
            )
        })
    }

    fn destroy_pooling_descriptor(&self, desc: RawPoolingDescriptor) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy_pooling)(desc) })
    }

    fn create_dropout_descriptor(&self) -> LibraryResult<RawDropoutDescriptor> {
        create_with(|out| unsafe { (self.create_dropout)(out) })
    }

    fn dropout_states_size(&self, handle: RawHandle) -> LibraryResult<usize> {
        query_size(|out| unsafe { (self.dropout_states_size)(handle, out) })
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
        Status::check(unsafe { (self.set_dropout)(desc, handle, dropout, states, state_bytes, seed) })
    }

    fn destroy_dropout_descriptor(&self, desc: RawDropoutDescriptor) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy_dropout)(desc) })
    }

    fn create_rnn_descriptor(&self) -> LibraryResult<RawRnnDescriptor> {
        create_with(|out| unsafe { (self.create_rnn)(out) })
    }

    fn set_rnn_descriptor(&self, handle: RawHandle, desc: RawRnnDescriptor, settings: &RnnSettings) -> LibraryResult<()> {
        Status::check(unsafe {
            (self.set_rnn_v6)(
                handle,
                desc,
                settings.hidden_size,
                settings.num_layers,
                settings.dropout,
                settings.input_mode.as_raw(),
                settings.direction.as_raw(),
                settings.mode.as_raw(),
                settings.algorithm.as_raw(),
                settings.data_type.as_raw(),
            )
        })
    }

    fn destroy_rnn_descriptor(&self, desc: RawRnnDescriptor) -> LibraryResult<()> {
        Status::check(unsafe { (self.destroy_rnn)(desc) })
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
        let query = match preference {
            AlgorithmPreference::Exhaustive => self.find_forward_algorithm,
            _ => self.forward_algorithm_v7,
        };
        select(preference, |requested, returned, perf| unsafe {
            query(handle, source, filter, conv, result, requested, returned, perf)
        })
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
        query_size(|out| unsafe { (self.forward_workspace_size)(handle, source, filter, conv, result, algorithm, out) })
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
        let query = match preference {
            AlgorithmPreference::Exhaustive => self.find_backward_data_algorithm,
            _ => self.backward_data_algorithm_v7,
        };
        select(preference, |requested, returned, perf| unsafe {
            query(handle, filter, output_deltas, conv, input_deltas, requested, returned, perf)
        })
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
        query_size(|out| unsafe {
            (self.backward_data_workspace_size)(handle, filter, output_deltas, conv, input_deltas, algorithm, out)
        })
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
        let query = match preference {
            AlgorithmPreference::Exhaustive => self.find_backward_filter_algorithm,
            _ => self.backward_filter_algorithm_v7,
        };
        select(preference, |requested, returned, perf| unsafe {
            query(handle, source, output_deltas, conv, filter_gradient, requested, returned, perf)
        })
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
        query_size(|out| unsafe {
            (self.backward_filter_workspace_size)(handle, source, output_deltas, conv, filter_gradient, algorithm, out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perf(algo: c_int, status: StatusT, memory: usize) -> AlgorithmPerf {
        AlgorithmPerf {
            algo,
            status,
            memory,
            ..AlgorithmPerf::EMPTY
        }
    }

    #[test]
    fn test_pick_respects_preference() {
        let results = [perf(6, 9, 0), perf(1, 0, 4096), perf(0, 0, 0)];

        assert_eq!(pick(&results, AlgorithmPreference::Fastest), Ok(1));
        assert_eq!(pick(&results, AlgorithmPreference::WorkspaceLimit(1024)), Ok(0));
        assert_eq!(pick(&results, AlgorithmPreference::NoWorkspace), Ok(0));
        assert_eq!(pick(&results[..2], AlgorithmPreference::NoWorkspace), Err(Status::NotSupported));
        assert_eq!(pick(&[], AlgorithmPreference::Fastest), Err(Status::NotSupported));
    }

    #[test]
    fn test_load_without_library() {
        // Either outcome is valid; a missing library must surface as an error, not a panic.
        if let Err(err) = CudnnLibrary::load() {
            assert!(matches!(err, DnnError::LibraryUnavailable(_)));
        }
    }
}
