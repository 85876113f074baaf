//! Raw handle types and enumerations shared with the native library.
//!
//! Numeric values match the cuDNN 8 headers so the same tags can be handed to
//! the real library or to the mock unchanged.

use std::ffi::{c_int, c_void};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DnnError;

// ---------------------------------------------------------------------------
// Opaque handles
// ---------------------------------------------------------------------------

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(
    ContextStruct,
    TensorStruct,
    FilterStruct,
    ConvolutionStruct,
    PoolingStruct,
    DropoutStruct,
    RnnStruct,
);

pub type RawHandle = *mut ContextStruct;
pub type RawTensorDescriptor = *mut TensorStruct;
pub type RawFilterDescriptor = *mut FilterStruct;
pub type RawConvolutionDescriptor = *mut ConvolutionStruct;
pub type RawPoolingDescriptor = *mut PoolingStruct;
pub type RawDropoutDescriptor = *mut DropoutStruct;
pub type RawRnnDescriptor = *mut RnnStruct;
pub type RawStream = *mut c_void;

/// Largest tensor rank the library accepts.
pub const DIM_MAX: usize = 8;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NotInitialized,
    AllocFailed,
    BadParam,
    InternalError,
    InvalidValue,
    ArchMismatch,
    MappingError,
    ExecutionFailed,
    NotSupported,
    LicenseError,
    Other(i32),
}

impl Status {
    pub const SUCCESS: c_int = 0;

    /// Convert a raw return code; `Ok` for success.
    pub fn check(code: c_int) -> Result<(), Status> {
        if code == Self::SUCCESS {
            Ok(())
        } else {
            Err(Self::from_code(code))
        }
    }

    pub fn from_code(code: c_int) -> Self {
        match code {
            1 => Status::NotInitialized,
            2 => Status::AllocFailed,
            3 => Status::BadParam,
            4 => Status::InternalError,
            5 => Status::InvalidValue,
            6 => Status::ArchMismatch,
            7 => Status::MappingError,
            8 => Status::ExecutionFailed,
            9 => Status::NotSupported,
            10 => Status::LicenseError,
            other => Status::Other(other),
        }
    }

    pub fn code(&self) -> c_int {
        match self {
            Status::NotInitialized => 1,
            Status::AllocFailed => 2,
            Status::BadParam => 3,
            Status::InternalError => 4,
            Status::InvalidValue => 5,
            Status::ArchMismatch => 6,
            Status::MappingError => 7,
            Status::ExecutionFailed => 8,
            Status::NotSupported => 9,
            Status::LicenseError => 10,
            Status::Other(code) => *code,
        }
    }

    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, Status::AllocFailed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::NotInitialized => "NOT_INITIALIZED",
            Status::AllocFailed => "ALLOC_FAILED",
            Status::BadParam => "BAD_PARAM",
            Status::InternalError => "INTERNAL_ERROR",
            Status::InvalidValue => "INVALID_VALUE",
            Status::ArchMismatch => "ARCH_MISMATCH",
            Status::MappingError => "MAPPING_ERROR",
            Status::ExecutionFailed => "EXECUTION_FAILED",
            Status::NotSupported => "NOT_SUPPORTED",
            Status::LicenseError => "LICENSE_ERROR",
            Status::Other(_) => "UNKNOWN",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Implements `TryFrom<i32>` for a field-less enum with explicit discriminants.
macro_rules! native_enum {
    ($name:ident { $($variant:ident = $value:literal),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value),*
        }

        impl $name {
            pub fn as_raw(self) -> c_int {
                self as c_int
            }
        }

        impl TryFrom<i32> for $name {
            type Error = DnnError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)*
                    other => Err(DnnError::Configuration(format!(
                        "{} is not a valid {}",
                        other,
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

native_enum!(DataType {
    Float = 0,
    Double = 1,
    Half = 2,
    Int8 = 3,
    Int32 = 4,
});

native_enum!(TensorFormat {
    Nchw = 0,
    Nhwc = 1,
});

native_enum!(ConvolutionMode {
    Convolution = 0,
    CrossCorrelation = 1,
});

native_enum!(PoolingMode {
    Max = 0,
    AverageCountIncludePadding = 1,
    AverageCountExcludePadding = 2,
    MaxDeterministic = 3,
});

native_enum!(NanPropagation {
    NotPropagate = 0,
    Propagate = 1,
});

native_enum!(RnnInputMode {
    Linear = 0,
    Skip = 1,
});

native_enum!(RnnDirection {
    Unidirectional = 0,
    Bidirectional = 1,
});

native_enum!(RnnMode {
    Relu = 0,
    Tanh = 1,
    Lstm = 2,
    Gru = 3,
});

native_enum!(RnnAlgorithm {
    Standard = 0,
    PersistStatic = 1,
    PersistDynamic = 2,
});

/// How the library should pick a convolution algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmPreference {
    /// Heuristically fastest, regardless of workspace.
    Fastest,
    /// Heuristically fastest among those needing at most this many bytes.
    WorkspaceLimit(usize),
    /// Only algorithms that need no workspace.
    NoWorkspace,
    /// Benchmark every algorithm on the device and take the fastest.
    Exhaustive,
}

impl Default for AlgorithmPreference {
    fn default() -> Self {
        AlgorithmPreference::Fastest
    }
}
