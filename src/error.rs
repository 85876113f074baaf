use thiserror::Error;

use crate::dnn::ffi::Status;
use crate::tensor::Precision;

/// Main error type for the descriptor layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DnnError {
    /// Shape, precision or parameter combination rejected before reaching the library
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A native library call returned a failure status
    #[error("Library call {call} failed: {status}")]
    Library {
        call: &'static str,
        status: Status,
    },

    /// Device memory could not be provided
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Shape-related errors with detailed suggestions
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Scaling parameters and descriptors only exist for some precisions
    #[error("Unsupported precision: {0}")]
    UnsupportedPrecision(Precision),

    /// Misuse the type system could not rule out
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The native library or runtime could not be loaded
    #[error("Library unavailable: {0}")]
    LibraryUnavailable(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DnnError {
    /// Create a shape error with helpful suggestions
    pub fn shape_error(expected: &str, got: &str, suggestion: Option<&str>) -> Self {
        let message = if let Some(sugg) = suggestion {
            format!("Expected {}, got {}. Suggestion: {}", expected, got, sugg)
        } else {
            format!("Expected {}, got {}", expected, got)
        };
        DnnError::ShapeError(message)
    }

    /// Create a resource error with usage information
    pub fn memory_error(required: usize, available: usize, context: &str) -> Self {
        DnnError::ResourceExhausted(format!(
            "Insufficient memory: required {} bytes, available {} bytes. Context: {}",
            required, available, context
        ))
    }

    pub fn library(call: &'static str, status: Status) -> Self {
        DnnError::Library { call, status }
    }
}

impl From<std::io::Error> for DnnError {
    fn from(err: std::io::Error) -> Self {
        DnnError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DnnError {
    fn from(err: serde_json::Error) -> Self {
        DnnError::Serialization(err.to_string())
    }
}

/// Result type for descriptor operations
pub type DnnResult<T> = Result<T, DnnError>;

/// Map a library status onto the crate error, tagging it with the call name.
pub(crate) fn check<T>(result: Result<T, Status>, call: &'static str) -> DnnResult<T> {
    result.map_err(|status| DnnError::library(call, status))
}

/// Error context for providing additional debugging information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub tensor_shapes: Vec<String>,
    pub device_info: String,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            tensor_shapes: Vec::new(),
            device_info: String::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_shape(mut self, shape: &str) -> Self {
        self.tensor_shapes.push(shape.to_string());
        self
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device_info = device.to_string();
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    pub fn to_error_message(&self) -> String {
        let mut message = format!("Operation: {}", self.operation);

        if !self.tensor_shapes.is_empty() {
            message.push_str(&format!("\nTensor shapes: {}", self.tensor_shapes.join(", ")));
        }

        if !self.device_info.is_empty() {
            message.push_str(&format!("\nDevice: {}", self.device_info));
        }

        if !self.suggestions.is_empty() {
            message.push_str("\nSuggestions:");
            for suggestion in &self.suggestions {
                message.push_str(&format!("\n  - {}", suggestion));
            }
        }

        message
    }
}

/// Helper trait for adding context to errors
pub trait WithContext<T> {
    fn with_context<F>(self, f: F) -> DnnResult<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> WithContext<T> for DnnResult<T> {
    fn with_context<F>(self, f: F) -> DnnResult<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|e| {
            let context = f();
            match e {
                DnnError::Configuration(msg) => {
                    DnnError::Configuration(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                DnnError::ShapeError(msg) => {
                    DnnError::ShapeError(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                DnnError::ResourceExhausted(msg) => {
                    DnnError::ResourceExhausted(format!("{}\nContext: {}", msg, context.to_error_message()))
                }
                // Library errors keep their status so callers can still match on it.
                _ => e,
            }
        })
    }
}

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalid,
    OutOfMemory,
    ShapeMismatch,
    UnsupportedPrecision,
    InvariantViolated,
    LibraryMissing,
    IoFailed,
    SerializationFailed,
}

impl DnnError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            DnnError::Configuration(_) => ErrorCode::ConfigInvalid,
            DnnError::Library { status, .. } if status.is_allocation_failure() => ErrorCode::OutOfMemory,
            DnnError::Library { .. } => ErrorCode::ConfigInvalid,
            DnnError::ResourceExhausted(_) => ErrorCode::OutOfMemory,
            DnnError::ShapeError(_) => ErrorCode::ShapeMismatch,
            DnnError::UnsupportedPrecision(_) => ErrorCode::UnsupportedPrecision,
            DnnError::InvariantViolation(_) => ErrorCode::InvariantViolated,
            DnnError::LibraryUnavailable(_) => ErrorCode::LibraryMissing,
            DnnError::Io(_) => ErrorCode::IoFailed,
            DnnError::Serialization(_) => ErrorCode::SerializationFailed,
        }
    }

    /// Exhaustion can be worked around by the caller with another algorithm policy.
    /// Configuration errors are hard failures of the construction.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.code(), ErrorCode::OutOfMemory)
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            DnnError::Configuration(msg) => {
                format!("Configuration Error: {}\n\nThe library rejected this shape, precision or parameter combination. Check descriptor dimensions and that input, filter and output agree.", msg)
            }
            DnnError::Library { call, status } if status.is_allocation_failure() => {
                format!("Resource Error: {} reported {}\n\nThe device ran out of memory. Try a workspace-limited or no-workspace algorithm preference.", call, status)
            }
            DnnError::Library { call, status } => {
                format!("Library Error: {} reported {}\n\nThe library rejected the request. Check descriptor dimensions and precisions.", call, status)
            }
            DnnError::ResourceExhausted(msg) => {
                format!("Resource Error: {}\n\nThe device ran out of memory. Try a workspace-limited or no-workspace algorithm preference.", msg)
            }
            DnnError::UnsupportedPrecision(p) => {
                format!("Unsupported Precision: {}\n\nOnly half, single and double precision are valid here.", p)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error() {
        let error = DnnError::shape_error("rank <= 8", "rank 9", Some("Merge trailing dimensions"));
        assert!(error.to_string().contains("Expected rank <= 8, got rank 9"));
        assert!(error.to_string().contains("Merge trailing dimensions"));
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("forward workspace")
            .with_shape("[8, 3, 32, 32]")
            .with_shape("[16, 3, 3, 3]")
            .with_device("cuda:0")
            .with_suggestion("Check the output tensor shape");

        let message = context.to_error_message();
        assert!(message.contains("Operation: forward workspace"));
        assert!(message.contains("Tensor shapes: [8, 3, 32, 32], [16, 3, 3, 3]"));
        assert!(message.contains("Device: cuda:0"));
        assert!(message.contains("Check the output tensor shape"));
    }

    #[test]
    fn test_with_context_keeps_library_status() {
        let result: DnnResult<()> = Err(DnnError::library("cudnnSetTensorNdDescriptor", Status::BadParam));
        let err = result
            .with_context(|| ErrorContext::new("tensor descriptor"))
            .unwrap_err();
        assert_eq!(err, DnnError::library("cudnnSetTensorNdDescriptor", Status::BadParam));
    }

    #[test]
    fn test_error_codes() {
        let config = DnnError::library("cudnnGetConvolutionForwardAlgorithm_v7", Status::BadParam);
        assert_eq!(config.code(), ErrorCode::ConfigInvalid);
        assert!(!config.is_recoverable());

        let alloc = DnnError::library("cudnnCreateTensorDescriptor", Status::AllocFailed);
        assert_eq!(alloc.code(), ErrorCode::OutOfMemory);
        assert!(alloc.is_recoverable());

        let exhausted = DnnError::memory_error(1024, 512, "workspace");
        assert_eq!(exhausted.code(), ErrorCode::OutOfMemory);
        assert!(exhausted.is_recoverable());
    }

    #[test]
    fn test_user_message() {
        let error = DnnError::UnsupportedPrecision(Precision::Int8);
        let message = error.user_message();
        assert!(message.contains("Unsupported Precision"));
        assert!(message.contains("int8"));
    }
}
