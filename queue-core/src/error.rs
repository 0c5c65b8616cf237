//! Stable error codes returned across the queue's programmatic boundary,
//! and the error type adapters report up from device I/O.

use thiserror::Error;

/// Canonical small-integer error set from the external interface.
///
/// Values are stable: callers may store/compare them, log them as
/// numbers, or match on the enum. `Display` (via `thiserror`) is the
/// `getErrorString` equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum ErrorCode {
    #[error("success")]
    Success = 0,
    #[error("communication with the device failed")]
    CommFailed,
    #[error("operation timed out")]
    Timeout,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("device is not connected")]
    NotConnected,
    #[error("priority queue is full")]
    QueueFull,
    #[error("operation failed")]
    OperationFailed,
    #[error("cancelled")]
    Cancelled,
    #[error("invalid state for this operation")]
    InvalidState,
    #[error("partial data recovered after failure")]
    PartialData,
    #[error("out of memory")]
    OutOfMemory,
    #[error("failed to create worker thread")]
    ThreadCreate,
}

/// What a [`crate::adapter::DeviceAdapter`] reports for a failed call.
///
/// This is the Rust realisation of the four adapter-reported failure
/// kinds in the spec's adapter contract (`CommFailed`, `Timeout`,
/// `OperationFailed`, `InvalidParameter`); `queue-core` maps each to the
/// matching [`ErrorCode`] before handing it back across the API.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("communication with device failed: {0}")]
    CommFailed(String),
    #[error("device operation timed out")]
    Timeout,
    #[error("device operation failed: {0}")]
    OperationFailed(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl AdapterError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AdapterError::CommFailed(_) => ErrorCode::CommFailed,
            AdapterError::Timeout => ErrorCode::Timeout,
            AdapterError::OperationFailed(_) => ErrorCode::OperationFailed,
            AdapterError::InvalidParameter(_) => ErrorCode::InvalidParameter,
        }
    }

    /// Whether this failure should trigger the worker's
    /// test-connection-then-maybe-disconnect check.
    pub fn is_transport_suspect(&self) -> bool {
        matches!(self, AdapterError::CommFailed(_) | AdapterError::Timeout)
    }
}

/// What [`crate::adapter::DeviceAdapter::execute`] returns.
pub type CommandOutcome<O> = Result<O, AdapterError>;
