use thiserror::Error;

use queue_core::AdapterError;

#[derive(Debug, Error)]
pub enum PsuError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("CRC mismatch in response frame")]
    Crc,
    #[error("device returned exception code {0:#04x}")]
    Exception(u8),
    #[error("response frame shorter than expected")]
    ShortFrame,
    #[error("response function code {got:#04x} did not match request {expected:#04x}")]
    UnexpectedFunction { expected: u8, got: u8 },
    #[error("response came from slave {got}, expected {expected}")]
    UnexpectedSlave { expected: u8, got: u8 },
}

impl From<PsuError> for AdapterError {
    fn from(err: PsuError) -> Self {
        match err {
            PsuError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => AdapterError::Timeout,
            PsuError::Io(e) => AdapterError::CommFailed(e.to_string()),
            PsuError::Port(e) => AdapterError::CommFailed(e.to_string()),
            PsuError::Crc | PsuError::ShortFrame => AdapterError::CommFailed(err.to_string()),
            PsuError::UnexpectedFunction { .. } | PsuError::UnexpectedSlave { .. } => {
                AdapterError::OperationFailed(err.to_string())
            }
            PsuError::Exception(_) => AdapterError::OperationFailed(err.to_string()),
        }
    }
}
