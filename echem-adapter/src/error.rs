use thiserror::Error;

use queue_core::AdapterError;

#[derive(Debug, Error)]
pub enum EchemError {
    #[error("analyzer is not connected")]
    NotConnected,
    #[error("simulated cell fault: {0}")]
    SimulatedFault(String),
}

impl From<EchemError> for AdapterError {
    fn from(err: EchemError) -> Self {
        match err {
            EchemError::NotConnected => AdapterError::CommFailed(err.to_string()),
            EchemError::SimulatedFault(_) => AdapterError::OperationFailed(err.to_string()),
        }
    }
}
