use thiserror::Error;

use crate::processor::UnknownParamKey;

/// Startup failures; the service must not start serving after any of these
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("handler dependencies are not valid: storage is missing")]
    MissingStorage,
    #[error("handler dependencies are not valid: manipulator is missing")]
    MissingManipulator,
    #[error("invalid processor configuration: {0}")]
    InvalidProcessor(#[from] UnknownParamKey),
}
