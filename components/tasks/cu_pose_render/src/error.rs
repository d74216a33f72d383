use cu29::prelude::CuError;
use cu_pose_payloads::PayloadError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Device failure while {context}: {cause}")]
    Device { context: String, cause: String },

    #[error("Keypoint upload of {requested} floats exceeds the device capacity of {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("Element {index} is out of range, the model has {total} elements")]
    ElementOutOfRange { index: u32, total: u32 },

    #[error("Renderer used before initialize_on_thread")]
    NotInitialized,
}

impl RenderError {
    pub fn device(context: impl Into<String>, cause: impl ToString) -> Self {
        RenderError::Device {
            context: context.into(),
            cause: cause.to_string(),
        }
    }
}

impl From<PayloadError> for RenderError {
    fn from(err: PayloadError) -> Self {
        RenderError::InvalidInput(err.to_string())
    }
}

impl From<ron::error::SpannedError> for RenderError {
    fn from(err: ron::error::SpannedError) -> Self {
        RenderError::InvalidConfiguration(err.to_string())
    }
}

impl From<RenderError> for CuError {
    fn from(err: RenderError) -> Self {
        CuError::new_with_cause("Pose rendering failed", err)
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
