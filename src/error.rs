//! Error types for request ID handling.

use std::sync::Arc;

use tonic::Status;

/// Boxed error returned by fallible generators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring or applying the request ID middleware.
#[derive(Debug, thiserror::Error)]
pub enum RequestIdError {
    /// The configured name cannot be used as a gRPC metadata key.
    #[error("invalid request id name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The generator produced an empty identifier.
    #[error("request id generator returned an empty identifier")]
    EmptyIdentifier,

    /// The identifier cannot be stored in the metadata container.
    #[error("request id '{value}' is not a valid value for metadata key '{key}'")]
    InvalidMetadataValue { key: String, value: String },

    /// The generator itself failed.
    #[error("request id generator failed: {0}")]
    Generator(#[source] BoxError),
}

impl RequestIdError {
    /// Returns true if the error stems from configuration rather than a call.
    pub fn is_config_error(&self) -> bool {
        matches!(self, RequestIdError::InvalidName { .. })
    }
}

impl From<RequestIdError> for Status {
    fn from(err: RequestIdError) -> Self {
        let mut status = if err.is_config_error() {
            Status::invalid_argument(err.to_string())
        } else {
            Status::internal(err.to_string())
        };
        status.set_source(Arc::new(err));
        status
    }
}
