// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Describe job already in progress for {connection_id}/{resource_type}")]
    JobInProgress {
        connection_id: String,
        resource_type: String,
    },

    #[error("Unknown value '{value}' for {kind}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}
