use thiserror::Error;

#[derive(Debug, Error)]
pub enum LossRateError {
    #[error("Configuration error: no annual incidence curve registered for term {term} (registered terms: {registered})")]
    UnregisteredTerm { term: u32, registered: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LossRateError {
    fn from(e: serde_json::Error) -> Self {
        LossRateError::SerializationError(e.to_string())
    }
}
