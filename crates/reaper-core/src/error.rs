//! Error types for the Reaper sweep

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReaperError>;

#[derive(Error, Debug)]
pub enum ReaperError {
    #[error("Machine not found: {machine_id}")]
    MachineNotFound { machine_id: String },

    #[error("Invalid created timestamp {value:?} for machine {machine_id}: {source}")]
    InvalidTimestamp {
        machine_id: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Transport failed: {reason}")]
    Transport { reason: String },

    #[error("Request signing failed: {reason}")]
    Signing { reason: String },

    #[error("CloudAPI returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Notification failed: {reason}")]
    Notification { reason: String },

    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}
