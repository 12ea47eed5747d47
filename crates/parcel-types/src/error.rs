//! Error types for parcel-check

use thiserror::Error;

use crate::EventType;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Condition store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A {event} record already exists for order {order_id}")]
    Duplicate { order_id: String, event: EventType },

    #[error("Condition record not found: {0}")]
    NotFound(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Store IO error: {0}")]
    IoError(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Vision backend unavailable: {0}")]
    VisionUnavailable(String),

    #[error("Order {order_id} has no arrival record; complete arrival first")]
    PreconditionViolation { order_id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Step not allowed: {0}")]
    InvalidStep(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
