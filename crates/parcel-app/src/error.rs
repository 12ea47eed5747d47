//! Errors surfaced by capture sessions and the event flow

use parcel_types::{Error, StoreError};
use thiserror::Error;

/// Errors specific to the capture and condition flow
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Order {order_id} has no arrival record; complete arrival first")]
    MissingArrival { order_id: String },

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Vision error: {0}")]
    Vision(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Whether the same step may be attempted again as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Upload(_) | FlowError::Camera(_) | FlowError::Store(_))
    }
}

impl From<Error> for FlowError {
    fn from(err: Error) -> Self {
        match err {
            Error::CameraUnavailable(msg) => FlowError::Camera(msg),
            Error::PreconditionViolation { order_id } => FlowError::MissingArrival { order_id },
            Error::Upload(msg) => FlowError::Upload(msg),
            Error::Validation(msg)
            | Error::InvalidImage(msg)
            | Error::InvalidStep(msg) => FlowError::Invalid(msg),
            Error::Store(StoreError::Duplicate { .. }) => FlowError::Invalid(err.to_string()),
            Error::Store(e) => FlowError::Store(e.to_string()),
            Error::Cancelled => FlowError::Cancelled,
            Error::VisionUnavailable(msg) => FlowError::Vision(msg),
            Error::Image(e) => FlowError::Vision(e.to_string()),
            Error::Config(e) => FlowError::Config(e.to_string()),
            Error::Io(e) => FlowError::Store(e.to_string()),
            Error::Json(e) => FlowError::Store(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_types::{ConfigError, EventType};

    #[test]
    fn test_precondition_maps_to_missing_arrival() {
        let err: FlowError = Error::PreconditionViolation {
            order_id: "ORD-9".to_string(),
        }
        .into();
        assert!(matches!(err, FlowError::MissingArrival { ref order_id } if order_id == "ORD-9"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_upload_is_retryable() {
        let err: FlowError = Error::Upload("connection reset".to_string()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_duplicate_record_is_not_retryable() {
        let err: FlowError = Error::Store(StoreError::Duplicate {
            order_id: "ORD-1".to_string(),
            event: EventType::Arrival,
        })
        .into();
        assert!(matches!(err, FlowError::Invalid(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_bad_input_maps_to_invalid() {
        for err in [
            Error::Validation("weight".to_string()),
            Error::InvalidImage("truncated".to_string()),
            Error::InvalidStep("submit".to_string()),
        ] {
            let err: FlowError = err.into();
            assert!(matches!(err, FlowError::Invalid(_)));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_config_errors_keep_message() {
        let err: FlowError = Error::Config(ConfigError::InvalidValue("marker".to_string())).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration value: marker"
        );
    }
}
