//! # Fabric Errors
//!
//! Error taxonomy shared by the bus, the agent capability and the adapters.
//!
//! Only [`BusError::Registry`] is fatal to the bus. Every [`A2aError`] is
//! agent-local and is turned into a failed `Response` at the boundary where it
//! occurs.

use thiserror::Error;

/// Errors raised by the message bus itself
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Publish or subscribe attempted after `close()`
    #[error("message bus is closed")]
    Closed,

    /// The subscription registry lock was poisoned
    #[error("subscription registry corrupted: {0}")]
    Registry(String),
}

/// Agent-level errors, one variant per taxonomy entry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum A2aError {
    #[error("unsupported message type: {0}")]
    UnsupportedType(String),

    #[error("unsupported payload: {0}")]
    UnsupportedPayload(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("processing error: {0}")]
    ProcessingError(String),

    #[error("agent not ready: {0}")]
    NotReady(String),

    #[error("agent id already registered: {0}")]
    DuplicateAgent(String),

    #[error("timed out waiting for response to {request_id} after {timeout_ms}ms")]
    Timeout { request_id: String, timeout_ms: u64 },

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl A2aError {
    /// Stable snake_case code carried in `ErrorPayload.cause`
    pub fn code(&self) -> &'static str {
        match self {
            A2aError::UnsupportedType(_) => "unsupported_type",
            A2aError::UnsupportedPayload(_) => "unsupported_payload",
            A2aError::ValidationFailed(_) => "validation_failed",
            A2aError::GenerationFailed(_) => "generation_failed",
            A2aError::ProcessingError(_) => "processing_error",
            A2aError::NotReady(_) => "not_ready",
            A2aError::DuplicateAgent(_) => "duplicate_agent",
            A2aError::Timeout { .. } => "timeout",
            A2aError::Bus(BusError::Closed) => "bus_closed",
            A2aError::Bus(BusError::Registry(_)) => "bus_registry",
        }
    }
}

pub type A2aResult<T> = Result<T, A2aError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            A2aError::UnsupportedType("X".into()).code(),
            "unsupported_type"
        );
        assert_eq!(A2aError::NotReady("init".into()).code(), "not_ready");
        assert_eq!(
            A2aError::Timeout {
                request_id: "r1".into(),
                timeout_ms: 10
            }
            .code(),
            "timeout"
        );
    }

    #[test]
    fn test_bus_error_converts() {
        let err: A2aError = BusError::Closed.into();
        assert_eq!(err.code(), "bus_closed");
        assert_eq!(err.to_string(), "message bus is closed");
    }
}
