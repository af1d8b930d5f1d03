// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Engine - Error types
//
// The engine reports every failure as a value. Bindings decide whether to
// log and swallow it; nothing here aborts the host process.

use tally_event::EventError;
use tally_log::LogError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The init payload is malformed or names an unknown consumer.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The consumer failed to persist, flush, or rotate.
    #[error("write failed: {0}")]
    Write(LogError),

    /// The engine (or its consumer) has been closed.
    #[error("consumer is closed")]
    ClosedConsumer,

    /// No `init` has succeeded yet.
    #[error("engine is not initialized")]
    NotInitialized,

    /// The record failed structural validation and was not written.
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventError),
}

impl From<LogError> for EngineError {
    fn from(error: LogError) -> Self {
        match error {
            LogError::Closed => Self::ClosedConsumer,
            LogError::Config(message) => Self::Config(message),
            other => Self::Write(other),
        }
    }
}

/// Convenience type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_errors_map_to_taxonomy() {
        assert!(matches!(
            EngineError::from(LogError::Closed),
            EngineError::ClosedConsumer
        ));
        assert!(matches!(
            EngineError::from(LogError::Config("bad".into())),
            EngineError::Config(_)
        ));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        match EngineError::from(LogError::Io(io)) {
            EngineError::Write(inner) => assert!(inner.to_string().contains("disk full")),
            other => panic!("expected write error, got {other:?}"),
        }
    }

    #[test]
    fn test_event_errors_are_invalid_events() {
        let error: EngineError = EventError::MissingKey("#dt_id").into();
        assert!(matches!(error, EngineError::InvalidEvent(_)));
        assert!(error.to_string().starts_with("invalid event:"));
    }
}
