// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Event - Error types
//
// Failures raised while decoding a raw record or checking it against the
// record rules. Encoding a well-formed `Event` never fails.

use thiserror::Error;

/// Errors produced by decoding and validation.
#[derive(Debug, Error)]
pub enum EventError {
    /// The record bytes are not valid JSON.
    #[error("malformed record JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The record decoded to something other than a JSON object.
    #[error("record must be a JSON object, got {0}")]
    NotAMap(&'static str),

    /// A required reserved key is absent.
    #[error("reserved key \"{0}\" is required but missing")]
    MissingKey(&'static str),

    /// A key holds a value of the wrong type.
    #[error("key \"{key}\" must be {expected}, got {actual}")]
    WrongType {
        /// The offending key.
        key: String,
        /// Human-readable expected type.
        expected: &'static str,
        /// The variant that was found.
        actual: &'static str,
    },

    /// A required string is empty.
    #[error("key \"{0}\" must not be empty")]
    Empty(&'static str),

    /// `#event_type` is neither `track` nor `user`.
    #[error("unknown event type \"{0}\"")]
    UnknownEventType(String),
}

/// Convenience type alias for event results.
pub type EventResult<T> = Result<T, EventError>;
