// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Event - Event type
//
// One SDK call (`track`, `user_set`, ...) becomes one `Event`. It is built
// by the caller, handed to the encoder by value and never looked at again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::value::{Map, Value};

/// Reserved key holding the subject id.
pub const KEY_DT_ID: &str = "#dt_id";
/// Reserved key holding the alias id (present only when one was given).
pub const KEY_ACID: &str = "#acid";
/// Reserved key holding the event name.
pub const KEY_EVENT_NAME: &str = "#event_name";
/// Reserved key holding the event type (`track` / `user`).
pub const KEY_EVENT_TYPE: &str = "#event_type";
/// Reserved key holding the SDK tag of the calling binding.
pub const KEY_SDK_TYPE: &str = "#sdk_type";
/// Version of the calling binding; the engine appends the core version.
pub const KEY_SDK_VERSION_NAME: &str = "#sdk_version_name";

/// Every key the encoder stamps onto a record.
pub const RESERVED_KEYS: [&str; 5] = [
    KEY_DT_ID,
    KEY_ACID,
    KEY_EVENT_NAME,
    KEY_EVENT_TYPE,
    KEY_SDK_TYPE,
];

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Whether the event describes an action or a change to the subject's
/// profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Track,
    User,
}

impl EventType {
    /// Wire form of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::User => "user",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(Self::Track),
            "user" => Ok(Self::User),
            other => Err(EventError::UnknownEventType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single telemetry event prior to encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Primary identifier of the subject the event is attributed to.
    pub subject_id: String,

    /// Optional secondary identifier, merged server-side.
    pub alias_id: Option<String>,

    /// Event name, e.g. `purchase` or `#user_set`.
    pub event_name: String,

    /// Track or user event.
    pub event_type: EventType,

    /// Caller-supplied properties. Entries under reserved keys are
    /// overwritten during encoding.
    pub properties: Map,

    /// Identifies the binding that produced the event (`#sdk_type`).
    pub sdk_tag: String,
}

impl Event {
    /// Create an event with an empty property map.
    pub fn new(
        subject_id: impl Into<String>,
        event_name: impl Into<String>,
        event_type: EventType,
        sdk_tag: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            alias_id: None,
            event_name: event_name.into(),
            event_type,
            properties: Map::new(),
            sdk_tag: sdk_tag.into(),
        }
    }

    /// Shorthand for a `track` event.
    pub fn track(
        subject_id: impl Into<String>,
        event_name: impl Into<String>,
        sdk_tag: impl Into<String>,
    ) -> Self {
        Self::new(subject_id, event_name, EventType::Track, sdk_tag)
    }

    /// Shorthand for a `user` event such as `#user_set`.
    pub fn user(
        subject_id: impl Into<String>,
        operation: impl Into<String>,
        sdk_tag: impl Into<String>,
    ) -> Self {
        Self::new(subject_id, operation, EventType::User, sdk_tag)
    }

    pub fn with_alias(mut self, alias_id: impl Into<String>) -> Self {
        self.alias_id = Some(alias_id.into());
        self
    }

    pub fn with_properties(mut self, properties: Map) -> Self {
        self.properties = properties;
        self
    }

    /// Add or replace a single property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
