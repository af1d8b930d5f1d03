// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Event - Record validation
//
// Structural checks on the reserved `#` keys of a record map before it is
// written. Event names, property keys and property values are free-form;
// their meaning belongs to the ingestion side.

use crate::error::{EventError, EventResult};
use crate::event::{EventType, KEY_ACID, KEY_DT_ID, KEY_EVENT_NAME, KEY_EVENT_TYPE, KEY_SDK_TYPE};
use crate::value::{Map, Value};

/// Check the reserved keys of a complete record map.
///
/// `#dt_id` must be a non-empty string, `#event_name` and `#sdk_type`
/// strings, `#event_type` one of `track` or `user`, and `#acid`, when
/// present, a string. Every other key passes through untouched.
pub fn validate_record(record: &Map) -> EventResult<()> {
    if require_str(record, KEY_DT_ID)?.is_empty() {
        return Err(EventError::Empty(KEY_DT_ID));
    }
    require_str(record, KEY_EVENT_NAME)?;
    require_str(record, KEY_EVENT_TYPE)?.parse::<EventType>()?;
    require_str(record, KEY_SDK_TYPE)?;

    match record.get(KEY_ACID) {
        Some(alias) if alias.as_str().is_none() => Err(wrong_type(KEY_ACID, "string", alias)),
        _ => Ok(()),
    }
}

fn require_str<'a>(record: &'a Map, key: &'static str) -> EventResult<&'a str> {
    match record.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(wrong_type(key, "string", other)),
        None => Err(EventError::MissingKey(key)),
    }
}

fn wrong_type(key: &str, expected: &'static str, actual: &Value) -> EventError {
    EventError::WrongType {
        key: key.to_string(),
        expected,
        actual: actual.kind(),
    }
}
