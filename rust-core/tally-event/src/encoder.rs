// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Event - Record encoder
//
// Turns an `Event` into one newline-terminated JSON object. The caller's
// properties form the body of the record; the reserved keys are written
// over them.
//
// Record layout (one line per event):
//
// ```text
// {"#dt_id":"u-1","#event_name":"purchase","#event_type":"track","#sdk_type":"py","price":9.5}\n
// ```

use tracing::error;

use crate::error::{EventError, EventResult};
use crate::event::{
    Event, EventType, KEY_ACID, KEY_DT_ID, KEY_EVENT_NAME, KEY_EVENT_TYPE, KEY_SDK_TYPE,
};
use crate::value::{Map, Value};

/// Record terminator.
pub const RECORD_DELIMITER: u8 = b'\n';

/// Build the record map for an event: its properties with the reserved keys
/// stamped on top.
pub fn to_record(event: Event) -> Map {
    let Event {
        subject_id,
        alias_id,
        event_name,
        event_type,
        mut properties,
        sdk_tag,
    } = event;

    properties.insert(KEY_DT_ID.to_string(), Value::String(subject_id));
    match alias_id {
        Some(alias) => {
            properties.insert(KEY_ACID.to_string(), Value::String(alias));
        }
        None => {
            // `#acid` is present iff an alias was supplied.
            properties.remove(KEY_ACID);
        }
    }
    properties.insert(KEY_EVENT_NAME.to_string(), Value::String(event_name));
    properties.insert(
        KEY_EVENT_TYPE.to_string(),
        Value::String(event_type.as_str().to_string()),
    );
    properties.insert(KEY_SDK_TYPE.to_string(), Value::String(sdk_tag));
    properties
}

/// Encode an event as a single newline-terminated JSON record.
///
/// Serialization of a string-keyed map into memory does not fail; should it
/// ever, the error is logged and an empty buffer returned.
pub fn encode(event: Event) -> Vec<u8> {
    encode_record(&to_record(event)).unwrap_or_else(|e| {
        error!(error = %e, "Record serialization failed");
        Vec::new()
    })
}

/// Serialize an already assembled record map.
pub fn encode_record(record: &Map) -> EventResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    serde_json::to_writer(&mut buf, record)?;
    buf.push(RECORD_DELIMITER);
    Ok(buf)
}

/// Parse one record (with or without its trailing newline) into a map.
pub fn decode(bytes: &[u8]) -> EventResult<Map> {
    let trimmed = bytes.strip_suffix(&[RECORD_DELIMITER]).unwrap_or(bytes);
    let value: Value = serde_json::from_slice(trimmed)?;
    let kind = value.kind();
    value.into_map().ok_or(EventError::NotAMap(kind))
}

/// Parse a record back into an `Event`, lifting the reserved keys out of
/// the property map.
pub fn decode_event(bytes: &[u8]) -> EventResult<Event> {
    let mut map = decode(bytes)?;

    let subject_id = take_string(&mut map, KEY_DT_ID)?;
    let event_name = take_string(&mut map, KEY_EVENT_NAME)?;
    let event_type: EventType = take_string(&mut map, KEY_EVENT_TYPE)?.parse()?;
    let sdk_tag = take_string(&mut map, KEY_SDK_TYPE)?;
    let alias_id = match map.remove(KEY_ACID) {
        None => None,
        Some(Value::String(alias)) => Some(alias),
        Some(other) => {
            return Err(EventError::WrongType {
                key: KEY_ACID.to_string(),
                expected: "string",
                actual: other.kind(),
            })
        }
    };

    Ok(Event {
        subject_id,
        alias_id,
        event_name,
        event_type,
        properties: map,
        sdk_tag,
    })
}

fn take_string(map: &mut Map, key: &'static str) -> EventResult<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(EventError::WrongType {
            key: key.to_string(),
            expected: "string",
            actual: other.kind(),
        }),
        None => Err(EventError::MissingKey(key)),
    }
}
