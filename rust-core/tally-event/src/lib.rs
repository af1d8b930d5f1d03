// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally event model
//
// Everything a language binding hands to the native core passes through
// this crate: the recursive `Value` that carries property maps, the `Event`
// built for each SDK call, the encoder that turns an event into one
// newline-delimited JSON record, and the structural checks applied before a
// record is accepted.
//
// ## Usage
//
// ```
// use tally_event::{decode, encode, Event};
//
// let event = Event::track("user-42", "purchase", "rust_sdk")
//     .with_alias("account-7")
//     .with_property("price", 9.5)
//     .with_property("items", vec!["book", "pen"]);
//
// let record = encode(event);
// assert!(record.ends_with(b"\n"));
//
// let map = decode(&record).unwrap();
// assert_eq!(map["#dt_id"].as_str(), Some("user-42"));
// assert_eq!(map["#acid"].as_str(), Some("account-7"));
// ```

pub mod encoder;
pub mod error;
pub mod event;
pub mod validate;
pub mod value;

pub use encoder::{decode, decode_event, encode, encode_record, to_record, RECORD_DELIMITER};
pub use error::{EventError, EventResult};
pub use event::{
    Event, EventType, KEY_ACID, KEY_DT_ID, KEY_EVENT_NAME, KEY_EVENT_TYPE, KEY_SDK_TYPE,
    KEY_SDK_VERSION_NAME, RESERVED_KEYS,
};
pub use validate::validate_record;
pub use value::{Map, Number, Value};
