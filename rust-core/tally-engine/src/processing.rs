// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Engine - Record processing
//
// Everything that happens to a record between the binding and the consumer:
// merge the common properties, stamp the core version, validate, encode.
// None of it touches the consumer, so the engine runs it before taking its
// lock.

use tally_event::{
    encode_record, validate_record, Map, Value, KEY_SDK_VERSION_NAME, RESERVED_KEYS,
};
use tracing::debug;

use crate::error::EngineResult;

/// Version of this core, appended to the binding's version stamp.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Properties merged into every record, plus the encode pipeline.
#[derive(Debug, Clone, Default)]
pub struct RecordProcessor {
    common: Map,
}

impl RecordProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the common properties. Reserved keys are dropped: a record's
    /// identity always comes from the call itself.
    pub fn set_common_properties(&mut self, mut properties: Map) {
        properties.retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
        debug!(count = properties.len(), "Set common properties");
        self.common = properties;
    }

    pub fn clear_common_properties(&mut self) {
        self.common.clear();
    }

    pub fn common_properties(&self) -> &Map {
        &self.common
    }

    /// Merge, stamp, validate and encode one record.
    ///
    /// Keys already present in `record` win over common properties.
    pub fn process(&self, mut record: Map) -> EngineResult<Vec<u8>> {
        for (key, value) in &self.common {
            if !record.contains_key(key) {
                record.insert(key.clone(), value.clone());
            }
        }
        stamp_core_version(&mut record);
        validate_record(&record)?;
        Ok(encode_record(&record)?)
    }
}

/// Rewrite `#sdk_version_name` as `{binding_version}_{core_version}`.
fn stamp_core_version(record: &mut Map) {
    let binding = record
        .get(KEY_SDK_VERSION_NAME)
        .and_then(Value::as_str)
        .unwrap_or("");
    let stamped = format!("{binding}_{CORE_VERSION}");
    record.insert(KEY_SDK_VERSION_NAME.to_string(), Value::String(stamped));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_event::{decode, to_record, Event, EventError, KEY_DT_ID};

    use crate::error::EngineError;

    fn purchase() -> Map {
        to_record(Event::track("u-1", "purchase", "rust").with_property("price", 3))
    }

    #[test]
    fn test_common_properties_fill_gaps_only() {
        let mut processor = RecordProcessor::new();
        let mut common = Map::new();
        common.insert("app".into(), Value::from("demo"));
        common.insert("price".into(), Value::from(0));
        common.insert(KEY_DT_ID.into(), Value::from("hijack"));
        processor.set_common_properties(common);
        assert_eq!(processor.common_properties().len(), 2);

        let record = decode(&processor.process(purchase()).unwrap()).unwrap();
        assert_eq!(record["app"].as_str(), Some("demo"));
        assert_eq!(record["price"].as_i64(), Some(3));
        assert_eq!(record[KEY_DT_ID].as_str(), Some("u-1"));

        processor.clear_common_properties();
        let record = decode(&processor.process(purchase()).unwrap()).unwrap();
        assert!(record.get("app").is_none());
    }

    #[test]
    fn test_core_version_stamped() {
        let processor = RecordProcessor::new();

        let mut record = purchase();
        record.insert(KEY_SDK_VERSION_NAME.into(), Value::from("2.1.0"));
        let stamped = decode(&processor.process(record).unwrap()).unwrap();
        assert_eq!(
            stamped[KEY_SDK_VERSION_NAME].as_str(),
            Some(format!("2.1.0_{CORE_VERSION}").as_str())
        );

        let bare = decode(&processor.process(purchase()).unwrap()).unwrap();
        assert_eq!(
            bare[KEY_SDK_VERSION_NAME].as_str(),
            Some(format!("_{CORE_VERSION}").as_str())
        );
    }

    #[test]
    fn test_invalid_record_rejected() {
        let processor = RecordProcessor::new();
        let mut record = purchase();
        record.remove(KEY_DT_ID);
        assert!(matches!(
            processor.process(record),
            Err(EngineError::InvalidEvent(EventError::MissingKey(_)))
        ));
    }
}
