// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Engine - Init configuration
//
// Bindings send one JSON object to `init`: the consumer settings plus an
// injected `_debug` flag.

use serde_json::Value as JsonValue;
use tally_log::ConsumerConfig;

use crate::error::{EngineError, EngineResult};

/// Key under which bindings inject the diagnostic logging flag.
pub const DEBUG_KEY: &str = "_debug";

/// Parsed `init` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Diagnostic logging switch; `None` leaves the current setting alone.
    pub debug: Option<bool>,
    /// The consumer to construct.
    pub consumer: ConsumerConfig,
}

impl EngineConfig {
    pub fn new(consumer: ConsumerConfig) -> Self {
        Self {
            debug: None,
            consumer,
        }
    }

    /// Parse and validate the UTF-8 JSON object handed over by a binding.
    ///
    /// `_debug` may be a boolean or a number (non-zero enables logging);
    /// absent or null leaves logging as it is.
    pub fn from_bytes(bytes: &[u8]) -> EngineResult<Self> {
        let value: JsonValue = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::Config(format!("init payload is not valid JSON: {e}")))?;
        let JsonValue::Object(mut object) = value else {
            return Err(EngineError::Config(
                "init payload must be a JSON object".into(),
            ));
        };

        let debug = match object.remove(DEBUG_KEY) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Bool(flag)) => Some(flag),
            Some(JsonValue::Number(n)) => Some(n.as_f64().is_some_and(|f| f != 0.0)),
            Some(other) => {
                return Err(EngineError::Config(format!(
                    "`{DEBUG_KEY}` must be a boolean or a number, found {other}"
                )))
            }
        };

        let consumer: ConsumerConfig = serde_json::from_value(JsonValue::Object(object))
            .map_err(|e| EngineError::Config(e.to_string()))?;
        consumer.validate()?;

        Ok(Self { debug, consumer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_config() {
        let config = EngineConfig::from_bytes(
            br#"{"consumer":"log","path":"t","name_prefix":"p_","max_batch_len":2,"max_file_size_bytes":1000000}"#,
        )
        .unwrap();
        assert_eq!(config.debug, None);
        assert_eq!(config.consumer.kind(), "log");
    }

    #[test]
    fn test_debug_flag_forms() {
        for (raw, expected) in [("true", true), ("false", false), ("1", true), ("0", false)] {
            let payload = format!(r#"{{"consumer":"mlog","path":"t","_debug":{raw}}}"#);
            let config = EngineConfig::from_bytes(payload.as_bytes()).unwrap();
            assert_eq!(config.debug, Some(expected), "_debug = {raw}");
        }

        let null = EngineConfig::from_bytes(br#"{"consumer":"mlog","path":"t","_debug":null}"#);
        assert_eq!(null.unwrap().debug, None);

        let bad = EngineConfig::from_bytes(br#"{"consumer":"mlog","path":"t","_debug":"yes"}"#);
        assert!(matches!(bad, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_malformed_payloads_are_config_errors() {
        let payloads: [&[u8]; 6] = [
            b"not json",
            br#"["consumer","log"]"#,
            br#"{"path":"t"}"#,
            br#"{"consumer":"kafka","path":"t"}"#,
            br#"{"consumer":"log","path":"t","max_batch_len":0}"#,
            br#"{"consumer":"mlog","path":"t","file_size":0}"#,
        ];
        for payload in payloads {
            let result = EngineConfig::from_bytes(payload);
            assert!(
                matches!(result, Err(EngineError::Config(_))),
                "{}",
                String::from_utf8_lossy(payload)
            );
        }
    }
}
