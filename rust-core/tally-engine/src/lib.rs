// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Engine
//
// The process-wide registry every language binding talks to. It parses the
// init payload, owns the active consumer, validates and encodes records,
// and serializes all access to the consumer behind one mutex so any number
// of application threads may add events concurrently.
//
// ## Usage
//
// ```no_run
// use tally_engine::Engine;
// use tally_event::Event;
//
// let engine = Engine::new();
// engine
//     .init_from_bytes(br#"{"consumer":"log","path":"/tmp/tally","max_batch_len":2}"#)
//     .unwrap();
//
// engine.add(Event::track("user-42", "launch", "rust_sdk")).unwrap();
// engine.add_event(br##"{"#dt_id":"user-42","#event_name":"quit","#event_type":"track","#sdk_type":"rust_sdk"}"##).unwrap();
//
// engine.flush().unwrap();
// engine.close().unwrap();
// ```

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod processing;

pub use config::{EngineConfig, DEBUG_KEY};
pub use engine::{add_event, close, flush, global, init, toggle_logger, Engine};
pub use error::{EngineError, EngineResult};
pub use processing::{RecordProcessor, CORE_VERSION};
