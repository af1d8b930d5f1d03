// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for init payload parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use tally_engine::EngineConfig;

fuzz_target!(|data: &[u8]| {
    // Parsing must fail with a config error, never panic, and never touch
    // the filesystem.
    if let Ok(config) = EngineConfig::from_bytes(data) {
        assert!(config.consumer.validate().is_ok());
    }
});
