// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally FFI - C ABI entry points
//
// Every language binding loads this library and calls the five functions
// below with NUL-terminated UTF-8 JSON. Status-returning calls answer `1`
// on success and `0` on any failure; the reason is logged, never raised.
// Panics are caught at the boundary so a bug in the core cannot unwind into
// a foreign stack.
//
// ```c
// #include "tally.h"
//
// if (!tally_init("{\"consumer\":\"log\",\"path\":\"/tmp/tally\",\"_debug\":1}")) {
//     /* telemetry disabled */
// }
// tally_add_event("{\"#dt_id\":\"u-1\",\"#event_name\":\"launch\","
//                 "\"#event_type\":\"track\",\"#sdk_type\":\"c\"}");
// tally_flush();
// tally_close();
// ```

use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};

use tally_engine::{diagnostics, global, EngineConfig, EngineError, EngineResult};
use tracing::error;

const SUCCESS: i8 = 1;
const FAILURE: i8 = 0;

/// Run `f`, turning errors and panics into a status code.
fn guarded(operation: &'static str, f: impl FnOnce() -> EngineResult<()>) -> i8 {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => SUCCESS,
        Ok(Err(e)) => {
            error!(operation, error = %e, "Tally call failed");
            FAILURE
        }
        Err(_) => {
            error!(operation, "Tally call panicked");
            FAILURE
        }
    }
}

/// Borrow the bytes of a C string, rejecting null and non-UTF-8 input.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn payload<'a>(ptr: *const c_char, what: &str) -> EngineResult<&'a [u8]> {
    if ptr.is_null() {
        return Err(EngineError::Config(format!("{what} pointer is null")));
    }
    // SAFETY: non-null and NUL-terminated per this function's contract.
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    std::str::from_utf8(bytes)
        .map_err(|e| EngineError::Config(format!("{what} is not valid UTF-8: {e}")))?;
    Ok(bytes)
}

/// Initialize (or re-initialize) the process-wide engine from a JSON
/// config object. A truthy `_debug` also installs a log subscriber if the
/// host has none.
///
/// # Safety
///
/// `config` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tally_init(config: *const c_char) -> i8 {
    guarded("init", || {
        // SAFETY: forwarded from the caller's contract.
        let bytes = unsafe { payload(config, "config") }?;
        let config = EngineConfig::from_bytes(bytes)?;
        if config.debug == Some(true) {
            diagnostics::install_subscriber(true);
        }
        global().init(config)
    })
}

/// Hand one fully-formed JSON event record to the engine.
///
/// # Safety
///
/// `record` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn tally_add_event(record: *const c_char) -> i8 {
    guarded("add_event", || {
        // SAFETY: forwarded from the caller's contract.
        let bytes = unsafe { payload(record, "event") }?;
        global().add_event(bytes)
    })
}

/// Persist every accepted record.
#[no_mangle]
pub extern "C" fn tally_flush() -> i8 {
    guarded("flush", || global().flush())
}

/// Close the active consumer. Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn tally_close() -> i8 {
    guarded("close", || global().close())
}

/// Switch the core's diagnostic logging on (non-zero) or off.
#[no_mangle]
pub extern "C" fn tally_toggle_logger(enabled: u8) {
    guarded("toggle_logger", || {
        global().toggle_logger(enabled != 0);
        Ok(())
    });
}
