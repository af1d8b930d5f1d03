// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Engine - Diagnostic logging
//
// The core logs through `tracing`. Hosts that already install a global
// subscriber keep it; otherwise `install_subscriber` sets up a fmt
// subscriber whose verbosity follows the engine's debug flag. With the flag
// off only warnings and errors get through.
//
// Environment:
//
// ```text
// TALLY_LOG=tally_log=debug,tally_engine=info   # EnvFilter directives
// TALLY_LOG_FORMAT=json                         # one JSON object per event
// ```

use std::sync::OnceLock;

use tracing::warn;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Environment variable holding `EnvFilter` directives.
pub const LOG_ENV: &str = "TALLY_LOG";
/// Environment variable selecting the output format (`json` or `text`).
pub const LOG_FORMAT_ENV: &str = "TALLY_LOG_FORMAT";

static VERBOSITY: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Install the global subscriber.
///
/// Returns `false` (and changes nothing) if the host already installed one.
pub fn install_subscriber(verbose: bool) -> bool {
    let (level, handle) = reload::Layer::new(level_for(verbose));
    let directives =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("debug"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format == "json");

    let installed = tracing_subscriber::registry()
        .with(level)
        .with(directives)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()
        .is_ok();

    if installed {
        // Only the first successful install can get here.
        let _ = VERBOSITY.set(handle);
    }
    installed
}

/// Raise or lower the installed subscriber's level. No effect on a
/// host-provided subscriber.
pub fn set_verbose(verbose: bool) {
    if let Some(handle) = VERBOSITY.get() {
        if let Err(e) = handle.reload(level_for(verbose)) {
            warn!(error = %e, "Could not change diagnostic log level");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_follows_flag() {
        assert_eq!(level_for(true), LevelFilter::DEBUG);
        assert_eq!(level_for(false), LevelFilter::WARN);
    }

    #[test]
    fn test_second_install_is_refused() {
        // Whichever test installs first wins; any later attempt must leave
        // the existing subscriber alone.
        install_subscriber(false);
        assert!(!install_subscriber(true));
        set_verbose(true);
        set_verbose(false);
    }
}
