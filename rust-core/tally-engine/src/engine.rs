// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Tally Engine - Lifecycle and dispatch
//
// An `Engine` owns at most one consumer and moves through
// Uninitialized -> Running -> Closed, with `init` allowed again from
// Closed (or from Running, after the current consumer is closed). The
// lifecycle and the consumer sit behind a single mutex. `add` checks the
// lifecycle first, then processes the record outside the lock so concurrent
// callers only contend for the write itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock};

use tally_event::{decode, to_record, Event, Map};
use tally_log::{AnyConsumer, Consumer, ConsumerStats, MeteredConsumer};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::diagnostics;
use crate::error::{EngineError, EngineResult};
use crate::processing::RecordProcessor;

/// Lifecycle state of an engine.
#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Running(MeteredConsumer<AnyConsumer>),
    Closed,
}

impl Lifecycle {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Running(_) => "running",
            Self::Closed => "closed",
        }
    }
}

/// Owns the active consumer and mediates every binding call.
#[derive(Debug)]
pub struct Engine {
    state: Mutex<Lifecycle>,
    processor: RwLock<RecordProcessor>,
    debug: AtomicBool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Lifecycle::Uninitialized),
            processor: RwLock::new(RecordProcessor::new()),
            debug: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        // A panic while holding the lock leaves a consumer whose own state
        // is still consistent; keep serving it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn verbose(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Construct the consumer named by `config` and start accepting records.
    ///
    /// A running consumer is closed first. If construction fails the engine
    /// is left Closed (or Uninitialized if it never ran) and the logging
    /// switch is untouched.
    pub fn init(&self, config: EngineConfig) -> EngineResult<()> {
        let mut state = self.lock();
        let previous = std::mem::replace(&mut *state, Lifecycle::Closed);
        let fallback = match previous {
            Lifecycle::Running(mut consumer) => {
                if let Err(e) = consumer.close() {
                    warn!(error = %e, "Failed to close previous consumer during re-init");
                }
                Lifecycle::Closed
            }
            other => other,
        };

        match AnyConsumer::open(&config.consumer) {
            Ok(consumer) => {
                if let Some(debug) = config.debug {
                    self.toggle_logger(debug);
                }
                if self.verbose() {
                    info!(
                        consumer = config.consumer.kind(),
                        path = %config.consumer.path().display(),
                        "Engine running"
                    );
                }
                *state = Lifecycle::Running(MeteredConsumer::new(consumer));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Engine init failed");
                *state = fallback;
                Err(e.into())
            }
        }
    }

    /// Parse a binding's JSON init payload and initialize.
    pub fn init_from_bytes(&self, config: &[u8]) -> EngineResult<()> {
        let config = EngineConfig::from_bytes(config).inspect_err(|e| {
            warn!(error = %e, "Rejected init payload");
        })?;
        self.init(config)
    }

    /// Encode `event` and hand it to the consumer.
    pub fn add(&self, event: Event) -> EngineResult<()> {
        self.submit(|| Ok(to_record(event)))
    }

    /// Accept one fully-formed JSON record from a binding.
    pub fn add_event(&self, record: &[u8]) -> EngineResult<()> {
        self.submit(|| decode(record).map_err(EngineError::from))
    }

    /// Lifecycle errors win over record errors: a call on a closed engine
    /// reports `ClosedConsumer` whatever the record looks like.
    fn submit(&self, build: impl FnOnce() -> EngineResult<Map>) -> EngineResult<()> {
        self.ensure_running()?;

        let processed = build().and_then(|record| {
            self.processor
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .process(record)
        });
        let bytes = match processed {
            Ok(bytes) => bytes,
            Err(e) => {
                // The engine may have been closed while the record was built.
                self.ensure_running()?;
                warn!(error = %e, "Dropped invalid event");
                return Err(e);
            }
        };

        let mut state = self.lock();
        let result = match &mut *state {
            Lifecycle::Running(consumer) => consumer.write(&bytes).map_err(EngineError::from),
            Lifecycle::Uninitialized => Err(EngineError::NotInitialized),
            Lifecycle::Closed => Err(EngineError::ClosedConsumer),
        };
        if let Err(e) = &result {
            warn!(error = %e, state = state.name(), "Event not recorded");
        }
        result
    }

    fn ensure_running(&self) -> EngineResult<()> {
        let state = self.lock();
        let error = match &*state {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Uninitialized => EngineError::NotInitialized,
            Lifecycle::Closed => EngineError::ClosedConsumer,
        };
        warn!(error = %error, state = state.name(), "Event not recorded");
        Err(error)
    }

    /// Persist every accepted record. Succeeds trivially when not running.
    pub fn flush(&self) -> EngineResult<()> {
        let mut state = self.lock();
        let Lifecycle::Running(consumer) = &mut *state else {
            return Ok(());
        };
        consumer.flush().map_err(|e| {
            warn!(error = %e, "Flush failed");
            EngineError::from(e)
        })?;
        if self.verbose() {
            debug!(flushes = consumer.stats().flush_count, "Flushed consumer");
        }
        Ok(())
    }

    /// Close and drop the consumer. Calling `close` again is a no-op.
    pub fn close(&self) -> EngineResult<()> {
        let mut state = self.lock();
        let mut consumer = match std::mem::replace(&mut *state, Lifecycle::Closed) {
            Lifecycle::Running(consumer) => consumer,
            // An engine that never ran stays uninitialized.
            other => {
                *state = other;
                return Ok(());
            }
        };

        let stats = consumer.stats().clone();
        consumer.close().map_err(|e| {
            warn!(error = %e, "Close failed");
            EngineError::from(e)
        })?;
        if self.verbose() {
            info!(
                records = stats.records_accepted,
                bytes = stats.bytes_accepted,
                write_errors = stats.write_errors,
                "Engine closed"
            );
        }
        Ok(())
    }

    /// Switch the core's own diagnostic logging. Event recording is not
    /// affected.
    pub fn toggle_logger(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
        diagnostics::set_verbose(enabled);
    }

    pub fn is_debug(&self) -> bool {
        self.verbose()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lock(), Lifecycle::Running(_))
    }

    /// Snapshot of the running consumer's counters.
    pub fn stats(&self) -> Option<ConsumerStats> {
        match &*self.lock() {
            Lifecycle::Running(consumer) => Some(consumer.stats().clone()),
            _ => None,
        }
    }

    /// Properties merged into every later record that lacks them.
    pub fn set_common_properties(&self, properties: Map) {
        self.processor
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_common_properties(properties);
    }

    pub fn clear_common_properties(&self) {
        self.processor
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_common_properties();
    }
}

// ---------------------------------------------------------------------------
// Process-wide engine
// ---------------------------------------------------------------------------

static ENGINE: OnceLock<Engine> = OnceLock::new();

/// The engine shared by every binding in this process.
pub fn global() -> &'static Engine {
    ENGINE.get_or_init(Engine::new)
}

/// [`Engine::init_from_bytes`] on the process-wide engine.
pub fn init(config: &[u8]) -> EngineResult<()> {
    global().init_from_bytes(config)
}

/// [`Engine::add_event`] on the process-wide engine.
pub fn add_event(record: &[u8]) -> EngineResult<()> {
    global().add_event(record)
}

/// [`Engine::flush`] on the process-wide engine.
pub fn flush() -> EngineResult<()> {
    global().flush()
}

/// [`Engine::close`] on the process-wide engine.
pub fn close() -> EngineResult<()> {
    global().close()
}

/// [`Engine::toggle_logger`] on the process-wide engine.
pub fn toggle_logger(enabled: bool) {
    global().toggle_logger(enabled)
}
