//! Routes `log` records emitted by the engine and its worker threads to the
//! host-registered callback. Installing is idempotent: if the process already
//! has a logger (the host's own, or a previous engine instance), the existing
//! one is kept and the new callback is swapped in.

use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::config::LogCallback;

static CALLBACK: Lazy<RwLock<Option<LogCallback>>> = Lazy::new(|| RwLock::new(None));

struct CallbackLogger;

impl log::Log for CallbackLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        CALLBACK.read().map(|cb| cb.is_some()).unwrap_or(false)
    }

    fn log(&self, record: &log::Record) {
        if let Ok(cb) = CALLBACK.read() {
            if let Some(cb) = cb.as_ref() {
                cb(record.level(), &format!("{}", record.args()));
            }
        }
    }

    fn flush(&self) {}
}

static LOGGER: CallbackLogger = CallbackLogger;

/// Install (or replace) the log callback.
pub fn install(callback: LogCallback) {
    *CALLBACK.write().expect("log callback lock poisoned") = Some(callback);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}
