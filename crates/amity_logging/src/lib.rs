#![deny(missing_docs)]
//! Shared logging utilities for the amity workspace.
//!
//! This crate provides the `amity_*` logging macros used across the codebase,
//! a thread-local request-correlation id for inbound handshake handlers, and
//! a minimal test initializer for the global logger.

use std::cell::RefCell;

thread_local! {
    /// Thread-local storage for the current request-correlation id.
    static REQUEST_ID: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the request-correlation id for the current thread.
///
/// Inbound handlers should call this once at the top of a request so that
/// log lines emitted while serving it can be tied together.
pub fn set_request_id(id: impl Into<String>) {
    REQUEST_ID.with(|v| *v.borrow_mut() = Some(id.into()));
}

/// Clears the request-correlation id for the current thread.
pub fn clear_request_id() {
    REQUEST_ID.with(|v| *v.borrow_mut() = None);
}

/// Retrieves the request-correlation id for the current thread, if set.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.with(|v| v.borrow().clone())
}

/// Logs a trace-level message, prefixed with the request id when one is set.
#[macro_export]
macro_rules! amity_trace {
    ($($arg:tt)*) => {{
        match $crate::current_request_id() {
            Some(id) => log::trace!("[{id}] {}", format_args!($($arg)*)),
            None => log::trace!($($arg)*),
        }
    }};
}

/// Logs an info-level message, prefixed with the request id when one is set.
#[macro_export]
macro_rules! amity_info {
    ($($arg:tt)*) => {{
        match $crate::current_request_id() {
            Some(id) => log::info!("[{id}] {}", format_args!($($arg)*)),
            None => log::info!($($arg)*),
        }
    }};
}

/// Logs a debug-level message, prefixed with the request id when one is set.
#[macro_export]
macro_rules! amity_debug {
    ($($arg:tt)*) => {{
        match $crate::current_request_id() {
            Some(id) => log::debug!("[{id}] {}", format_args!($($arg)*)),
            None => log::debug!($($arg)*),
        }
    }};
}

/// Logs a warn-level message, prefixed with the request id when one is set.
#[macro_export]
macro_rules! amity_warn {
    ($($arg:tt)*) => {{
        match $crate::current_request_id() {
            Some(id) => log::warn!("[{id}] {}", format_args!($($arg)*)),
            None => log::warn!($($arg)*),
        }
    }};
}

/// Logs an error-level message, prefixed with the request id when one is set.
#[macro_export]
macro_rules! amity_error {
    ($($arg:tt)*) => {{
        match $crate::current_request_id() {
            Some(id) => log::error!("[{id}] {}", format_args!($($arg)*)),
            None => log::error!($($arg)*),
        }
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
