//! Logging: a colored, module-tagged line printer.
//!
//! Grounded on the teacher's `logger.rs`: a `log!`/`debug!` macro pair
//! over owo-colors, gated by a global verbose flag, without the
//! teacher's progress-line/watch-status machinery (no live-reload
//! concept here).

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable verbose (debug-level) logging globally.
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Whether verbose logging is currently enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Print a single log line with a colored module prefix.
pub fn log(module: &str, message: &str) {
    eprintln!("{} {}", format!("[{module}]").cyan(), message);
}

/// Log a message with a colored module prefix.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message, shown only when verbose mode is enabled.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}
