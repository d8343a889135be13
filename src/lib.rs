/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("dispatch", "Running {} on {} host(s)", target, hosts.len());
/// log_status!("services", "Deleting service {}", id);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

/// Macro for prefixed warnings to stderr. Always printed: tolerated failures must
/// never be silent, even when output is redirected.
#[macro_export]
macro_rules! log_warn {
    ($prefix:expr, $($arg:tt)*) => {
        eprintln!(concat!("[", $prefix, "] warning: {}"), format_args!($($arg)*))
    };
}

pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `stars::operation` instead of `stars::core::operation`
pub use core::*;
pub use utils::*;
