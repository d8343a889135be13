//! Generic utility primitives with zero domain knowledge.
//!
//! - `io` - File I/O with consistent error handling
//! - `pattern` - Anchored regex matching for identifiers and path segments
//! - `shell` - Shell escaping and quoting
//! - `template` - `$`-placeholder substitution

pub mod io;
pub mod pattern;
pub mod shell;
pub mod template;
