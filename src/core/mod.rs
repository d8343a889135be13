// Public modules
pub mod cluster;
pub mod config;
pub mod context;
pub mod coordination;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod fleet;
pub mod jobs;
pub mod operation;
pub mod ops;
pub mod output;
pub mod paths;
pub mod scheduler;
pub mod services;
pub mod ssh;
pub mod target;
pub mod template;
pub mod topology;

// Internal modules - not part of public API
pub(crate) mod http;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types for convenience
pub use context::ExecutionContext;
pub use error::{Error, ErrorCode, Result};
pub use operation::{execute_op, Mode, Operation};
pub use output::{BatchResult, BatchResultItem, BulkSummary};
pub use target::{Step, Target, TargetRegistry};
pub use topology::{Role, Topology};
