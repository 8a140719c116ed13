//! Recurring tasks: configuration, validation and the per-task runtime.

mod runtime;
mod types;

pub use runtime::{Firing, TaskEvents, TaskRuntime};
pub use types::{ConfigError, check_disjoint, EventKind, Interval, RunRecord, TaskConfig, TaskEvent, TaskId, TaskStatus};
