//! ottopie-lib: recurring plugin tasks.
//!
//! - `sync`: the folder mirroring algorithm behind the bundled plugin
//! - `package`: the `.ottopie` plugin package format
//! - `plugin`: loading scripts and packages into runnable units
//! - `task`: per-task configuration and scheduling
//! - `registry`: the set of tasks and its on-disk snapshot

pub mod consts;
pub mod init;
pub mod package;
pub mod platform;
pub mod plugin;
pub mod registry;
pub mod sync;
pub mod task;
pub mod util;
