//! Plugin loading and the `run` contract.
//!
//! A plugin reference is either a bare Lua script or a package archive (see
//! [`crate::package`]). Loading yields a [`PluginUnit`]: the callable `run`
//! plus, for packages, the extraction directory it was loaded from.

mod globals;
mod loader;
mod types;

pub use loader::LuaLoader;
pub use types::{LoadError, PluginInfo, PluginLoader, PluginOrigin, PluginUnit, RunError, RunParams, Runnable};

/// Source of the bundled folder-mirroring plugin.
pub const FOLDER_SYNC_SOURCE: &str = include_str!("../../plugins/folder_sync.lua");

/// File name the bundled plugin is written under.
pub const FOLDER_SYNC_FILE: &str = "folder_sync.lua";
