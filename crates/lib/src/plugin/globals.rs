//! The `ottopie` global table every plugin state receives.
//!
//! - `ottopie.sync(src, tgt)` - mirror `src` into `tgt`, returns the counters;
//!   raises if either folder contains the other
//! - `ottopie.fs.is_dir(path)`, `ottopie.fs.exists(path)`
//! - `ottopie.log.{debug,info,warn,error}(msg)` - forwarded to `tracing`
//! - `ottopie.plugin` - `{ name, version, dir }` of the running plugin

use std::path::Path;

use mlua::prelude::*;
use tracing::{debug, error, info, warn};

use crate::sync::sync_folders;
use crate::task::check_disjoint;

/// Identity of the plugin a state belongs to.
#[derive(Debug, Clone)]
pub(crate) struct HostContext {
  pub name: String,
  pub version: Option<String>,
  pub dir: String,
}

pub(crate) fn register_globals(lua: &Lua, ctx: &HostContext) -> LuaResult<()> {
  let ottopie = lua.create_table()?;

  let sync = lua.create_function(|lua, (src, tgt): (String, String)| {
    let (src, tgt) = (Path::new(&src), Path::new(&tgt));
    check_disjoint(src, tgt).map_err(LuaError::external)?;
    let counters = sync_folders(src, tgt).map_err(LuaError::external)?;
    let table = lua.create_table()?;
    table.set("copied", counters.copied)?;
    table.set("updated", counters.updated)?;
    table.set("deleted", counters.deleted)?;
    table.set("skipped", counters.skipped)?;
    Ok(table)
  })?;
  ottopie.set("sync", sync)?;

  let fs = lua.create_table()?;
  fs.set("is_dir", lua.create_function(|_, path: String| Ok(Path::new(&path).is_dir()))?)?;
  fs.set("exists", lua.create_function(|_, path: String| Ok(Path::new(&path).exists()))?)?;
  ottopie.set("fs", fs)?;

  ottopie.set("log", create_log_table(lua, &ctx.name)?)?;

  let plugin = lua.create_table()?;
  plugin.set("name", ctx.name.as_str())?;
  plugin.set("version", ctx.version.as_deref())?;
  plugin.set("dir", ctx.dir.as_str())?;
  ottopie.set("plugin", plugin)?;

  lua.globals().set("ottopie", ottopie)?;
  Ok(())
}

fn create_log_table(lua: &Lua, plugin: &str) -> LuaResult<LuaTable> {
  let log = lua.create_table()?;

  let name = plugin.to_string();
  log.set(
    "debug",
    lua.create_function(move |_, msg: String| {
      debug!(target: "ottopie::plugin", plugin = %name, "{msg}");
      Ok(())
    })?,
  )?;

  let name = plugin.to_string();
  log.set(
    "info",
    lua.create_function(move |_, msg: String| {
      info!(target: "ottopie::plugin", plugin = %name, "{msg}");
      Ok(())
    })?,
  )?;

  let name = plugin.to_string();
  log.set(
    "warn",
    lua.create_function(move |_, msg: String| {
      warn!(target: "ottopie::plugin", plugin = %name, "{msg}");
      Ok(())
    })?,
  )?;

  let name = plugin.to_string();
  log.set(
    "error",
    lua.create_function(move |_, msg: String| {
      error!(target: "ottopie::plugin", plugin = %name, "{msg}");
      Ok(())
    })?,
  )?;

  Ok(log)
}
