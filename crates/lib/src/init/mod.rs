//! Scaffold a plugin directory.
//!
//! `ottopie init` writes:
//! - `folder_sync.lua`, the bundled mirroring plugin, ready to schedule or pack
//! - `.luarc.json` and `types/ottopie.d.lua` for LuaLS completion of the host API

mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::plugin::FOLDER_SYNC_FILE;

pub use templates::{FOLDER_SYNC_TEMPLATE, LUARC_JSON_TEMPLATE, OTTOPIE_D_LUA};

#[derive(Debug, Error)]
pub enum InitError {
  #[error("file already exists: {}", path.display())]
  PathExists { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: std::io::Error },
}

pub struct InitOptions {
  pub dir: PathBuf,
  /// Overwrite files that already exist.
  pub force: bool,
}

#[derive(Debug)]
pub struct InitResult {
  pub dir: PathBuf,
  pub plugin: PathBuf,
  pub luarc_json: PathBuf,
  pub types: PathBuf,
}

pub fn init(options: &InitOptions) -> Result<InitResult, InitError> {
  let dir = &options.dir;
  let plugin = dir.join(FOLDER_SYNC_FILE);
  let luarc_json = dir.join(".luarc.json");
  let types_dir = dir.join("types");
  let types = types_dir.join("ottopie.d.lua");

  if !options.force {
    for path in [&plugin, &luarc_json] {
      if path.exists() {
        return Err(InitError::PathExists { path: path.clone() });
      }
    }
  }

  fs::create_dir_all(&types_dir).map_err(|e| InitError::CreateDir {
    path: types_dir.clone(),
    source: e,
  })?;

  write(&plugin, FOLDER_SYNC_TEMPLATE)?;
  write(&luarc_json, LUARC_JSON_TEMPLATE)?;
  write(&types, OTTOPIE_D_LUA)?;

  info!(dir = %dir.display(), "initialized plugin directory");
  Ok(InitResult {
    dir: dir.clone(),
    plugin,
    luarc_json,
    types,
  })
}

fn write(path: &Path, content: &str) -> Result<(), InitError> {
  fs::write(path, content).map_err(|e| InitError::WriteFile {
    path: path.to_path_buf(),
    source: e,
  })
}
