//! Lua-backed [`PluginLoader`].
//!
//! Every load gets its own interpreter state, so neither globals nor
//! `package.loaded` survive from one load to the next. Package archives are
//! extracted into a fresh temporary directory which the resulting unit owns.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use mlua::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::globals::{HostContext, register_globals};
use super::types::{LoadError, PluginInfo, PluginLoader, PluginOrigin, PluginUnit, RunError, RunParams, Runnable};
use crate::package::{self, MANIFEST_FILE, PluginManifest, VENDOR_DIR};

static LOAD_SEQ: AtomicU64 = AtomicU64::new(1);

/// Loads `.lua` scripts and zip packages.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaLoader;

impl LuaLoader {
  pub fn new() -> Self {
    Self
  }

  fn load_script(&self, script: &Path) -> Result<PluginUnit, LoadError> {
    let script = dunce::canonicalize(script).map_err(LoadError::io(script))?;
    let root = script.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = script
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| script.display().to_string());

    let target = Target {
      name,
      version: None,
      description: None,
      origin: PluginOrigin::Script,
      entry: script,
      search: vec![root.clone()],
      root,
    };
    let (runnable, info) = instantiate(target)?;
    Ok(PluginUnit::new(Box::new(runnable), info, None))
  }

  fn load_package(&self, archive: &Path) -> Result<PluginUnit, LoadError> {
    let workdir = tempfile::Builder::new()
      .prefix("ottopie-plugin-")
      .tempdir()
      .map_err(LoadError::io(&std::env::temp_dir()))?;
    package::extract(archive, workdir.path())?;

    let manifest = read_extracted_manifest(archive, workdir.path())?;
    let entry = manifest.entry_path(workdir.path());
    if !entry.is_file() {
      return Err(LoadError::EntryPointMissing {
        package: archive.to_path_buf(),
        entry: manifest.entry_point,
      });
    }

    let root = workdir.path().to_path_buf();
    let mut search = vec![root.clone()];
    let vendor = root.join(VENDOR_DIR);
    if vendor.is_dir() {
      search.insert(0, vendor);
    }

    let target = Target {
      name: manifest.name,
      version: Some(manifest.version),
      description: Some(manifest.description),
      origin: PluginOrigin::Package,
      entry,
      search,
      root,
    };
    let (runnable, info) = instantiate(target)?;
    debug!(plugin = %info.name, dir = %workdir.path().display(), "extracted package");
    Ok(PluginUnit::new(Box::new(runnable), info, Some(workdir)))
  }
}

impl PluginLoader for LuaLoader {
  fn load(&self, reference: &Path) -> Result<PluginUnit, LoadError> {
    if reference.as_os_str().is_empty() {
      return Err(LoadError::EmptyReference);
    }

    let metadata = match fs::metadata(reference) {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LoadError::NotFound(reference.to_path_buf())),
      Err(e) => return Err(LoadError::io(reference)(e)),
    };
    if !metadata.is_file() {
      return Err(LoadError::NotFound(reference.to_path_buf()));
    }

    let unit = if package::is_package(reference).map_err(LoadError::io(reference))? {
      self.load_package(reference)?
    } else {
      self.load_script(reference)?
    };

    info!(
      plugin = %unit.info().name,
      origin = %unit.info().origin,
      identity = %unit.info().identity,
      "plugin loaded"
    );
    Ok(unit)
  }
}

fn read_extracted_manifest(archive: &Path, root: &Path) -> Result<PluginManifest, LoadError> {
  let path = root.join(MANIFEST_FILE);
  let content = match fs::read(&path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LoadError::ManifestMissing(archive.to_path_buf())),
    Err(e) => return Err(LoadError::io(&path)(e)),
  };
  PluginManifest::from_slice(&content).map_err(|source| LoadError::ManifestInvalid {
    path: archive.to_path_buf(),
    source,
  })
}

/// Everything needed to evaluate one entry point.
struct Target {
  name: String,
  version: Option<String>,
  description: Option<String>,
  origin: PluginOrigin,
  entry: PathBuf,
  /// Directories prepended to `package.path`, highest priority first.
  search: Vec<PathBuf>,
  root: PathBuf,
}

fn instantiate(target: Target) -> Result<(LuaRunnable, PluginInfo), LoadError> {
  let code = fs::read(&target.entry).map_err(LoadError::io(&target.entry))?;
  let digest = hex::encode(Sha256::digest(&code));
  let seq = LOAD_SEQ.fetch_add(1, Ordering::Relaxed);
  let identity = format!("ottopie#{seq}:{}", target.entry.display());

  let resolution = |source: LuaError| LoadError::Resolution {
    path: target.entry.clone(),
    source,
  };

  let lua = Lua::new();
  prepend_search_path(&lua, &target.search).map_err(resolution)?;
  let ctx = HostContext {
    name: target.name.clone(),
    version: target.version.clone(),
    dir: target.root.to_string_lossy().into_owned(),
  };
  register_globals(&lua, &ctx).map_err(resolution)?;

  let value = lua
    .load(code.as_slice())
    .set_name(format!("@{identity}"))
    .eval::<LuaValue>()
    .map_err(resolution)?;

  let run = resolve_run(&lua, value)
    .map_err(resolution)?
    .ok_or_else(|| LoadError::MissingRunContract(target.entry.clone()))?;

  let info = PluginInfo {
    name: target.name,
    version: target.version,
    description: target.description,
    origin: target.origin,
    entry: target.entry,
    digest,
    identity,
  };
  Ok((LuaRunnable { lua, run }, info))
}

fn prepend_search_path(lua: &Lua, dirs: &[PathBuf]) -> LuaResult<()> {
  let package = lua.globals().get::<LuaTable>("package")?;
  let current = package.get::<String>("path")?;
  let mut entries = Vec::with_capacity(dirs.len() * 2 + 1);
  for dir in dirs {
    let dir = dir.to_string_lossy();
    entries.push(format!("{dir}/?.lua"));
    entries.push(format!("{dir}/?/init.lua"));
  }
  entries.push(current);
  package.set("path", entries.join(";"))
}

/// `run` from the returned module table, falling back to the global.
fn resolve_run(lua: &Lua, value: LuaValue) -> LuaResult<Option<LuaFunction>> {
  if let LuaValue::Table(module) = value
    && let LuaValue::Function(run) = module.get::<LuaValue>("run")?
  {
    return Ok(Some(run));
  }
  match lua.globals().get::<LuaValue>("run")? {
    LuaValue::Function(run) => Ok(Some(run)),
    _ => Ok(None),
  }
}

struct LuaRunnable {
  lua: Lua,
  run: LuaFunction,
}

impl Runnable for LuaRunnable {
  fn run(&self, params: &RunParams) -> Result<String, RunError> {
    let plugin_error = |e: LuaError| RunError::Plugin(e.to_string());

    let table = self.lua.create_table().map_err(plugin_error)?;
    for (key, value) in params.iter() {
      table.set(key, value).map_err(plugin_error)?;
    }

    match self.run.call::<LuaValue>(table).map_err(plugin_error)? {
      LuaValue::String(status) => Ok(status.to_string_lossy().to_string()),
      LuaValue::Integer(n) => Ok(n.to_string()),
      LuaValue::Number(n) => Ok(n.to_string()),
      other => Err(RunError::BadReturn(other.type_name().to_string())),
    }
  }
}
