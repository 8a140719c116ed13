use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::package::{ArchiveError, ManifestError};

/// Turns a plugin reference into an invokable unit.
pub trait PluginLoader: Send + Sync {
  fn load(&self, reference: &Path) -> Result<PluginUnit, LoadError>;
}

/// The `run` contract: one parameter mapping in, one status string out.
pub trait Runnable: Send + Sync {
  fn run(&self, params: &RunParams) -> Result<String, RunError>;
}

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("plugin reference is empty")]
  EmptyReference,

  #[error("plugin not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("io error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error("package {} has no manifest", .0.display())]
  ManifestMissing(PathBuf),

  #[error("package {} has an invalid manifest: {source}", path.display())]
  ManifestInvalid {
    path: PathBuf,
    #[source]
    source: ManifestError,
  },

  #[error("entry point `{entry}` not found in package {}", package.display())]
  EntryPointMissing { package: PathBuf, entry: String },

  #[error("failed to evaluate {}: {source}", path.display())]
  Resolution {
    path: PathBuf,
    #[source]
    source: mlua::Error,
  },

  #[error("{} does not define a `run` function", .0.display())]
  MissingRunContract(PathBuf),
}

impl LoadError {
  pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| LoadError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunError {
  /// `run` raised an error.
  #[error("{0}")]
  Plugin(String),

  #[error("run returned {0} instead of a status string")]
  BadReturn(String),

  #[error("plugin panicked")]
  Panicked,

  #[error("no plugin loaded")]
  NotLoaded,

  #[error("an invocation is already in progress")]
  Busy,
}

/// Parameters handed to `run`. Always carries `src` and `tgt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunParams(BTreeMap<String, String>);

impl RunParams {
  pub fn new(src: impl Into<String>, tgt: impl Into<String>) -> Self {
    let mut map = BTreeMap::new();
    map.insert("src".to_string(), src.into());
    map.insert("tgt".to_string(), tgt.into());
    Self(map)
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.0.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginOrigin {
  Script,
  Package,
}

impl fmt::Display for PluginOrigin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PluginOrigin::Script => write!(f, "script"),
      PluginOrigin::Package => write!(f, "package"),
    }
  }
}

/// What a load produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
  pub name: String,
  /// Only packages carry a version.
  pub version: Option<String>,
  pub description: Option<String>,
  pub origin: PluginOrigin,
  /// Resolved entry-point file. For packages this lives inside the
  /// extraction directory.
  pub entry: PathBuf,
  /// SHA-256 of the entry-point source, hex encoded.
  pub digest: String,
  /// Unique per load, never reused within a process.
  pub identity: String,
}

/// A loaded plugin: the callable plus the extraction directory it runs from.
pub struct PluginUnit {
  runnable: Box<dyn Runnable>,
  info: PluginInfo,
  workdir: Option<TempDir>,
}

impl PluginUnit {
  pub fn new(runnable: Box<dyn Runnable>, info: PluginInfo, workdir: Option<TempDir>) -> Self {
    Self {
      runnable,
      info,
      workdir,
    }
  }

  pub fn info(&self) -> &PluginInfo {
    &self.info
  }

  /// Extraction directory, if this unit was loaded from a package.
  pub fn workdir(&self) -> Option<&Path> {
    self.workdir.as_ref().map(TempDir::path)
  }

  pub fn run(&self, params: &RunParams) -> Result<String, RunError> {
    self.runnable.run(params)
  }

  /// Drop the callable and remove the extraction directory.
  ///
  /// A unit that is simply dropped also removes its directory, but silently.
  pub fn release(self) -> io::Result<()> {
    let PluginUnit {
      runnable,
      info,
      workdir,
    } = self;
    drop(runnable);
    match workdir {
      Some(dir) => {
        let path = dir.path().to_path_buf();
        dir.close()?;
        debug!(plugin = %info.name, dir = %path.display(), "removed plugin directory");
        Ok(())
      }
      None => Ok(()),
    }
  }
}

impl fmt::Debug for PluginUnit {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PluginUnit")
      .field("info", &self.info)
      .field("workdir", &self.workdir())
      .finish_non_exhaustive()
  }
}
