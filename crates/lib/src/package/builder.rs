//! Assemble a plugin package from a script on disk.
//!
//! The staging layout is exactly what the loader expects to find after
//! extraction: the script under its `entry_point` name, an optional `vendor`
//! tree and `plugin.json`, all at the archive root.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use super::archive::{self, ArchiveError};
use super::manifest::{ManifestError, PluginManifest};
use super::{MANIFEST_FILE, PACKAGE_EXTENSION, VENDOR_DIR};

const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum PackError {
  #[error("plugin script not found: {}", .0.display())]
  ScriptMissing(PathBuf),

  #[error("vendor path is not a directory: {}", .0.display())]
  VendorNotDir(PathBuf),

  #[error("cannot derive a plugin name from {}", .0.display())]
  NoName(PathBuf),

  #[error("invalid manifest: {0}")]
  Manifest(#[from] ManifestError),

  #[error("failed to stage {}: {source}", path.display())]
  Stage {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Archive(#[from] ArchiveError),
}

/// Outcome of a successful [`PackageBuilder::build`].
#[derive(Debug, Clone)]
pub struct PackResult {
  pub output: PathBuf,
  pub manifest: PluginManifest,
  /// Number of files placed in the archive, manifest included.
  pub files: usize,
}

/// Builder for a `.ottopie` package.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
  script: PathBuf,
  name: Option<String>,
  version: Option<String>,
  description: String,
  entry_point: Option<String>,
  vendor: Option<PathBuf>,
  output: Option<PathBuf>,
}

impl PackageBuilder {
  pub fn new(script: impl Into<PathBuf>) -> Self {
    Self {
      script: script.into(),
      name: None,
      version: None,
      description: String::new(),
      entry_point: None,
      vendor: None,
      output: None,
    }
  }

  /// Defaults to the script's file stem.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Defaults to `1.0.0`.
  pub fn version(mut self, version: impl Into<String>) -> Self {
    self.version = Some(version.into());
    self
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  /// Defaults to the script's file name.
  pub fn entry_point(mut self, entry_point: impl Into<String>) -> Self {
    self.entry_point = Some(entry_point.into());
    self
  }

  /// Directory whose contents are copied under `vendor/`.
  pub fn vendor(mut self, dir: impl Into<PathBuf>) -> Self {
    self.vendor = Some(dir.into());
    self
  }

  /// Defaults to `<name>.ottopie` in the current directory.
  pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
    self.output = Some(path.into());
    self
  }

  fn manifest(&self) -> Result<PluginManifest, PackError> {
    let stem = self.script.file_stem().map(|s| s.to_string_lossy().into_owned());
    let file_name = self.script.file_name().map(|s| s.to_string_lossy().into_owned());

    let name = match (&self.name, stem) {
      (Some(name), _) => name.clone(),
      (None, Some(stem)) => stem,
      (None, None) => return Err(PackError::NoName(self.script.clone())),
    };
    let entry_point = match (&self.entry_point, file_name) {
      (Some(entry), _) => entry.clone(),
      (None, Some(file_name)) => file_name,
      (None, None) => return Err(PackError::NoName(self.script.clone())),
    };

    let manifest = PluginManifest {
      name,
      version: self.version.clone().unwrap_or_else(|| DEFAULT_VERSION.to_string()),
      entry_point,
      description: self.description.clone(),
    };
    manifest.validate()?;
    Ok(manifest)
  }

  /// Stage and compress the package.
  pub fn build(self) -> Result<PackResult, PackError> {
    if !self.script.is_file() {
      return Err(PackError::ScriptMissing(self.script));
    }
    if let Some(vendor) = &self.vendor
      && !vendor.is_dir()
    {
      return Err(PackError::VendorNotDir(vendor.clone()));
    }

    let manifest = self.manifest()?;
    let output = self
      .output
      .clone()
      .unwrap_or_else(|| PathBuf::from(format!("{}.{}", manifest.name, PACKAGE_EXTENSION)));

    let staging = tempfile::Builder::new()
      .prefix("ottopie-pack-")
      .tempdir()
      .map_err(|source| PackError::Stage {
        path: std::env::temp_dir(),
        source,
      })?;
    let root = staging.path();

    let entry_path = manifest.entry_path(root);
    if let Some(parent) = entry_path.parent() {
      fs::create_dir_all(parent).map_err(stage_err(parent))?;
    }
    fs::copy(&self.script, &entry_path).map_err(stage_err(&entry_path))?;

    if let Some(vendor) = &self.vendor {
      copy_tree(vendor, &root.join(VENDOR_DIR))?;
    }

    let manifest_path = root.join(MANIFEST_FILE);
    let json = manifest.to_json().map_err(ManifestError::Parse)?;
    fs::write(&manifest_path, json).map_err(stage_err(&manifest_path))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(stage_err(parent))?;
    }
    let files = archive::write_dir(root, &output)?;

    info!(
      output = %output.display(),
      name = %manifest.name,
      version = %manifest.version,
      files,
      "plugin packaged"
    );

    Ok(PackResult {
      output,
      manifest,
      files,
    })
  }
}

fn stage_err(path: &Path) -> impl FnOnce(std::io::Error) -> PackError + '_ {
  move |source| PackError::Stage {
    path: path.to_path_buf(),
    source,
  }
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), PackError> {
  for entry in WalkDir::new(from).follow_links(true) {
    let entry = entry.map_err(|e| PackError::Stage {
      path: from.to_path_buf(),
      source: e.into(),
    })?;
    let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let dest = to.join(relative);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&dest).map_err(stage_err(&dest))?;
    } else {
      fs::copy(entry.path(), &dest).map_err(stage_err(&dest))?;
    }
  }
  Ok(())
}
