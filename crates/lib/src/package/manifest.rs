//! The `plugin.json` manifest record.
//!
//! ```json
//! {
//!   "name": "folder_sync",
//!   "version": "1.0.0",
//!   "entry_point": "folder_sync.lua",
//!   "description": "Mirror a source folder into a target folder"
//! }
//! ```

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{MANIFEST_FILE, VENDOR_DIR};

/// Errors for a manifest that parsed as JSON but is not usable, or did not
/// parse at all.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("malformed manifest: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("manifest field `{0}` must not be blank")]
  Blank(&'static str),

  #[error("entry_point `{0}` must be a relative path inside the package")]
  EntryPointOutside(String),

  #[error("entry_point `{0}` collides with the manifest or the vendor directory")]
  ReservedEntryPoint(String),
}

/// Metadata describing a packaged plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
  pub name: String,
  pub version: String,
  /// Path of the Lua file implementing `run`, relative to the package root.
  pub entry_point: String,
  /// Free text, may be empty but must be present.
  pub description: String,
}

impl PluginManifest {
  /// Parse and validate manifest JSON.
  pub fn from_json(content: &str) -> Result<Self, ManifestError> {
    Self::from_slice(content.as_bytes())
  }

  /// Parse and validate raw manifest bytes. Bytes that are not UTF-8 are a
  /// parse error like any other malformed content.
  pub fn from_slice(content: &[u8]) -> Result<Self, ManifestError> {
    let manifest: PluginManifest = serde_json::from_slice(content).map_err(ManifestError::Parse)?;
    manifest.validate()?;
    Ok(manifest)
  }

  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(self)
  }

  pub fn validate(&self) -> Result<(), ManifestError> {
    if self.name.trim().is_empty() {
      return Err(ManifestError::Blank("name"));
    }
    if self.version.trim().is_empty() {
      return Err(ManifestError::Blank("version"));
    }
    if self.entry_point.trim().is_empty() {
      return Err(ManifestError::Blank("entry_point"));
    }
    let entry = Path::new(&self.entry_point);
    if !is_contained(entry) {
      return Err(ManifestError::EntryPointOutside(self.entry_point.clone()));
    }
    if is_reserved(entry) {
      return Err(ManifestError::ReservedEntryPoint(self.entry_point.clone()));
    }
    Ok(())
  }

  /// Absolute location of the entry point once the package sits at `root`.
  pub fn entry_path(&self, root: &Path) -> PathBuf {
    root.join(&self.entry_point)
  }
}

/// True when `path` is relative and never climbs above its base.
pub(crate) fn is_contained(path: &Path) -> bool {
  path
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// The manifest itself and anything under `vendor/` belong to the package
/// layout, not to the entry point.
fn is_reserved(entry: &Path) -> bool {
  let mut parts = entry.components().filter(|c| matches!(c, Component::Normal(_)));
  match (parts.next(), parts.next()) {
    (Some(first), None) => first.as_os_str() == MANIFEST_FILE || first.as_os_str() == VENDOR_DIR,
    (Some(first), Some(_)) => first.as_os_str() == VENDOR_DIR,
    (None, _) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn json(name: &str, version: &str, entry: &str) -> String {
    serde_json::json!({
      "name": name,
      "version": version,
      "entry_point": entry,
      "description": "",
    })
    .to_string()
  }

  #[test]
  fn parses_complete_manifest() {
    let manifest = PluginManifest::from_json(&json("sync", "1.0.0", "main.lua")).unwrap();
    assert_eq!(manifest.name, "sync");
    assert_eq!(manifest.entry_point, "main.lua");
    assert_eq!(manifest.description, "");
  }

  #[test]
  fn unknown_fields_are_ignored() {
    let content = r#"{"name":"a","version":"1","entry_point":"a.lua","description":"d","author":"me"}"#;
    assert!(PluginManifest::from_json(content).is_ok());
  }

  #[test]
  fn missing_description_is_rejected() {
    let content = r#"{"name":"a","version":"1","entry_point":"a.lua"}"#;
    assert!(matches!(PluginManifest::from_json(content), Err(ManifestError::Parse(_))));
  }

  #[test]
  fn wrong_field_type_is_rejected() {
    let content = r#"{"name":"a","version":1,"entry_point":"a.lua","description":""}"#;
    assert!(matches!(PluginManifest::from_json(content), Err(ManifestError::Parse(_))));
  }

  #[test]
  fn blank_fields_are_rejected() {
    assert!(matches!(
      PluginManifest::from_json(&json(" ", "1", "a.lua")),
      Err(ManifestError::Blank("name"))
    ));
    assert!(matches!(
      PluginManifest::from_json(&json("a", "", "a.lua")),
      Err(ManifestError::Blank("version"))
    ));
    assert!(matches!(
      PluginManifest::from_json(&json("a", "1", "")),
      Err(ManifestError::Blank("entry_point"))
    ));
  }

  #[test]
  fn escaping_entry_point_is_rejected() {
    for entry in ["../evil.lua", "/abs/evil.lua", "sub/../../evil.lua"] {
      let result = PluginManifest::from_json(&json("a", "1", entry));
      assert!(
        matches!(result, Err(ManifestError::EntryPointOutside(_))),
        "{entry} should be rejected"
      );
    }
  }

  #[test]
  fn reserved_entry_point_is_rejected() {
    for entry in ["plugin.json", "./plugin.json", "vendor", "vendor/helper.lua"] {
      let result = PluginManifest::from_json(&json("a", "1", entry));
      assert!(
        matches!(result, Err(ManifestError::ReservedEntryPoint(_))),
        "{entry} should be rejected"
      );
    }
    assert!(PluginManifest::from_json(&json("a", "1", "src/vendor/x.lua")).is_ok());
  }

  #[test]
  fn non_utf8_bytes_are_a_parse_error() {
    assert!(matches!(
      PluginManifest::from_slice(b"{\"name\": \"\xff\xfe\"}"),
      Err(ManifestError::Parse(_))
    ));
  }

  #[test]
  fn nested_entry_point_is_allowed() {
    let manifest = PluginManifest::from_json(&json("a", "1", "src/main.lua")).unwrap();
    assert_eq!(manifest.entry_path(Path::new("/root")), PathBuf::from("/root/src/main.lua"));
  }
}
