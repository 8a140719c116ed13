//! Plugin packages: a zip archive holding a manifest, an entry-point script
//! and an optional `vendor/` directory of bundled Lua modules.

pub mod archive;
pub mod builder;
pub mod manifest;

pub use archive::{ArchiveError, extract, is_package, read_manifest};
pub use builder::{PackError, PackResult, PackageBuilder};
pub use manifest::{ManifestError, PluginManifest};

/// Name of the manifest at the package root.
pub const MANIFEST_FILE: &str = "plugin.json";

/// Directory at the package root added to the module search path.
pub const VENDOR_DIR: &str = "vendor";

/// File extension used for packages produced by [`PackageBuilder`].
pub const PACKAGE_EXTENSION: &str = "ottopie";
