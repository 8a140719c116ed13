use std::path::Path;

use anyhow::{Context, Result, bail};

use ottopie_lib::package;

use crate::output::{print_json, print_stat, print_success};

pub fn cmd_inspect(archive: &Path, json: bool) -> Result<()> {
  let is_package =
    package::is_package(archive).with_context(|| format!("Failed to read {}", archive.display()))?;
  if !is_package {
    bail!("{} is not a plugin package", archive.display());
  }

  let manifest = package::read_manifest(archive)
    .with_context(|| format!("Failed to read manifest from {}", archive.display()))?;

  if json {
    return print_json(&manifest);
  }

  print_success(&format!("{} v{}", manifest.name, manifest.version));
  print_stat("Entry point", &manifest.entry_point);
  if !manifest.description.is_empty() {
    print_stat("Description", &manifest.description);
  }
  Ok(())
}
