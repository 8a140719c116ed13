use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use ottopie_lib::package::PackageBuilder;

use crate::output::{format_bytes, print_stat, print_success, symbols};

pub struct PackArgs {
  pub script: PathBuf,
  pub name: Option<String>,
  pub version: Option<String>,
  pub description: String,
  pub entry_point: Option<String>,
  pub vendor: Option<PathBuf>,
  pub output: Option<PathBuf>,
}

pub fn cmd_pack(args: PackArgs) -> Result<()> {
  let mut builder = PackageBuilder::new(&args.script).description(args.description);
  if let Some(name) = args.name {
    builder = builder.name(name);
  }
  if let Some(version) = args.version {
    builder = builder.version(version);
  }
  if let Some(entry_point) = args.entry_point {
    builder = builder.entry_point(entry_point);
  }
  if let Some(vendor) = args.vendor {
    builder = builder.vendor(vendor);
  }
  if let Some(output) = args.output {
    builder = builder.output(output);
  }

  let result = builder
    .build()
    .with_context(|| format!("Failed to package {}", args.script.display()))?;
  let size = fs::metadata(&result.output).map(|m| m.len()).unwrap_or(0);

  print_success(&format!(
    "Packaged {} v{} {} {}",
    result.manifest.name,
    result.manifest.version,
    symbols::ARROW,
    result.output.display()
  ));
  print_stat("Entry point", &result.manifest.entry_point);
  print_stat("Files", &result.files.to_string());
  print_stat("Size", &format_bytes(size));
  Ok(())
}
