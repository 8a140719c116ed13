//! Implementation of the `ottopie init` command.
//!
//! Writes the bundled folder_sync plugin and LuaLS support files into a
//! directory so they can be edited, scheduled or packed.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use ottopie_lib::init::{InitOptions, init};

use crate::output::symbols;

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if a file already exists and `force` is not set, or if
/// the directory cannot be written.
pub fn cmd_init(path: &Path, force: bool) -> Result<()> {
  let options = InitOptions {
    dir: path.to_path_buf(),
    force,
  };

  let result = init(&options).context("Failed to initialize plugin directory")?;

  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    "Initialized plugin directory".if_supports_color(Stream::Stdout, |s| s.bold())
  );
  println!();
  println!("  {} Plugin:           {}", symbols::INFO, result.plugin.display());
  println!("  {} LuaLS config:     {}", symbols::INFO, result.luarc_json.display());
  println!("  {} Type definitions: {}", symbols::INFO, result.types.display());
  println!();
  println!("Next steps:");
  println!(
    "  1. Schedule it: ottopie add --plugin {} --src <folder> --tgt <folder>",
    result.plugin.display()
  );
  println!("  2. Or package it: ottopie pack {}", result.plugin.display());

  Ok(())
}
