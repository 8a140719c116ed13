use std::path::PathBuf;

use anyhow::{Context, Result};

use super::Session;
use crate::output::print_success;

pub fn cmd_remove(tasks_file: Option<PathBuf>, index: usize) -> Result<()> {
  let session = Session::open(tasks_file)?;
  let task = session.task(index)?;

  let config = session
    .registry
    .remove_task(task.id())
    .with_context(|| format!("Failed to remove task #{index}"))?;

  print_success(&format!("Removed task #{index}: {}", config.label()));
  Ok(())
}
