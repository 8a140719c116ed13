use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{Session, absolute};
use crate::IntervalArgs;
use crate::output::{print_stat, print_success, print_warning};

/// Fields to change; `None` keeps the current value.
pub struct EditArgs {
  pub plugin: Option<PathBuf>,
  pub src: Option<PathBuf>,
  pub tgt: Option<PathBuf>,
  pub interval: IntervalArgs,
}

pub fn cmd_edit(tasks_file: Option<PathBuf>, index: usize, args: EditArgs) -> Result<()> {
  let session = Session::open(tasks_file)?;
  let task = session.task(index)?;

  let mut config = task.config();
  if let Some(plugin) = &args.plugin {
    config.plugin = absolute(plugin)?;
  }
  if let Some(src) = &args.src {
    config.src = absolute(src)?;
  }
  if let Some(tgt) = &args.tgt {
    config.tgt = absolute(tgt)?;
  }
  config.interval = args.interval.resolve(config.interval)?;

  let task = session
    .registry
    .edit_task(task.id(), config.clone())
    .with_context(|| format!("Failed to edit task #{index}"))?;

  print_success(&format!("Updated task #{index}: {}", task.label()));
  print_stat("Source", &config.src.display().to_string());
  print_stat("Target", &config.tgt.display().to_string());
  print_stat("Every", &config.interval.to_string());
  if task.plugin_info().is_none() {
    print_warning("Plugin did not load; the task will not start until it does");
  }
  Ok(())
}
