use std::path::PathBuf;

use anyhow::{Context, Result};

use ottopie_lib::task::{Interval, TaskConfig};

use super::{Session, absolute};
use crate::output::{print_stat, print_success, print_warning};

pub fn cmd_add(
  tasks_file: Option<PathBuf>,
  plugin: PathBuf,
  src: PathBuf,
  tgt: PathBuf,
  interval: Interval,
) -> Result<()> {
  let session = Session::open(tasks_file)?;
  let config = TaskConfig::new(absolute(&plugin)?, absolute(&src)?, absolute(&tgt)?, interval);

  let task = session.registry.add_task(config).context("Failed to add task")?;
  let index = session.registry.list().len();

  print_success(&format!("Added task #{index}: {}", task.label()));
  print_stat("Every", &interval.to_string());
  if task.plugin_info().is_none() {
    print_warning("Plugin did not load; the task will not start until it does");
  }
  Ok(())
}
