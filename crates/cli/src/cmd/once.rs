use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, anyhow};

use super::Session;
use crate::output::{format_duration, print_error, print_stat, print_success};

/// Run one task's plugin in the foreground, outside of its schedule.
pub fn cmd_once(tasks_file: Option<PathBuf>, index: usize) -> Result<()> {
  let session = Session::open(tasks_file)?;
  let task = session.task(index)?;

  let started = Instant::now();
  match task.run_now() {
    Ok(status) => {
      print_success(&format!("[{}] {status}", task.label()));
      print_stat("Took", &format_duration(started.elapsed()));
      Ok(())
    }
    Err(e) => {
      print_error(&format!("[{}] {e}", task.label()));
      Err(anyhow!("task #{index} failed: {e}"))
    }
  }
}
