//! List command implementation.
//!
//! Shows every task in the snapshot along with the plugin it loaded.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use ottopie_lib::plugin::PluginInfo;
use ottopie_lib::task::{Interval, TaskRuntime};

use super::Session;
use crate::output::{print_info, print_json, print_stat, print_warning, truncate_hash};

#[derive(Serialize)]
struct TaskEntry {
  index: usize,
  plugin: PathBuf,
  src: PathBuf,
  tgt: PathBuf,
  interval: Interval,
  interval_secs: u64,
  /// `None` when the plugin failed to load.
  loaded: Option<PluginInfo>,
}

impl TaskEntry {
  fn new(index: usize, task: &TaskRuntime) -> Self {
    let config = task.config();
    Self {
      index,
      interval_secs: config.interval.total_secs(),
      plugin: config.plugin,
      src: config.src,
      tgt: config.tgt,
      interval: config.interval,
      loaded: task.plugin_info(),
    }
  }
}

pub fn cmd_list(tasks_file: Option<PathBuf>, json: bool) -> Result<()> {
  let session = Session::open(tasks_file)?;
  let entries: Vec<_> = session
    .registry
    .list()
    .iter()
    .enumerate()
    .map(|(i, task)| TaskEntry::new(i + 1, task))
    .collect();

  if json {
    return print_json(&entries);
  }

  if entries.is_empty() {
    print_info("No tasks configured. Add one with 'ottopie add'.");
    return Ok(());
  }

  for entry in &entries {
    print_info(&format!("#{} {}", entry.index, entry.plugin.display()));
    print_stat("Source", &entry.src.display().to_string());
    print_stat("Target", &entry.tgt.display().to_string());
    print_stat("Every", &entry.interval.to_string());
    match &entry.loaded {
      Some(info) => {
        let version = info.version.as_deref().map(|v| format!(" v{v}")).unwrap_or_default();
        print_stat(
          "Plugin",
          &format!("{}{} ({}, {})", info.name, version, info.origin, truncate_hash(&info.digest)),
        );
      }
      None => print_stat("Plugin", "not loaded"),
    }
  }

  let unloaded = session.report.failures.iter().filter(|f| f.task.is_some()).count();
  if unloaded > 0 {
    println!();
    print_warning(&format!("{unloaded} task(s) have a plugin that failed to load"));
  }
  Ok(())
}
