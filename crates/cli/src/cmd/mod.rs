mod add;
mod edit;
mod init;
mod inspect;
mod list;
mod once;
mod pack;
mod remove;
mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use ottopie_lib::registry::{ConfigStore, Registry, RestoreReport};
use ottopie_lib::task::TaskRuntime;

use crate::output::print_warning;

pub use add::cmd_add;
pub use edit::{EditArgs, cmd_edit};
pub use init::cmd_init;
pub use inspect::cmd_inspect;
pub use list::cmd_list;
pub use once::cmd_once;
pub use pack::{PackArgs, cmd_pack};
pub use remove::cmd_remove;
pub use run::cmd_run;

/// A registry restored from the task snapshot, plus the runtime its
/// schedulers live on.
struct Session {
  registry: Registry,
  report: RestoreReport,
  runtime: Runtime,
}

impl Session {
  fn open(tasks_file: Option<PathBuf>) -> Result<Self> {
    let runtime = Runtime::new().context("Failed to create async runtime")?;
    let store = tasks_file.map(ConfigStore::new).unwrap_or_else(ConfigStore::default_store);
    let path = store.path().to_path_buf();
    let registry = Registry::with_lua(store, runtime.handle().clone());
    let report = registry
      .restore()
      .with_context(|| format!("Failed to read tasks from {}", path.display()))?;

    for failure in report.failures.iter().filter(|f| f.task.is_none()) {
      print_warning(&format!(
        "Ignoring unreadable task entry {} in {}: {}; it will be dropped from the file on the next change",
        failure.index + 1,
        path.display(),
        failure.error
      ));
    }

    Ok(Self {
      registry,
      report,
      runtime,
    })
  }

  /// Task by its 1-based position as shown by `list`. Unreadable snapshot
  /// entries are not counted.
  fn task(&self, index: usize) -> Result<TaskRuntime> {
    let tasks = self.registry.list();
    index
      .checked_sub(1)
      .and_then(|i| tasks.get(i).cloned())
      .with_context(|| format!("No task #{index} ({} configured)", tasks.len()))
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    self.registry.shutdown();
  }
}

/// Absolute form of a user-supplied path so the snapshot does not depend on
/// the working directory of the command that wrote it.
fn absolute(path: &Path) -> Result<PathBuf> {
  std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}
