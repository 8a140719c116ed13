//! The set of configured tasks and their persistence.
//!
//! The registry owns every [`TaskRuntime`], routes lifecycle operations to
//! them and rewrites the snapshot after every mutation. Snapshot failures
//! during a mutation are logged; the in-memory state stays authoritative.

mod store;

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub use store::{ConfigStore, PersistError, TASKS_FILE_VERSION};

use crate::plugin::{LoadError, LuaLoader, PluginInfo, PluginLoader};
use crate::task::{ConfigError, EventKind, TaskConfig, TaskEvent, TaskId, TaskRuntime};
use crate::util::lock;

/// Capacity of the shared event channel. Slow subscribers skip ahead.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("invalid task configuration: {0}")]
  Config(#[from] ConfigError),

  #[error("no task with id {0}")]
  NotFound(TaskId),

  #[error(transparent)]
  Load(#[from] LoadError),
}

/// A snapshot entry that could not be restored as-is.
#[derive(Debug, Clone)]
pub struct RestoreFailure {
  /// Position in the snapshot, zero based.
  pub index: usize,
  /// Set when a task was still created, just without a usable plugin.
  pub task: Option<TaskId>,
  pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
  pub restored: usize,
  pub failures: Vec<RestoreFailure>,
}

pub struct Registry {
  tasks: Mutex<Vec<TaskRuntime>>,
  store: ConfigStore,
  loader: Arc<dyn PluginLoader>,
  handle: Handle,
  events: broadcast::Sender<TaskEvent>,
}

impl Registry {
  pub fn new(store: ConfigStore, loader: Arc<dyn PluginLoader>, handle: Handle) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      tasks: Mutex::new(Vec::new()),
      store,
      loader,
      handle,
      events,
    }
  }

  /// Registry loading plugins with [`LuaLoader`].
  pub fn with_lua(store: ConfigStore, handle: Handle) -> Self {
    Self::new(store, Arc::new(LuaLoader::new()), handle)
  }

  pub fn store(&self) -> &ConfigStore {
    &self.store
  }

  fn create(&self, config: TaskConfig) -> (TaskRuntime, Option<LoadError>) {
    let task = TaskRuntime::new(config, self.loader.clone(), self.handle.clone(), self.events.clone());
    let load_error = task.reload().err();
    (task, load_error)
  }

  /// Validate, create and load a new stopped task.
  ///
  /// A plugin that fails to load does not prevent creation; the task simply
  /// cannot start until reloaded.
  pub fn add_task(&self, config: TaskConfig) -> Result<TaskRuntime, RegistryError> {
    config.validate()?;
    let (task, _) = self.create(config);
    lock(&self.tasks).push(task.clone());
    info!(task = %task.id(), plugin = %task.label(), "task added");
    self.persist_logged();
    Ok(task)
  }

  /// Stop the task, release its plugin and forget it.
  pub fn remove_task(&self, id: TaskId) -> Result<TaskConfig, RegistryError> {
    let task = {
      let mut tasks = lock(&self.tasks);
      let index = tasks
        .iter()
        .position(|t| t.id() == id)
        .ok_or(RegistryError::NotFound(id))?;
      tasks.remove(index)
    };
    task.shutdown();
    task.emit(EventKind::Removed);
    info!(task = %id, "task removed");
    self.persist_logged();
    Ok(task.config())
  }

  /// Replace a task's configuration and reload its plugin.
  ///
  /// An invalid `config` leaves the task untouched. The task ends up
  /// stopped either way.
  pub fn edit_task(&self, id: TaskId, config: TaskConfig) -> Result<TaskRuntime, RegistryError> {
    config.validate()?;
    let task = self.get(id).ok_or(RegistryError::NotFound(id))?;
    // Load failures are already logged and emitted by the task.
    let _ = task.edit(config);
    info!(task = %id, "task edited");
    self.persist_logged();
    Ok(task)
  }

  /// Tasks in creation order.
  pub fn list(&self) -> Vec<TaskRuntime> {
    lock(&self.tasks).clone()
  }

  pub fn get(&self, id: TaskId) -> Option<TaskRuntime> {
    lock(&self.tasks).iter().find(|t| t.id() == id).cloned()
  }

  pub fn start(&self, id: TaskId) -> Result<bool, RegistryError> {
    Ok(self.get(id).ok_or(RegistryError::NotFound(id))?.start())
  }

  pub fn stop(&self, id: TaskId) -> Result<bool, RegistryError> {
    Ok(self.get(id).ok_or(RegistryError::NotFound(id))?.stop())
  }

  pub fn reload(&self, id: TaskId) -> Result<PluginInfo, RegistryError> {
    Ok(self.get(id).ok_or(RegistryError::NotFound(id))?.reload()?)
  }

  /// Start every task that has a plugin; returns how many are running.
  pub fn start_all(&self) -> usize {
    self.list().iter().filter(|task| task.start()).count()
  }

  pub fn stop_all(&self) {
    for task in self.list() {
      task.stop();
    }
  }

  /// Events of every task.
  pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
    self.events.subscribe()
  }

  /// Write every task's configuration to the snapshot.
  pub fn persist(&self) -> Result<(), PersistError> {
    let configs: Vec<TaskConfig> = self.list().iter().map(TaskRuntime::config).collect();
    self.store.save(&configs)
  }

  fn persist_logged(&self) {
    if let Err(e) = self.persist() {
      error!(path = %self.store.path().display(), error = %e, "failed to save tasks");
    }
  }

  /// Rebuild the task set from the snapshot, all stopped.
  ///
  /// Existing tasks are shut down first. Entries that do not decode or do
  /// not validate are skipped; entries whose plugin fails to load are kept
  /// without a unit. Both are listed in the report.
  pub fn restore(&self) -> Result<RestoreReport, PersistError> {
    let entries = self.store.load_entries()?;

    let previous = std::mem::take(&mut *lock(&self.tasks));
    for task in previous {
      task.shutdown();
    }

    let mut report = RestoreReport::default();
    let mut restored = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
      let config = match serde_json::from_value::<TaskConfig>(entry) {
        Ok(config) => config,
        Err(e) => {
          warn!(index, error = %e, "skipping malformed task entry");
          report.failures.push(RestoreFailure {
            index,
            task: None,
            error: e.to_string(),
          });
          continue;
        }
      };
      if let Err(e) = config.validate() {
        warn!(index, error = %e, "skipping invalid task entry");
        report.failures.push(RestoreFailure {
          index,
          task: None,
          error: e.to_string(),
        });
        continue;
      }

      let (task, load_error) = self.create(config);
      if let Some(e) = load_error {
        report.failures.push(RestoreFailure {
          index,
          task: Some(task.id()),
          error: e.to_string(),
        });
      }
      restored.push(task);
    }

    report.restored = restored.len();
    *lock(&self.tasks) = restored;
    info!(
      path = %self.store.path().display(),
      restored = report.restored,
      failures = report.failures.len(),
      "tasks restored"
    );
    Ok(report)
  }

  /// Stop every task and release every plugin.
  pub fn shutdown(&self) {
    for task in self.list() {
      task.shutdown();
    }
  }
}
