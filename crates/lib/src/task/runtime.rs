//! Per-task scheduling and invocation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use super::types::{EventKind, RunRecord, TaskConfig, TaskEvent, TaskId, TaskStatus};
use crate::plugin::{LoadError, PluginInfo, PluginLoader, PluginUnit, RunError, RunParams};
use crate::util::{lock, unix_now};

/// Outcome of a single timer firing.
#[derive(Debug)]
pub enum Firing {
  /// The run was handed to the blocking pool; the handle resolves when it
  /// finishes.
  Dispatched(JoinHandle<()>),
  /// A previous run was still in flight.
  Skipped,
}

/// Handle to one task's runtime state. Clones share the same task.
#[derive(Clone)]
pub struct TaskRuntime {
  inner: Arc<Inner>,
}

struct Inner {
  id: TaskId,
  loader: Arc<dyn PluginLoader>,
  handle: Handle,
  events: broadcast::Sender<TaskEvent>,
  config: Mutex<TaskConfig>,
  unit: Mutex<Option<Arc<PluginUnit>>>,
  executing: AtomicBool,
  idle_lock: Mutex<()>,
  idle: Condvar,
  ticker: Mutex<Option<JoinHandle<()>>>,
  last_result: Mutex<Option<RunRecord>>,
}

impl Drop for Inner {
  fn drop(&mut self) {
    let ticker = self.ticker.get_mut().unwrap_or_else(PoisonError::into_inner);
    if let Some(ticker) = ticker.take() {
      ticker.abort();
    }
  }
}

/// Holds the executing flag; clears it when dropped.
struct Executing(Arc<Inner>);

impl Executing {
  fn claim(inner: &Arc<Inner>) -> Option<Self> {
    inner
      .executing
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Executing(inner.clone()))
  }

  /// Block until the flag is free, then take it.
  fn wait(inner: &Arc<Inner>) -> Self {
    let mut idle = lock(&inner.idle_lock);
    loop {
      if let Some(guard) = Self::claim(inner) {
        return guard;
      }
      idle = inner.idle.wait(idle).unwrap_or_else(PoisonError::into_inner);
    }
  }
}

impl Drop for Executing {
  fn drop(&mut self) {
    self.0.executing.store(false, Ordering::Release);
    let _idle = lock(&self.0.idle_lock);
    self.0.idle.notify_all();
  }
}

impl TaskRuntime {
  /// Create a stopped task without loading its plugin.
  pub fn new(
    config: TaskConfig,
    loader: Arc<dyn PluginLoader>,
    handle: Handle,
    events: broadcast::Sender<TaskEvent>,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        id: TaskId::next(),
        loader,
        handle,
        events,
        config: Mutex::new(config),
        unit: Mutex::new(None),
        executing: AtomicBool::new(false),
        idle_lock: Mutex::new(()),
        idle: Condvar::new(),
        ticker: Mutex::new(None),
        last_result: Mutex::new(None),
      }),
    }
  }

  pub fn id(&self) -> TaskId {
    self.inner.id
  }

  pub fn config(&self) -> TaskConfig {
    lock(&self.inner.config).clone()
  }

  pub fn label(&self) -> String {
    lock(&self.inner.config).label()
  }

  pub fn status(&self) -> TaskStatus {
    if lock(&self.inner.ticker).is_some() {
      TaskStatus::Running
    } else {
      TaskStatus::Stopped
    }
  }

  pub fn is_executing(&self) -> bool {
    self.inner.executing.load(Ordering::Acquire)
  }

  pub fn last_result(&self) -> Option<RunRecord> {
    lock(&self.inner.last_result).clone()
  }

  /// Info of the loaded plugin, `None` while the task has no usable unit.
  pub fn plugin_info(&self) -> Option<PluginInfo> {
    lock(&self.inner.unit).as_ref().map(|unit| unit.info().clone())
  }

  /// Events of this task only.
  pub fn subscribe(&self) -> TaskEvents {
    TaskEvents {
      task: self.inner.id,
      rx: self.inner.events.subscribe(),
    }
  }

  pub(crate) fn emit(&self, kind: EventKind) {
    let event = TaskEvent {
      task: self.inner.id,
      label: self.label(),
      at: unix_now(),
      kind,
    };
    // Nobody listening is fine.
    let _ = self.inner.events.send(event);
  }

  /// Replace the plugin unit with a fresh load of the configured reference.
  ///
  /// Blocks until an in-flight run returns, so the previous unit and its
  /// extraction directory are gone before the new unit is loaded. Firings
  /// that land meanwhile are skipped. On failure the task is left without a
  /// unit and, if it was running, stopped.
  pub fn reload(&self) -> Result<PluginInfo, LoadError> {
    let _guard = Executing::wait(&self.inner);
    self.release_unit();
    let reference = lock(&self.inner.config).plugin.clone();

    match self.inner.loader.load(&reference) {
      Ok(unit) => {
        let info = unit.info().clone();
        *lock(&self.inner.unit) = Some(Arc::new(unit));
        debug!(task = %self.id(), plugin = %info.name, "plugin unit installed");
        self.emit(EventKind::Loaded {
          plugin: info.name.clone(),
          identity: info.identity.clone(),
        });
        Ok(info)
      }
      Err(e) => {
        warn!(task = %self.id(), plugin = %reference.display(), error = %e, "failed to load plugin");
        self.emit(EventKind::LoadFailed { error: e.to_string() });
        self.stop();
        Err(e)
      }
    }
  }

  fn release_unit(&self) {
    let Some(unit) = lock(&self.inner.unit).take() else {
      return;
    };
    match Arc::try_unwrap(unit) {
      Ok(unit) => {
        let name = unit.info().name.clone();
        if let Err(e) = unit.release() {
          warn!(task = %self.id(), plugin = %name, error = %e, "failed to remove plugin directory");
        }
      }
      // Only reachable from shutdown: the in-flight run holds the last
      // reference and drops the unit, directory included, when it returns.
      Err(_) => debug!(task = %self.id(), "plugin still running, release deferred"),
    }
  }

  /// Begin periodic invocation. The first firing happens one full period
  /// from now.
  ///
  /// Returns `false`, leaving the task stopped, when no plugin is loaded.
  pub fn start(&self) -> bool {
    if lock(&self.inner.unit).is_none() {
      warn!(task = %self.id(), "cannot start task without a loaded plugin");
      self.emit(EventKind::StartRefused);
      return false;
    }

    let mut ticker = lock(&self.inner.ticker);
    if ticker.is_some() {
      return true;
    }

    let period = lock(&self.inner.config).interval.period().max(Duration::from_secs(1));
    let weak: Weak<Inner> = Arc::downgrade(&self.inner);
    *ticker = Some(self.inner.handle.spawn(async move {
      let mut interval = interval_at(Instant::now() + period, period);
      interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
      loop {
        interval.tick().await;
        let Some(inner) = weak.upgrade() else {
          break;
        };
        TaskRuntime { inner }.fire();
      }
    }));
    drop(ticker);

    info!(task = %self.id(), period_secs = period.as_secs(), "task started");
    self.emit(EventKind::Started {
      period_secs: period.as_secs(),
    });
    true
  }

  /// Cancel future firings. A run already in progress is left to finish.
  pub fn stop(&self) -> bool {
    let Some(ticker) = lock(&self.inner.ticker).take() else {
      return false;
    };
    ticker.abort();
    info!(task = %self.id(), "task stopped");
    self.emit(EventKind::Stopped);
    true
  }

  /// One scheduled firing: run in the background unless a run is already in
  /// flight, in which case this firing is dropped.
  pub fn fire(&self) -> Firing {
    let Some(guard) = Executing::claim(&self.inner) else {
      warn!(task = %self.id(), "previous run still in progress, skipping this firing");
      self.emit(EventKind::Skipped);
      return Firing::Skipped;
    };

    let task = self.clone();
    let handle = self.inner.handle.spawn_blocking(move || {
      let _guard = guard;
      let _ = task.invoke();
    });
    Firing::Dispatched(handle)
  }

  /// Run the plugin on the calling thread.
  pub fn run_now(&self) -> Result<String, RunError> {
    let Some(_guard) = Executing::claim(&self.inner) else {
      return Err(RunError::Busy);
    };
    self.invoke()
  }

  /// Caller must hold the executing flag.
  fn invoke(&self) -> Result<String, RunError> {
    let unit = lock(&self.inner.unit).clone();
    let params = {
      let config = lock(&self.inner.config);
      RunParams::new(config.src.to_string_lossy(), config.tgt.to_string_lossy())
    };

    let started_at = unix_now();
    let outcome = match unit {
      Some(unit) => panic::catch_unwind(AssertUnwindSafe(|| unit.run(&params))).unwrap_or(Err(RunError::Panicked)),
      None => Err(RunError::NotLoaded),
    };
    let finished_at = unix_now();

    match &outcome {
      Ok(status) => {
        info!(task = %self.id(), status = %status, "run finished");
        self.emit(EventKind::Completed { status: status.clone() });
      }
      Err(e) => {
        warn!(task = %self.id(), error = %e, "run failed");
        self.emit(EventKind::Failed { error: e.to_string() });
      }
    }

    *lock(&self.inner.last_result) = Some(RunRecord {
      started_at,
      finished_at,
      outcome: outcome.clone().map_err(|e| e.to_string()),
    });
    outcome
  }

  /// Stop, swap in `config`, and reload from it. The task stays stopped.
  ///
  /// Like [`reload`](Self::reload), waits for an in-flight run to finish.
  ///
  /// `config` is expected to be validated already.
  pub fn edit(&self, config: TaskConfig) -> Result<PluginInfo, LoadError> {
    self.stop();
    *lock(&self.inner.config) = config;
    self.emit(EventKind::Edited);
    self.reload()
  }

  /// Stop and release the plugin unit.
  pub fn shutdown(&self) {
    self.stop();
    self.release_unit();
  }
}

impl std::fmt::Debug for TaskRuntime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TaskRuntime")
      .field("id", &self.inner.id)
      .field("config", &self.config())
      .field("status", &self.status())
      .finish_non_exhaustive()
  }
}

/// A task's slice of the shared event stream.
pub struct TaskEvents {
  task: TaskId,
  rx: broadcast::Receiver<TaskEvent>,
}

impl TaskEvents {
  /// Next event of this task; `None` once the stream is closed.
  pub async fn recv(&mut self) -> Option<TaskEvent> {
    loop {
      match self.rx.recv().await {
        Ok(event) if event.task == self.task => return Some(event),
        Ok(_) => {}
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          debug!(task = %self.task, missed, "event subscriber lagged");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  /// Next already-queued event of this task, without waiting.
  pub fn try_recv(&mut self) -> Option<TaskEvent> {
    loop {
      match self.rx.try_recv() {
        Ok(event) if event.task == self.task => return Some(event),
        Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
        Err(_) => return None,
      }
    }
  }
}
