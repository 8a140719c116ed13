//! In-process plugin doubles for scheduler tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use crate::plugin::{LoadError, PluginInfo, PluginLoader, PluginOrigin, PluginUnit, RunError, RunParams, Runnable};
use crate::task::{Interval, TaskConfig};

/// Loader backed by a closure.
pub struct FnLoader<F>(pub F);

impl<F> PluginLoader for FnLoader<F>
where
  F: Fn(&Path) -> Result<PluginUnit, LoadError> + Send + Sync,
{
  fn load(&self, reference: &Path) -> Result<PluginUnit, LoadError> {
    (self.0)(reference)
  }
}

/// Runnable backed by a closure.
pub struct FnRunnable<F>(pub F);

impl<F> Runnable for FnRunnable<F>
where
  F: Fn(&RunParams) -> Result<String, RunError> + Send + Sync,
{
  fn run(&self, params: &RunParams) -> Result<String, RunError> {
    (self.0)(params)
  }
}

pub fn info_for(reference: &Path) -> PluginInfo {
  PluginInfo {
    name: reference
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_default(),
    version: None,
    description: None,
    origin: PluginOrigin::Script,
    entry: reference.to_path_buf(),
    digest: String::new(),
    identity: format!("test:{}", reference.display()),
  }
}

/// Loader whose units answer every run with `status`.
pub fn static_loader(status: &'static str) -> Arc<dyn PluginLoader> {
  Arc::new(FnLoader(move |reference: &Path| -> Result<PluginUnit, LoadError> {
    Ok(PluginUnit::new(
      Box::new(FnRunnable(move |_: &RunParams| -> Result<String, RunError> { Ok(status.to_string()) })),
      info_for(reference),
      None,
    ))
  }))
}

/// Loader whose units fail every run with `message`.
pub fn erroring_loader(message: &'static str) -> Arc<dyn PluginLoader> {
  Arc::new(FnLoader(move |reference: &Path| -> Result<PluginUnit, LoadError> {
    Ok(PluginUnit::new(
      Box::new(FnRunnable(move |_: &RunParams| -> Result<String, RunError> {
        Err(RunError::Plugin(message.to_string()))
      })),
      info_for(reference),
      None,
    ))
  }))
}

/// Loader that fails every load.
pub fn failing_loader() -> Arc<dyn PluginLoader> {
  Arc::new(FnLoader(|reference: &Path| -> Result<PluginUnit, LoadError> {
    Err(LoadError::NotFound(reference.to_path_buf()))
  }))
}

/// A plugin whose runs block until released, counting calls and the highest
/// number of runs seen in flight at once.
pub struct Gate {
  release: Mutex<Sender<()>>,
  pub calls: Arc<AtomicUsize>,
  pub max_in_flight: Arc<AtomicUsize>,
}

impl Gate {
  pub fn new() -> (Self, Arc<dyn PluginLoader>) {
    let (tx, rx) = channel::<()>();
    let rx = Arc::new(Mutex::new(rx));
    let calls = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));

    let loader = {
      let calls = calls.clone();
      let max_in_flight = max_in_flight.clone();
      Arc::new(FnLoader(move |reference: &Path| -> Result<PluginUnit, LoadError> {
        let rx: Arc<Mutex<Receiver<()>>> = rx.clone();
        let calls = calls.clone();
        let max_in_flight = max_in_flight.clone();
        let in_flight = in_flight.clone();
        let runnable = FnRunnable(move |_: &RunParams| -> Result<String, RunError> {
          calls.fetch_add(1, Ordering::SeqCst);
          let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
          max_in_flight.fetch_max(now, Ordering::SeqCst);
          let _ = rx.lock().unwrap().recv();
          in_flight.fetch_sub(1, Ordering::SeqCst);
          Ok("released".to_string())
        });
        Ok(PluginUnit::new(Box::new(runnable), info_for(reference), None))
      })) as Arc<dyn PluginLoader>
    };

    (
      Self {
        release: Mutex::new(tx),
        calls,
        max_in_flight,
      },
      loader,
    )
  }

  /// Let one blocked run finish.
  pub fn open(&self) {
    let _ = self.release.lock().unwrap().send(());
  }
}

/// A valid config rooted in `dir` with the given period in seconds.
pub fn config_in(dir: &Path, plugin: impl Into<PathBuf>, seconds: u32) -> TaskConfig {
  TaskConfig::new(plugin, dir.join("src"), dir.join("tgt"), Interval::new(0, 0, 0, seconds))
}
