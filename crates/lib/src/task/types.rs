use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recurrence period, kept in the four fields users enter it as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interval {
  pub days: u32,
  pub hours: u32,
  pub minutes: u32,
  pub seconds: u32,
}

impl Interval {
  pub fn new(days: u32, hours: u32, minutes: u32, seconds: u32) -> Self {
    Self {
      days,
      hours,
      minutes,
      seconds,
    }
  }

  /// Split a number of seconds into days/hours/minutes/seconds.
  pub fn from_secs(total: u64) -> Self {
    let days = u32::try_from(total / 86_400).unwrap_or(u32::MAX);
    let rest = total % 86_400;
    Self::new(days, (rest / 3600) as u32, ((rest % 3600) / 60) as u32, (rest % 60) as u32)
  }

  pub fn total_secs(&self) -> u64 {
    u64::from(self.days) * 86_400 + u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
  }

  pub fn period(&self) -> Duration {
    Duration::from_secs(self.total_secs())
  }
}

impl fmt::Display for Interval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts = [
      (self.days, "d"),
      (self.hours, "h"),
      (self.minutes, "m"),
      (self.seconds, "s"),
    ];
    let mut wrote = false;
    for (value, unit) in parts.into_iter().filter(|(value, _)| *value > 0) {
      if wrote {
        write!(f, " ")?;
      }
      write!(f, "{value}{unit}")?;
      wrote = true;
    }
    if !wrote {
      write!(f, "0s")?;
    }
    Ok(())
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("plugin reference must not be blank")]
  BlankPlugin,

  #[error("source folder must not be blank")]
  BlankSrc,

  #[error("target folder must not be blank")]
  BlankTgt,

  #[error("source and target are the same folder: {}", .0.display())]
  SamePath(PathBuf),

  #[error("{} is nested inside {}", inner.display(), outer.display())]
  Nested { outer: PathBuf, inner: PathBuf },

  #[error("interval must be at least one second")]
  ZeroInterval,

  #[error("cannot resolve {}: {source}", path.display())]
  Resolve {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// One task's persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
  /// Script or package path.
  pub plugin: PathBuf,
  pub src: PathBuf,
  pub tgt: PathBuf,
  pub interval: Interval,
}

impl TaskConfig {
  pub fn new(plugin: impl Into<PathBuf>, src: impl Into<PathBuf>, tgt: impl Into<PathBuf>, interval: Interval) -> Self {
    Self {
      plugin: plugin.into(),
      src: src.into(),
      tgt: tgt.into(),
      interval,
    }
  }

  /// Reject configurations no task may be created or edited with.
  ///
  /// The containment check compares resolved paths, so `a/./b`, symlinked
  /// parents and not-yet-existing targets are all judged by where they
  /// actually point.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if is_blank(&self.plugin) {
      return Err(ConfigError::BlankPlugin);
    }
    if is_blank(&self.src) {
      return Err(ConfigError::BlankSrc);
    }
    if is_blank(&self.tgt) {
      return Err(ConfigError::BlankTgt);
    }
    if self.interval.total_secs() == 0 {
      return Err(ConfigError::ZeroInterval);
    }

    check_disjoint(&self.src, &self.tgt)
  }

  /// Human label for logs: the plugin's file name.
  pub fn label(&self) -> String {
    self
      .plugin
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.plugin.display().to_string())
  }
}

/// Fail unless `src` and `tgt` resolve to two folders neither of which
/// contains the other.
pub fn check_disjoint(src: &Path, tgt: &Path) -> Result<(), ConfigError> {
  let src = resolve(src)?;
  let tgt = resolve(tgt)?;
  if src == tgt {
    return Err(ConfigError::SamePath(src));
  }
  if tgt.starts_with(&src) {
    return Err(ConfigError::Nested { outer: src, inner: tgt });
  }
  if src.starts_with(&tgt) {
    return Err(ConfigError::Nested { outer: tgt, inner: src });
  }
  Ok(())
}

fn is_blank(path: &Path) -> bool {
  path.as_os_str().to_string_lossy().trim().is_empty()
}

/// Absolute, lexically normalized path with its longest existing prefix
/// canonicalized.
fn resolve(path: &Path) -> Result<PathBuf, ConfigError> {
  let resolve_err = |source| ConfigError::Resolve {
    path: path.to_path_buf(),
    source,
  };
  let absolute = if path.is_absolute() {
    path.to_path_buf()
  } else {
    std::env::current_dir().map_err(resolve_err)?.join(path)
  };

  let mut normalized = PathBuf::new();
  for component in absolute.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        normalized.pop();
      }
      other => normalized.push(other),
    }
  }

  let mut existing = normalized.as_path();
  let mut missing = Vec::new();
  while !existing.exists() {
    match (existing.parent(), existing.file_name()) {
      (Some(parent), Some(name)) => {
        missing.push(name.to_os_string());
        existing = parent;
      }
      _ => return Ok(normalized),
    }
  }

  let mut resolved = dunce::canonicalize(existing).map_err(resolve_err)?;
  for name in missing.into_iter().rev() {
    resolved.push(name);
  }
  Ok(resolved)
}

/// Process-local task identifier. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
  pub(crate) fn next() -> Self {
    Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
  }

  pub fn get(&self) -> u64 {
    self.0
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  Stopped,
  Running,
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskStatus::Stopped => write!(f, "stopped"),
      TaskStatus::Running => write!(f, "running"),
    }
  }
}

/// Result of one finished invocation. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
  pub started_at: u64,
  pub finished_at: u64,
  pub outcome: Result<String, String>,
}

impl RunRecord {
  pub fn is_ok(&self) -> bool {
    self.outcome.is_ok()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
  Loaded { plugin: String, identity: String },
  LoadFailed { error: String },
  Started { period_secs: u64 },
  StartRefused,
  Stopped,
  Skipped,
  Completed { status: String },
  Failed { error: String },
  Edited,
  Removed,
}

/// One line of a task's presentation-facing log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEvent {
  pub task: TaskId,
  /// File name of the task's plugin.
  pub label: String,
  pub at: u64,
  #[serde(flatten)]
  pub kind: EventKind,
}

impl fmt::Display for TaskEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] ", self.label)?;
    match &self.kind {
      EventKind::Loaded { plugin, .. } => write!(f, "loaded plugin {plugin}"),
      EventKind::LoadFailed { error } => write!(f, "failed to load plugin: {error}"),
      EventKind::Started { period_secs } => write!(f, "started, every {}", Interval::from_secs(*period_secs)),
      EventKind::StartRefused => write!(f, "cannot start: no plugin loaded"),
      EventKind::Stopped => write!(f, "stopped"),
      EventKind::Skipped => write!(f, "previous run still in progress, skipped"),
      EventKind::Completed { status } => write!(f, "{status}"),
      EventKind::Failed { error } => write!(f, "run failed: {error}"),
      EventKind::Edited => write!(f, "configuration updated"),
      EventKind::Removed => write!(f, "removed"),
    }
  }
}
