use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tally of what one mirror pass did.
///
/// `copied + updated + skipped` equals the number of non-directory source
/// entries visited; `deleted` counts target entries that had no source
/// counterpart (a pruned directory counts once).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounters {
  pub copied: u64,
  pub updated: u64,
  pub deleted: u64,
  pub skipped: u64,
}

impl SyncCounters {
  /// True when the pass left the target untouched.
  pub fn is_noop(&self) -> bool {
    self.copied == 0 && self.updated == 0 && self.deleted == 0
  }

  /// Number of source-side entries the pass visited.
  pub fn visited(&self) -> u64 {
    self.copied + self.updated + self.skipped
  }
}

impl std::fmt::Display for SyncCounters {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "copied {}, updated {}, deleted {}, skipped {}",
      self.copied, self.updated, self.deleted, self.skipped
    )
  }
}

/// Errors raised while mirroring a directory tree.
///
/// A failure aborts the pass immediately; whatever was already copied or
/// pruned stays on disk and the next pass picks up the remainder.
#[derive(Debug, Error)]
pub enum SyncError {
  #[error("source directory does not exist: {}", .0.display())]
  SourceMissing(PathBuf),

  #[error("{op} failed for {}: {source}", path.display())]
  Io {
    op: &'static str,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl SyncError {
  pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| SyncError::Io { op, path, source }
  }
}
