//! On-disk task configuration snapshot.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "tasks": [
//!     {
//!       "plugin": "/home/me/plugins/folder_sync.lua",
//!       "src": "/home/me/photos",
//!       "tgt": "/mnt/backup/photos",
//!       "interval": { "days": 0, "hours": 1, "minutes": 0, "seconds": 0 }
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::platform::paths::tasks_file;
use crate::task::TaskConfig;
use crate::util::lock;

/// Current snapshot format version.
pub const TASKS_FILE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed task file {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to serialize tasks: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported task file version {0}")]
  UnsupportedVersion(u32),
}

#[derive(Deserialize)]
struct TasksFile {
  version: u32,
  #[serde(default)]
  tasks: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct TasksFileRef<'a> {
  version: u32,
  tasks: &'a [TaskConfig],
}

/// Reads and atomically rewrites the task snapshot.
#[derive(Debug)]
pub struct ConfigStore {
  path: PathBuf,
  write_lock: Mutex<()>,
}

impl ConfigStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      write_lock: Mutex::new(()),
    }
  }

  /// Store at the platform default location.
  pub fn default_store() -> Self {
    Self::new(tasks_file())
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Raw task entries in stored order. A missing file is an empty snapshot.
  ///
  /// Entries are returned undecoded so that one bad record does not hide
  /// the others.
  pub fn load_entries(&self) -> Result<Vec<serde_json::Value>, PersistError> {
    let content = match fs::read_to_string(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(PersistError::Read {
          path: self.path.clone(),
          source,
        });
      }
    };

    let file: TasksFile = serde_json::from_str(&content).map_err(|source| PersistError::Parse {
      path: self.path.clone(),
      source,
    })?;
    if file.version != TASKS_FILE_VERSION {
      return Err(PersistError::UnsupportedVersion(file.version));
    }
    Ok(file.tasks)
  }

  /// Overwrite the snapshot with `configs`.
  ///
  /// The content goes to a temporary file in the same directory which is
  /// then renamed over the old snapshot.
  pub fn save(&self, configs: &[TaskConfig]) -> Result<(), PersistError> {
    let _guard = lock(&self.write_lock);

    let write_err = |source: io::Error| PersistError::Write {
      path: self.path.clone(),
      source,
    };
    let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      Some(dir) => dir.to_path_buf(),
      None => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(write_err)?;

    let content = serde_json::to_string_pretty(&TasksFileRef {
      version: TASKS_FILE_VERSION,
      tasks: configs,
    })
    .map_err(PersistError::Serialize)?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    temp.write_all(content.as_bytes()).map_err(write_err)?;
    temp.write_all(b"\n").map_err(write_err)?;
    temp.persist(&self.path).map_err(|e| write_err(e.error))?;

    debug!(path = %self.path.display(), tasks = configs.len(), "saved task snapshot");
    Ok(())
  }
}
