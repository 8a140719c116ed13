//! Mirror synchronization of directory trees.
//!
//! [`sync_folders`] makes a target directory an exact replica of a source
//! directory in two phases per level:
//!
//! 1. **Propagate** - walk the source depth-first. Sub-directories recurse,
//!    files missing from the target are copied, files present on both sides are
//!    overwritten only when the source modification time is strictly newer.
//! 2. **Prune** - every target entry without a source counterpart is removed
//!    (recursively for directories).
//!
//! The pass is not transactional. An I/O error stops it where it is, and the
//! work already done stays on disk; a later pass finishes the job because the
//! algorithm is idempotent.
//!
//! # Symbolic links
//!
//! Links are never followed on either side. A source link is recreated in the
//! target with the same link text; target entries are inspected with
//! `symlink_metadata`, so a link to a directory is pruned as a link.
//!
//! # Special files
//!
//! Sockets, FIFOs and device nodes in the source are not copied. Each one
//! counts as skipped and is logged at debug level; a target entry of the same
//! name has no mirrored counterpart and is pruned. Special files found only
//! in the target are pruned like any other orphan.

mod types;

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, info};

pub use types::{SyncCounters, SyncError};

/// Mirror `src` into `tgt` and report what changed.
///
/// `tgt` (and any missing parents) is created when absent.
pub fn sync_folders(src: &Path, tgt: &Path) -> Result<SyncCounters, SyncError> {
  match fs::metadata(src) {
    Ok(meta) if meta.is_dir() => {}
    _ => return Err(SyncError::SourceMissing(src.to_path_buf())),
  }

  fs::create_dir_all(tgt).map_err(SyncError::io("create directory", tgt))?;

  let mut counters = SyncCounters::default();
  mirror_dir(src, tgt, &mut counters)?;

  info!(
    src = %src.display(),
    tgt = %tgt.display(),
    copied = counters.copied,
    updated = counters.updated,
    deleted = counters.deleted,
    skipped = counters.skipped,
    "mirror pass complete"
  );
  Ok(counters)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
  Dir,
  File,
  Link,
  Other,
}

impl EntryKind {
  fn of(meta: &fs::Metadata) -> Self {
    let ft = meta.file_type();
    if ft.is_symlink() {
      EntryKind::Link
    } else if ft.is_dir() {
      EntryKind::Dir
    } else if ft.is_file() {
      EntryKind::File
    } else {
      EntryKind::Other
    }
  }
}

fn mirror_dir(src: &Path, tgt: &Path, counters: &mut SyncCounters) -> Result<(), SyncError> {
  let mut seen: HashSet<OsString> = HashSet::new();

  for name in sorted_names(src)? {
    let src_entry = src.join(&name);
    let tgt_entry = tgt.join(&name);
    let meta = fs::symlink_metadata(&src_entry).map_err(SyncError::io("stat", &src_entry))?;

    match EntryKind::of(&meta) {
      EntryKind::Dir => {
        ensure_child_dir(&tgt_entry)?;
        mirror_dir(&src_entry, &tgt_entry, counters)?;
      }
      EntryKind::File => sync_file(&src_entry, &meta, &tgt_entry, counters)?,
      EntryKind::Link => sync_link(&src_entry, &tgt_entry, counters)?,
      EntryKind::Other => {
        debug!(path = %src_entry.display(), "not a regular file, skipped");
        counters.skipped += 1;
        continue;
      }
    }

    seen.insert(name);
  }

  for name in sorted_names(tgt)? {
    if seen.contains(&name) {
      continue;
    }
    let tgt_entry = tgt.join(&name);
    remove_entry(&tgt_entry)?;
    debug!(path = %tgt_entry.display(), "pruned");
    counters.deleted += 1;
  }

  Ok(())
}

fn sorted_names(dir: &Path) -> Result<Vec<OsString>, SyncError> {
  let read = fs::read_dir(dir).map_err(SyncError::io("read directory", dir))?;
  let mut names = Vec::new();
  for entry in read {
    let entry = entry.map_err(SyncError::io("read directory", dir))?;
    names.push(entry.file_name());
  }
  names.sort();
  Ok(names)
}

/// Make sure a nested target path is a real directory, displacing a file or
/// link that sits where the directory belongs.
fn ensure_child_dir(path: &Path) -> Result<(), SyncError> {
  match fs::symlink_metadata(path) {
    Ok(meta) if EntryKind::of(&meta) == EntryKind::Dir => Ok(()),
    Ok(_) => {
      remove_entry(path)?;
      fs::create_dir(path).map_err(SyncError::io("create directory", path))
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      fs::create_dir(path).map_err(SyncError::io("create directory", path))
    }
    Err(e) => Err(SyncError::io("stat", path)(e)),
  }
}

fn sync_file(src: &Path, src_meta: &fs::Metadata, tgt: &Path, counters: &mut SyncCounters) -> Result<(), SyncError> {
  let src_mtime = src_meta.modified().map_err(SyncError::io("read mtime", src))?;

  match fs::symlink_metadata(tgt) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      copy_file(src, tgt, src_mtime)?;
      debug!(path = %tgt.display(), "copied");
      counters.copied += 1;
    }
    Err(e) => return Err(SyncError::io("stat", tgt)(e)),
    Ok(tgt_meta) if EntryKind::of(&tgt_meta) != EntryKind::File => {
      remove_entry(tgt)?;
      copy_file(src, tgt, src_mtime)?;
      debug!(path = %tgt.display(), "replaced non-file entry");
      counters.updated += 1;
    }
    Ok(tgt_meta) => {
      let tgt_mtime = tgt_meta.modified().map_err(SyncError::io("read mtime", tgt))?;
      if src_mtime > tgt_mtime {
        copy_file(src, tgt, src_mtime)?;
        debug!(path = %tgt.display(), "updated");
        counters.updated += 1;
      } else {
        counters.skipped += 1;
      }
    }
  }

  Ok(())
}

fn sync_link(src: &Path, tgt: &Path, counters: &mut SyncCounters) -> Result<(), SyncError> {
  let link_text = fs::read_link(src).map_err(SyncError::io("read link", src))?;

  match fs::symlink_metadata(tgt) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      make_link(src, &link_text, tgt)?;
      counters.copied += 1;
    }
    Err(e) => return Err(SyncError::io("stat", tgt)(e)),
    Ok(meta) => {
      if EntryKind::of(&meta) == EntryKind::Link && fs::read_link(tgt).ok().as_deref() == Some(link_text.as_path()) {
        counters.skipped += 1;
        return Ok(());
      }
      remove_entry(tgt)?;
      make_link(src, &link_text, tgt)?;
      counters.updated += 1;
    }
  }

  debug!(path = %tgt.display(), target = %link_text.display(), "linked");
  Ok(())
}

fn copy_file(src: &Path, tgt: &Path, mtime: SystemTime) -> Result<(), SyncError> {
  fs::copy(src, tgt).map_err(SyncError::io("copy", src))?;
  stamp_mtime(tgt, mtime).map_err(SyncError::io("set mtime", tgt))
}

#[cfg(not(windows))]
fn stamp_mtime(path: &Path, mtime: SystemTime) -> io::Result<()> {
  fs::File::open(path)?.set_modified(mtime)
}

#[cfg(windows)]
fn stamp_mtime(path: &Path, mtime: SystemTime) -> io::Result<()> {
  fs::OpenOptions::new().write(true).open(path)?.set_modified(mtime)
}

#[cfg(unix)]
fn make_link(_src: &Path, link_text: &Path, tgt: &Path) -> Result<(), SyncError> {
  std::os::unix::fs::symlink(link_text, tgt).map_err(SyncError::io("create link", tgt))
}

#[cfg(windows)]
fn make_link(src: &Path, link_text: &Path, tgt: &Path) -> Result<(), SyncError> {
  let points_to_dir = fs::metadata(src).map(|m| m.is_dir()).unwrap_or(false);
  let result = if points_to_dir {
    std::os::windows::fs::symlink_dir(link_text, tgt)
  } else {
    std::os::windows::fs::symlink_file(link_text, tgt)
  };
  result.map_err(SyncError::io("create link", tgt))
}

fn remove_entry(path: &Path) -> Result<(), SyncError> {
  let meta = fs::symlink_metadata(path).map_err(SyncError::io("stat", path))?;
  if EntryKind::of(&meta) == EntryKind::Dir {
    return fs::remove_dir_all(path).map_err(SyncError::io("remove directory", path));
  }

  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    // Directory links on Windows are removed like directories.
    #[cfg(windows)]
    Err(_) if meta.file_type().is_symlink() => fs::remove_dir(path).map_err(SyncError::io("remove link", path)),
    Err(e) => Err(SyncError::io("remove file", path)(e)),
  }
}
