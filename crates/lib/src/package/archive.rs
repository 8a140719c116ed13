//! Zip container handling for plugin packages.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::MANIFEST_FILE;
use super::manifest::{ManifestError, PluginManifest};

/// Local file header signature every zip archive starts with.
const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("io error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid archive {}: {source}", path.display())]
  Zip {
    path: PathBuf,
    #[source]
    source: ZipError,
  },

  #[error("archive entry `{entry}` escapes the extraction directory")]
  UnsafePath { entry: String },

  #[error("archive {} has no {MANIFEST_FILE}", .0.display())]
  ManifestMissing(PathBuf),

  #[error(transparent)]
  Manifest(#[from] ManifestError),
}

impl ArchiveError {
  fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
    move |source| ArchiveError::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  fn zip(path: &Path) -> impl FnOnce(ZipError) -> Self + '_ {
    move |source| ArchiveError::Zip {
      path: path.to_path_buf(),
      source,
    }
  }
}

/// Whether `path` is a zip container, judged by its leading bytes rather
/// than its extension.
pub fn is_package(path: &Path) -> io::Result<bool> {
  let mut magic = [0u8; 4];
  let mut file = File::open(path)?;
  match file.read_exact(&mut magic) {
    Ok(()) => Ok(magic == ZIP_MAGIC),
    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
    Err(e) => Err(e),
  }
}

fn open(archive_path: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
  let file = File::open(archive_path).map_err(ArchiveError::io(archive_path))?;
  ZipArchive::new(BufReader::new(file)).map_err(ArchiveError::zip(archive_path))
}

/// Unpack every entry of `archive_path` below `dest`.
///
/// Entries whose names would land outside `dest` abort the extraction.
pub fn extract(archive_path: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let mut archive = open(archive_path)?;

  for index in 0..archive.len() {
    let mut entry = archive.by_index(index).map_err(ArchiveError::zip(archive_path))?;
    let relative = entry.enclosed_name().ok_or_else(|| ArchiveError::UnsafePath {
      entry: entry.name().to_string(),
    })?;
    let out_path = dest.join(relative);

    if entry.is_dir() {
      fs::create_dir_all(&out_path).map_err(ArchiveError::io(&out_path))?;
      continue;
    }

    if let Some(parent) = out_path.parent() {
      fs::create_dir_all(parent).map_err(ArchiveError::io(parent))?;
    }
    let mut out = File::create(&out_path).map_err(ArchiveError::io(&out_path))?;
    io::copy(&mut entry, &mut out).map_err(ArchiveError::io(&out_path))?;
  }

  debug!(archive = %archive_path.display(), dest = %dest.display(), entries = archive.len(), "extracted package");
  Ok(())
}

/// Read and validate the manifest straight out of an archive.
pub fn read_manifest(archive_path: &Path) -> Result<PluginManifest, ArchiveError> {
  let mut archive = open(archive_path)?;
  let mut entry = match archive.by_name(MANIFEST_FILE) {
    Ok(entry) => entry,
    Err(ZipError::FileNotFound) => return Err(ArchiveError::ManifestMissing(archive_path.to_path_buf())),
    Err(e) => return Err(ArchiveError::zip(archive_path)(e)),
  };

  let mut content = Vec::new();
  entry.read_to_end(&mut content).map_err(ArchiveError::io(archive_path))?;
  Ok(PluginManifest::from_slice(&content)?)
}

/// Compress the contents of `root` into a new archive at `output`.
///
/// Entry names are relative to `root` and use `/` separators.
pub fn write_dir(root: &Path, output: &Path) -> Result<usize, ArchiveError> {
  let file = File::create(output).map_err(ArchiveError::io(output))?;
  let mut writer = ZipWriter::new(file);
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  let mut written = 0;

  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| ArchiveError::Io {
      path: root.to_path_buf(),
      source: e.into(),
    })?;
    let relative = entry.path().strip_prefix(root).map_err(|_| ArchiveError::UnsafePath {
      entry: entry.path().display().to_string(),
    })?;
    let name = zip_name(relative);

    if entry.file_type().is_dir() {
      writer.add_directory(name, options).map_err(ArchiveError::zip(output))?;
      continue;
    }

    writer.start_file(name, options).map_err(ArchiveError::zip(output))?;
    let mut source = File::open(entry.path()).map_err(ArchiveError::io(entry.path()))?;
    io::copy(&mut source, &mut writer).map_err(ArchiveError::io(entry.path()))?;
    written += 1;
  }

  writer.finish().map_err(ArchiveError::zip(output))?;
  Ok(written)
}

fn zip_name(relative: &Path) -> String {
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("/")
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::TempDir;

  fn zip_with(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
      writer.start_file(*name, SimpleFileOptions::default()).unwrap();
      writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
  }

  #[test]
  fn detects_zip_by_content() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("plugin.bin");
    zip_with(&archive, &[("a.txt", "a")]);
    let script = temp.path().join("plugin.ottopie");
    fs::write(&script, "function run(p) return 'ok' end").unwrap();
    let tiny = temp.path().join("tiny");
    fs::write(&tiny, "PK").unwrap();

    assert!(is_package(&archive).unwrap());
    assert!(!is_package(&script).unwrap());
    assert!(!is_package(&tiny).unwrap());
  }

  #[test]
  fn write_then_extract_preserves_layout() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("stage");
    fs::create_dir_all(root.join("vendor/lib")).unwrap();
    fs::write(root.join("main.lua"), "-- main").unwrap();
    fs::write(root.join("vendor/lib/util.lua"), "-- util").unwrap();
    let output = temp.path().join("out.ottopie");

    let written = write_dir(&root, &output).unwrap();
    assert_eq!(written, 2);

    let dest = temp.path().join("dest");
    extract(&output, &dest).unwrap();
    assert_eq!(fs::read_to_string(dest.join("main.lua")).unwrap(), "-- main");
    assert_eq!(fs::read_to_string(dest.join("vendor/lib/util.lua")).unwrap(), "-- util");
  }

  #[test]
  fn extract_rejects_escaping_entries() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("evil.zip");
    zip_with(&archive, &[("../escape.txt", "x")]);

    let err = extract(&archive, &temp.path().join("dest")).unwrap_err();
    assert!(matches!(err, ArchiveError::UnsafePath { .. }));
    assert!(!temp.path().join("escape.txt").exists());
  }

  #[test]
  fn read_manifest_reports_missing_manifest() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("p.ottopie");
    zip_with(&archive, &[("main.lua", "")]);

    assert!(matches!(read_manifest(&archive), Err(ArchiveError::ManifestMissing(_))));
  }

  #[test]
  fn read_manifest_parses_manifest() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("p.ottopie");
    let manifest = r#"{"name":"p","version":"2.0.0","entry_point":"main.lua","description":"demo"}"#;
    zip_with(&archive, &[(MANIFEST_FILE, manifest), ("main.lua", "")]);

    let parsed = read_manifest(&archive).unwrap();
    assert_eq!(parsed.version, "2.0.0");
    assert_eq!(parsed.description, "demo");
  }

  #[test]
  fn read_manifest_rejects_non_utf8_manifest() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("p.ottopie");
    let mut writer = ZipWriter::new(File::create(&archive).unwrap());
    writer.start_file(MANIFEST_FILE, SimpleFileOptions::default()).unwrap();
    writer.write_all(b"\xff\xfe").unwrap();
    writer.finish().unwrap();

    assert!(matches!(
      read_manifest(&archive),
      Err(ArchiveError::Manifest(ManifestError::Parse(_)))
    ));
  }

  #[test]
  fn garbage_is_not_an_archive() {
    let temp = TempDir::new().unwrap();
    let bogus = temp.path().join("bogus.ottopie");
    fs::write(&bogus, "PK\x03\x04 definitely not a zip").unwrap();

    assert!(matches!(
      extract(&bogus, &temp.path().join("d")),
      Err(ArchiveError::Zip { .. })
    ));
  }
}
