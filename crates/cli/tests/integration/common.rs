//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the task snapshot,
/// plugins and the folders they sync.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Absolute path of `relative` inside the environment.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Copy a fixture plugin into the environment.
  pub fn plugin(&self, fixture: &str) -> PathBuf {
    let path = self.path(fixture);
    std::fs::copy(fixture_path(fixture), &path).unwrap();
    path
  }

  pub fn mkdir(&self, relative: &str) -> PathBuf {
    let path = self.path(relative);
    std::fs::create_dir_all(&path).unwrap();
    path
  }

  pub fn tasks_file(&self) -> PathBuf {
    self.path("config/tasks.json")
  }

  /// Get a pre-configured Command for the ottopie binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `OTTOPIE_TASKS_FILE`: snapshot inside the temp directory
  /// - `OTTOPIE_HOME`: config directory inside the temp directory
  pub fn ottopie_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("ottopie");
    cmd.env("OTTOPIE_TASKS_FILE", self.tasks_file());
    cmd.env("OTTOPIE_HOME", self.path("config"));
    cmd.current_dir(self.temp.path());
    cmd
  }

  /// Add a task and assert success.
  pub fn add_task(&self, plugin: &Path, src: &str, tgt: &str) {
    self
      .ottopie_cmd()
      .arg("add")
      .arg("--plugin")
      .arg(plugin)
      .arg("--src")
      .arg(self.path(src))
      .arg("--tgt")
      .arg(self.path(tgt))
      .arg("--seconds")
      .arg("30")
      .assert()
      .success();
  }

  /// Parsed output of `list --json`.
  pub fn list_json(&self) -> Vec<serde_json::Value> {
    let output = self.ottopie_cmd().args(["list", "--json"]).output().unwrap();
    assert!(output.status.success(), "list failed: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
  }
}
