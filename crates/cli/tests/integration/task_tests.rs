//! Task management integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn add_then_list_shows_task() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");
  env.mkdir("data");

  env.add_task(&plugin, "data", "backup");

  let tasks = env.list_json();
  assert_eq!(tasks.len(), 1);
  assert_eq!(tasks[0]["index"], 1);
  assert_eq!(tasks[0]["interval_secs"], 30);
  assert_eq!(tasks[0]["loaded"]["name"], "echo");
  assert_eq!(tasks[0]["loaded"]["origin"], "script");
  assert!(env.tasks_file().is_file());
}

#[test]
fn add_without_interval_uses_default() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");

  env
    .ottopie_cmd()
    .arg("add")
    .arg("--plugin")
    .arg(&plugin)
    .arg("--src")
    .arg(env.path("a"))
    .arg("--tgt")
    .arg(env.path("b"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Added task #1"));

  assert_eq!(env.list_json()[0]["interval_secs"], 10);
}

#[test]
fn add_rejects_nested_folders() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");

  env
    .ottopie_cmd()
    .arg("add")
    .arg("--plugin")
    .arg(&plugin)
    .arg("--src")
    .arg(env.path("data"))
    .arg("--tgt")
    .arg(env.path("data/inner"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to add task"));

  assert!(env.list_json().is_empty());
}

#[test]
fn add_keeps_task_with_broken_plugin() {
  let env = TestEnv::new();
  let plugin = env.write_file("broken.lua", "this is not lua");

  env.add_task(&plugin, "a", "b");

  let tasks = env.list_json();
  assert_eq!(tasks.len(), 1);
  assert!(tasks[0]["loaded"].is_null());
}

#[test]
fn edit_changes_only_given_fields() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");
  env.add_task(&plugin, "a", "b");

  env
    .ottopie_cmd()
    .args(["edit", "1", "--minutes", "2"])
    .arg("--tgt")
    .arg(env.path("c"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated task #1"));

  let tasks = env.list_json();
  assert_eq!(tasks[0]["interval_secs"], 150);
  assert!(tasks[0]["tgt"].as_str().unwrap().ends_with('c'));
  assert!(tasks[0]["src"].as_str().unwrap().ends_with('a'));
}

#[test]
fn edit_unknown_index_fails() {
  let env = TestEnv::new();

  env
    .ottopie_cmd()
    .args(["edit", "3", "--seconds", "5"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No task #3"));
}

#[test]
fn remove_keeps_remaining_order() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");
  env.add_task(&plugin, "a", "b");
  env.add_task(&plugin, "c", "d");
  env.add_task(&plugin, "e", "f");

  env.ottopie_cmd().args(["remove", "2"]).assert().success();

  let tasks = env.list_json();
  assert_eq!(tasks.len(), 2);
  assert!(tasks[0]["src"].as_str().unwrap().ends_with('a'));
  assert!(tasks[1]["src"].as_str().unwrap().ends_with('e'));
}

#[test]
fn once_prints_plugin_status() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");
  env.add_task(&plugin, "a", "b");

  env
    .ottopie_cmd()
    .args(["once", "1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("[echo.lua] echo"));
}

#[test]
fn once_reports_plugin_error() {
  let env = TestEnv::new();
  let plugin = env.plugin("failing.lua");
  env.add_task(&plugin, "a", "b");

  env
    .ottopie_cmd()
    .args(["once", "1"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("disk on fire"));
}

#[test]
fn once_mirrors_with_bundled_plugin() {
  let env = TestEnv::new();
  env.ottopie_cmd().arg("init").arg(env.path("plugins")).assert().success();
  env.write_file("data/one.txt", "1");
  env.write_file("data/sub/two.txt", "2");
  env.write_file("backup/stale.txt", "old");

  env.add_task(&env.path("plugins/folder_sync.lua"), "data", "backup");

  env
    .ottopie_cmd()
    .args(["once", "1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Sync complete: 2 copied, 0 updated, 1 deleted, 0 skipped."));

  assert_eq!(std::fs::read_to_string(env.path("backup/sub/two.txt")).unwrap(), "2");
  assert!(!env.path("backup/stale.txt").exists());
}

#[test]
fn malformed_entries_are_skipped_with_warning() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");
  env.add_task(&plugin, "a", "b");

  let content = std::fs::read_to_string(env.tasks_file()).unwrap();
  let mut snapshot: serde_json::Value = serde_json::from_str(&content).unwrap();
  snapshot["tasks"].as_array_mut().unwrap().insert(0, serde_json::json!({ "plugin": 5 }));
  std::fs::write(env.tasks_file(), snapshot.to_string()).unwrap();

  env
    .ottopie_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("#1"))
    .stderr(predicate::str::contains("Ignoring unreadable task entry 1"))
    .stderr(predicate::str::contains("dropped from the file on the next change"));

  // Numbering follows `list`, so the first readable task is #1.
  env.ottopie_cmd().args(["once", "1"]).assert().success();
  env.ottopie_cmd().args(["once", "2"]).assert().failure();
}

#[test]
fn unreadable_snapshot_is_an_error() {
  let env = TestEnv::new();
  env.write_file("config/tasks.json", "not json");

  env
    .ottopie_cmd()
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read tasks"));
}
