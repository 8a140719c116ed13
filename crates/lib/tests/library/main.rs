//! End-to-end tests through the public library API: package the bundled
//! plugin, schedule it through a registry and restore it from disk.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tokio::runtime::Handle;

use ottopie_lib::package::PackageBuilder;
use ottopie_lib::plugin::{FOLDER_SYNC_FILE, FOLDER_SYNC_SOURCE, PluginOrigin};
use ottopie_lib::registry::{ConfigStore, Registry};
use ottopie_lib::task::{EventKind, Interval, TaskConfig};

fn write(path: &Path, content: &str) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, content).unwrap();
}

fn packaged_folder_sync(dir: &Path) -> std::path::PathBuf {
  let script = dir.join(FOLDER_SYNC_FILE);
  write(&script, FOLDER_SYNC_SOURCE);
  PackageBuilder::new(&script)
    .version("0.9.0")
    .output(dir.join("folder_sync.ottopie"))
    .build()
    .unwrap()
    .output
}

#[tokio::test(flavor = "multi_thread")]
async fn packaged_plugin_mirrors_and_survives_restore() {
  let temp = TempDir::new().unwrap();
  let package = packaged_folder_sync(temp.path());
  let src = temp.path().join("photos");
  let tgt = temp.path().join("backup");
  write(&src.join("a.jpg"), "a");
  write(&src.join("2024/b.jpg"), "b");

  let tasks_file = temp.path().join("state/tasks.json");
  let registry = Registry::with_lua(ConfigStore::new(&tasks_file), Handle::current());
  let task = registry
    .add_task(TaskConfig::new(&package, &src, &tgt, Interval::new(0, 0, 5, 0)))
    .unwrap();

  let info = task.plugin_info().unwrap();
  assert_eq!(info.origin, PluginOrigin::Package);
  assert_eq!(info.version.as_deref(), Some("0.9.0"));

  let status = tokio::task::spawn_blocking({
    let task = task.clone();
    move || task.run_now()
  })
  .await
  .unwrap()
  .unwrap();
  assert_eq!(status, "Sync complete: 2 copied, 0 updated, 0 deleted, 0 skipped.");
  assert_eq!(fs::read_to_string(tgt.join("2024/b.jpg")).unwrap(), "b");

  registry.shutdown();
  assert!(!info.entry.exists(), "extraction directory should be gone after shutdown");

  let restored = Registry::with_lua(ConfigStore::new(&tasks_file), Handle::current());
  let report = restored.restore().unwrap();
  assert_eq!(report.restored, 1);
  assert!(report.failures.is_empty());
  let task = &restored.list()[0];
  assert_eq!(task.config().interval.total_secs(), 300);
  assert_ne!(task.plugin_info().unwrap().identity, info.identity);
  restored.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn removed_task_emits_event_and_leaves_snapshot() {
  let temp = TempDir::new().unwrap();
  let script = temp.path().join(FOLDER_SYNC_FILE);
  write(&script, FOLDER_SYNC_SOURCE);

  let registry = Registry::with_lua(ConfigStore::new(temp.path().join("tasks.json")), Handle::current());
  let mut events = registry.subscribe();
  let task = registry
    .add_task(TaskConfig::new(&script, temp.path().join("a"), temp.path().join("b"), Interval::from_secs(60)))
    .unwrap();

  let removed = registry.remove_task(task.id()).unwrap();
  assert_eq!(removed.plugin, script);
  assert!(registry.list().is_empty());
  assert!(registry.store().load_entries().unwrap().is_empty());

  let mut kinds = Vec::new();
  while let Ok(event) = events.try_recv() {
    kinds.push(event.kind);
  }
  assert!(matches!(kinds.first(), Some(EventKind::Loaded { .. })));
  assert_eq!(kinds.last(), Some(&EventKind::Removed));
}
