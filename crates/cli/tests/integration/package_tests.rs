//! Package build and load integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn pack_then_inspect() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");

  env
    .ottopie_cmd()
    .arg("pack")
    .arg(&plugin)
    .args(["--name", "echoer", "--version", "2.1.0", "--description", "says things back"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Packaged echoer v2.1.0"));

  let archive = env.path("echoer.ottopie");
  assert!(archive.is_file());

  let output = env.ottopie_cmd().arg("inspect").arg(&archive).arg("--json").output().unwrap();
  assert!(output.status.success());
  let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(manifest["name"], "echoer");
  assert_eq!(manifest["version"], "2.1.0");
  assert_eq!(manifest["entry_point"], "echo.lua");
  assert_eq!(manifest["description"], "says things back");
}

#[test]
fn packaged_plugin_runs_with_vendored_module() {
  let env = TestEnv::new();
  env.write_file("lib/greeting.lua", "return { text = 'hello from vendor' }");
  let script = env.write_file(
    "main.lua",
    "local greeting = require('greeting')\nfunction run(_) return greeting.text end\n",
  );

  env
    .ottopie_cmd()
    .arg("pack")
    .arg(&script)
    .arg("--vendor")
    .arg(env.path("lib"))
    .arg("--output")
    .arg(env.path("dist/greeter.ottopie"))
    .assert()
    .success();

  env.add_task(&env.path("dist/greeter.ottopie"), "a", "b");
  let tasks = env.list_json();
  assert_eq!(tasks[0]["loaded"]["origin"], "package");
  assert_eq!(tasks[0]["loaded"]["version"], "1.0.0");

  env
    .ottopie_cmd()
    .args(["once", "1"])
    .assert()
    .success()
    .stdout(predicate::str::contains("hello from vendor"));
}

#[test]
fn pack_missing_script_fails() {
  let env = TestEnv::new();

  env
    .ottopie_cmd()
    .arg("pack")
    .arg(env.path("nope.lua"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to package"));
}

#[test]
fn inspect_rejects_plain_file() {
  let env = TestEnv::new();
  let plugin = env.plugin("echo.lua");

  env
    .ottopie_cmd()
    .arg("inspect")
    .arg(&plugin)
    .assert()
    .failure()
    .stderr(predicate::str::contains("is not a plugin package"));
}
