// Copyright 2026 Lore Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

fn lore_cmd(config_root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lore"));
    cmd.env("XDG_CONFIG_HOME", config_root);
    cmd.env("HOME", config_root);
    cmd.env("APPDATA", config_root);
    cmd.env_remove("LORE_LOG");
    cmd
}

fn global_config_path(config_root: &Path) -> PathBuf {
    let base = if cfg!(target_os = "macos") {
        config_root.join("Library").join("Application Support")
    } else {
        config_root.to_path_buf()
    };
    base.join("lore").join("lore.toml")
}

fn write_global_config(config_root: &Path, text: &str) {
    let path = global_config_path(config_root);
    fs::create_dir_all(path.parent().expect("config parent")).expect("config dir");
    fs::write(path, text).expect("write config");
}

fn run_json(cmd: &mut Command, cwd: &Path) -> Value {
    let output = cmd.current_dir(cwd).output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("parse json")
}

fn steps(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .expect("steps array")
        .iter()
        .map(|step| {
            (
                step["from"].as_str().expect("from").to_string(),
                step["to"].as_str().expect("to").to_string(),
            )
        })
        .collect()
}

struct Env {
    config: TempDir,
    work: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            config: TempDir::new().expect("config dir"),
            work: TempDir::new().expect("work dir"),
        }
    }

    fn cmd(&self) -> Command {
        lore_cmd(self.config.path())
    }

    fn root(&self) -> &Path {
        self.work.path()
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut cmd = self.cmd();
        cmd.args(args);
        run_json(&mut cmd, self.root())
    }

    fn init(&self) {
        self.cmd()
            .args(["init", "."])
            .current_dir(self.root())
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized lore store"));
    }

    /// Rewinds a freshly initialized store to an older schema layout.
    fn seed_legacy_store(&self, version: &str) {
        let conn = Connection::open(self.root().join("lore.db")).expect("open db");
        conn.execute_batch(
            "DROP TABLE record;\n\
             CREATE TABLE record (\n  id TEXT PRIMARY KEY,\n  error_type TEXT NOT NULL,\n  context TEXT NOT NULL,\n  solution TEXT NOT NULL,\n  created_at TEXT\n);\n\
             DELETE FROM schema_history;",
        )
        .expect("reset tables");
        conn.execute(
            "UPDATE meta SET value=?1 WHERE key='schema_version'",
            [version],
        )
        .expect("set version");
        conn.execute(
            "INSERT INTO record (id, error_type, context, solution) VALUES ('1', 'TypeError', ?1, '{}')",
            [r#"{"language":"python","framework":"fastapi","error_message":"boom"}"#],
        )
        .expect("insert record");
    }
}

#[test]
fn init_then_status_reports_current_schema() {
    let env = Env::new();
    env.init();

    let status = env.json(&["status", "--json"]);
    assert_eq!(status["ok"], true);
    assert_eq!(status["schema"]["app_version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(status["schema"]["stored"], "1.2.0");
    assert_eq!(status["schema"]["target"], "1.2.0");
    assert_eq!(status["schema"]["compatible"], true);
    assert_eq!(status["schema"]["record_count"], 0);
    assert!(steps(&status["path"]).is_empty());

    let history = env.json(&["history", "--json"]);
    assert_eq!(
        steps(&history["history"]),
        vec![
            ("0.0.0".to_string(), "1.0.0".to_string()),
            ("1.0.0".to_string(), "1.1.0".to_string()),
            ("1.1.0".to_string(), "1.2.0".to_string()),
        ]
    );
}

#[test]
fn init_refuses_existing_store() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["init", "."])
        .current_dir(env.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("store already exists"));
}

#[test]
fn migrate_upgrades_legacy_store() {
    let env = Env::new();
    env.init();
    env.seed_legacy_store("1.0.0");

    let status = env.json(&["status", "--json"]);
    assert_eq!(status["schema"]["stored"], "1.0.0");
    assert_eq!(status["schema"]["compatible"], false);
    assert_eq!(
        steps(&status["path"]),
        vec![
            ("1.0.0".to_string(), "1.1.0".to_string()),
            ("1.1.0".to_string(), "1.2.0".to_string()),
        ]
    );

    let dry_run = env.json(&["migrate", "--dry-run", "--json"]);
    assert_eq!(steps(&dry_run["path"]).len(), 2);
    assert_eq!(env.json(&["status", "--json"])["schema"]["stored"], "1.0.0");

    let migrated = env.json(&["migrate", "--json"]);
    assert_eq!(migrated["ok"], true);
    assert_eq!(migrated["migration"]["from"], "1.0.0");
    assert_eq!(migrated["migration"]["to"], "1.2.0");
    assert_eq!(steps(&migrated["migration"]["applied"]).len(), 2);

    let conn = Connection::open(env.root().join("lore.db")).expect("open db");
    let (severity, context): (String, String) = conn
        .query_row(
            "SELECT severity, context FROM record WHERE id='1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("read record");
    assert_eq!(severity, "medium");
    let context: Value = serde_json::from_str(&context).expect("context json");
    assert_eq!(context["environment"]["framework"], "fastapi");
    assert_eq!(context["error_details"]["message"], "boom");

    let again = env.json(&["migrate", "--json"]);
    assert!(steps(&again["migration"]["applied"]).is_empty());
}

#[test]
fn migrate_to_unknown_version_leaves_store_untouched() {
    let env = Env::new();
    env.init();

    let resp = env.json(&["migrate", "--to", "3.0.0", "--json"]);
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "no_migration_path");
    assert!(
        resp["error"]["message"]
            .as_str()
            .expect("message")
            .contains("no migration path from 1.2.0 to 3.0.0")
    );
    assert_eq!(env.json(&["status", "--json"])["schema"]["stored"], "1.2.0");

    env.cmd()
        .args(["migrate", "--to", "3.0.0"])
        .current_dir(env.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no migration path from 1.2.0 to 3.0.0"));
}

#[test]
fn path_and_compat_need_no_store() {
    let env = Env::new();

    let path = env.json(&["path", "0.0.0", "1.2.0", "--json"]);
    assert_eq!(
        steps(&path["path"]),
        vec![
            ("0.0.0".to_string(), "1.0.0".to_string()),
            ("1.0.0".to_string(), "1.1.0".to_string()),
            ("1.1.0".to_string(), "1.2.0".to_string()),
        ]
    );
    let same = env.json(&["path", "9.9.9", "9.9.9", "--json"]);
    assert!(steps(&same["path"]).is_empty());

    env.cmd()
        .args(["path", "1.2.0", "1.0.0"])
        .current_dir(env.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no migration path from 1.2.0 to 1.0.0"));

    assert_eq!(env.json(&["compat", "1.2.0", "--json"])["compatible"], true);
    assert_eq!(env.json(&["compat", "1.0.0", "--json"])["compatible"], false);
    assert_eq!(
        env.json(&["compat", "1.0.0", "--app", "0.1.0", "--json"])["compatible"],
        true
    );
    assert_eq!(
        env.json(&["compat", "1.1.0", "--app", "0.0.1", "--json"])["compatible"],
        false
    );
    env.cmd()
        .args(["compat", "1.1.0", "--app", "0.2.0"])
        .current_dir(env.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("schema 1.1.0 is compatible with lore 0.2.0"));
}

#[test]
fn configured_target_limits_init() {
    let env = Env::new();
    write_global_config(env.config.path(), "target_schema = \"1.1.0\"\n");
    env.init();

    let status = env.json(&["status", "--json"]);
    assert_eq!(status["schema"]["stored"], "1.1.0");
    assert_eq!(status["schema"]["target"], "1.1.0");
    assert_eq!(status["schema"]["compatible"], true);

    let migrated = env.json(&["migrate", "--to", "1.2.0", "--json"]);
    assert_eq!(
        steps(&migrated["migration"]["applied"]),
        vec![("1.1.0".to_string(), "1.2.0".to_string())]
    );
}

#[test]
fn init_json_reports_applied_steps() {
    let env = Env::new();
    let resp = env.json(&["init", ".", "--json"]);
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["schema"]["stored"], "1.2.0");
    assert_eq!(resp["schema"]["compatible"], true);
    assert_eq!(resp["migration"]["from"], "0.0.0");
    assert_eq!(steps(&resp["migration"]["applied"]).len(), 3);
    assert!(env.root().join("lore.db").exists());
}

#[test]
fn init_to_unreachable_target_leaves_no_store() {
    let env = Env::new();
    write_global_config(env.config.path(), "target_schema = \"2.0.0\"\n");

    let resp = env.json(&["init", ".", "--json"]);
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "no_migration_path");
    assert!(!env.root().join("lore.db").exists());

    write_global_config(env.config.path(), "target_schema = \"1.2.0\"\n");
    env.init();
}

#[test]
fn doctor_reports_checks() {
    let env = Env::new();

    let resp = env.json(&["doctor", "--json"]);
    assert_eq!(resp["ok"], true);
    assert!(
        resp["warnings"][0]
            .as_str()
            .expect("warning")
            .contains("store not found")
    );

    env.init();
    env.seed_legacy_store("1.0.0");
    let resp = env.json(&["doctor", "--json"]);
    assert_eq!(resp["ok"], false);
    let failing: Vec<&str> = resp["checks"]
        .as_array()
        .expect("checks")
        .iter()
        .filter(|check| check["ok"] == false)
        .map(|check| check["name"].as_str().expect("name"))
        .collect();
    assert_eq!(failing, vec!["store_compatible"]);

    env.cmd()
        .arg("doctor")
        .current_dir(env.root())
        .assert()
        .failure()
        .stdout(predicate::str::contains("[FAIL] store_compatible"));
}

#[test]
fn missing_store_is_reported() {
    let env = Env::new();
    let resp = env.json(&["status", "--json"]);
    assert_eq!(resp["ok"], false);
    assert!(
        resp["error"]["message"]
            .as_str()
            .expect("message")
            .contains("store not found")
    );
}
