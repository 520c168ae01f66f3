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

//! Built-in schema chain for the record store.

use anyhow::Context;
use anyhow::Result;
use rusqlite::params;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::config::Config;
use crate::migrate::MigrationManager;
use crate::store::Store;
use crate::version::APP_VERSION;
use crate::version::VersionId;

/// Version of a store that has never been migrated.
pub const BASE_SCHEMA_VERSION: &str = "0.0.0";
/// Schema version written by this release.
pub const SCHEMA_VERSION: &str = "1.2.0";

type StepFn = fn(&mut Store) -> Result<()>;

const MIGRATIONS: &[(&str, &str, StepFn)] = &[
    (BASE_SCHEMA_VERSION, "1.0.0", create_record_tables),
    ("1.0.0", "1.1.0", add_record_severity),
    ("1.1.0", "1.2.0", split_record_context),
];

const COMPATIBILITY: &[(&str, &[&str])] = &[
    ("0.1.0", &["1.0.0"]),
    ("0.2.0", &["1.0.0", "1.1.0"]),
    ("0.3.0", &["1.1.0", "1.2.0"]),
];

/// Migration registry plus the upgrade policy a store is opened with.
pub struct Schema {
    pub manager: MigrationManager<Store>,
    pub target: VersionId,
    pub auto_migrate: bool,
}

impl Schema {
    pub fn builtin() -> Self {
        let manager = MigrationManager::new(APP_VERSION);
        for &(from, to, step) in MIGRATIONS {
            manager.register_migration(from, to, step);
        }
        for &(app, schemas) in COMPATIBILITY {
            manager.register_compatibility(app, schemas.iter().copied());
        }
        Self {
            manager,
            target: SCHEMA_VERSION.into(),
            auto_migrate: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut schema = Self::builtin();
        if let Some(target) = &config.target_schema {
            schema.target = target.as_str().into();
        }
        schema.auto_migrate = config.auto_migrate;
        schema
    }

    pub fn with_target(mut self, target: impl Into<VersionId>) -> Self {
        self.target = target.into();
        self
    }

    pub fn app_version(&self) -> &VersionId {
        self.manager.app_version()
    }

    pub fn accepts(&self, schema_version: &str) -> bool {
        self.manager.is_compatible(schema_version, None)
    }
}

fn create_record_tables(store: &mut Store) -> Result<()> {
    let tx = store.conn.transaction().context("begin 1.0.0")?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (\n  key TEXT PRIMARY KEY,\n  value TEXT\n);\n\nCREATE TABLE IF NOT EXISTS schema_history (\n  id INTEGER PRIMARY KEY,\n  from_version TEXT NOT NULL,\n  to_version TEXT NOT NULL,\n  applied_at TEXT NOT NULL\n);\n\nCREATE TABLE IF NOT EXISTS record (\n  id TEXT PRIMARY KEY,\n  error_type TEXT NOT NULL,\n  context TEXT NOT NULL,\n  solution TEXT NOT NULL,\n  created_at TEXT\n);\n\nCREATE INDEX IF NOT EXISTS idx_record_error_type ON record(error_type);",
    )
    .context("create record tables")?;
    Store::record_schema_version(&tx, BASE_SCHEMA_VERSION, "1.0.0")?;
    tx.commit().context("commit 1.0.0")?;
    Ok(())
}

fn add_record_severity(store: &mut Store) -> Result<()> {
    let tx = store.conn.transaction().context("begin 1.1.0")?;
    if !Store::column_exists(&tx, "record", "severity")? {
        tx.execute(
            "ALTER TABLE record ADD COLUMN severity TEXT NOT NULL DEFAULT 'medium'",
            [],
        )
        .context("add record.severity column")?;
    }
    Store::record_schema_version(&tx, "1.0.0", "1.1.0")?;
    tx.commit().context("commit 1.1.0")?;
    Ok(())
}

fn split_record_context(store: &mut Store) -> Result<()> {
    let tx = store.conn.transaction().context("begin 1.2.0")?;
    let rows = {
        let mut stmt = tx.prepare("SELECT id, context FROM record ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    for (id, context) in rows {
        let old: Value = serde_json::from_str(&context)
            .with_context(|| format!("parse context of record {id}"))?;
        let Some(fields) = old.as_object() else {
            anyhow::bail!("context of record {id} is not an object");
        };
        let Some(new) = split_context(fields) else {
            continue;
        };
        tx.execute(
            "UPDATE record SET context = ?1 WHERE id = ?2",
            params![new.to_string(), id],
        )
        .with_context(|| format!("rewrite context of record {id}"))?;
    }
    Store::record_schema_version(&tx, "1.1.0", "1.2.0")?;
    tx.commit().context("commit 1.2.0")?;
    Ok(())
}

/// Flat 1.1.0 context -> nested 1.2.0 context; `None` when already nested.
fn split_context(fields: &Map<String, Value>) -> Option<Value> {
    if fields.contains_key("environment") || fields.contains_key("error_details") {
        return None;
    }
    let text = |key: &str| fields.get(key).and_then(Value::as_str).unwrap_or_default();
    Some(json!({
        "environment": {
            "language": text("language"),
            "framework": text("framework"),
        },
        "error_details": {
            "message": text("error_message"),
            "code_snippet": text("code_snippet"),
        },
    }))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::store::StoreMode;

    fn store_at(dir: &std::path::Path, version: &str) -> Result<Store> {
        let mut store = Store::open_unchecked(&dir.join("lore.db"), StoreMode::ReadWrite)?;
        Schema::builtin()
            .manager
            .migrate(&mut store, BASE_SCHEMA_VERSION, version)?;
        Ok(store)
    }

    fn insert_record(store: &Store, id: &str, error_type: &str, context: Value) -> Result<()> {
        store.conn.execute(
            "INSERT INTO record (id, error_type, context, solution) VALUES (?1, ?2, ?3, ?4)",
            params![
                id,
                error_type,
                context.to_string(),
                json!({"description": "fix it"}).to_string()
            ],
        )?;
        Ok(())
    }

    #[test]
    fn builtin_chain_reaches_current_schema() {
        let schema = Schema::builtin();
        let path = schema
            .manager
            .get_migration_path(BASE_SCHEMA_VERSION, SCHEMA_VERSION)
            .expect("path");
        let hops: Vec<(&str, &str)> = path
            .iter()
            .map(|s| (s.from.as_str(), s.to.as_str()))
            .collect();
        assert_eq!(
            hops,
            vec![("0.0.0", "1.0.0"), ("1.0.0", "1.1.0"), ("1.1.0", "1.2.0")]
        );
    }

    #[test]
    fn builtin_compatibility_matches_release_history() {
        let schema = Schema::builtin();
        assert_eq!(schema.app_version(), "0.3.0");
        assert!(schema.accepts("1.1.0"));
        assert!(schema.accepts(SCHEMA_VERSION));
        assert!(!schema.accepts("1.0.0"));
        assert!(!schema.accepts(BASE_SCHEMA_VERSION));
        assert!(schema.manager.is_compatible("1.0.0", Some("0.1.0")));
        assert!(schema.manager.is_compatible("1.1.0", Some("0.2.0")));
        assert!(!schema.manager.is_compatible("1.2.0", Some("0.2.0")));
    }

    #[test]
    fn from_config_overrides_target_and_policy() {
        let config = Config {
            target_schema: Some("1.1.0".to_string()),
            auto_migrate: false,
            ..Config::default()
        };
        let schema = Schema::from_config(&config);
        assert_eq!(schema.target, "1.1.0");
        assert!(!schema.auto_migrate);
        assert_eq!(Schema::from_config(&Config::default()).target, SCHEMA_VERSION);
    }

    #[test]
    fn severity_defaults_to_medium() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store_at(dir.path(), "1.0.0")?;
        insert_record(
            &store,
            "1",
            "TypeError",
            json!({"language": "python", "framework": "fastapi", "error_message": "boom"}),
        )?;

        add_record_severity(&mut store)?;
        let severity: String =
            store
                .conn
                .query_row("SELECT severity FROM record WHERE id='1'", [], |row| {
                    row.get(0)
                })?;
        assert_eq!(severity, "medium");
        assert_eq!(store.schema_version()?, "1.1.0");

        // Re-running the step after a partial failure is harmless.
        add_record_severity(&mut store)?;
        assert_eq!(store.schema_version()?, "1.1.0");
        Ok(())
    }

    #[test]
    fn context_is_restructured() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store_at(dir.path(), "1.1.0")?;
        insert_record(
            &store,
            "1",
            "ValueError",
            json!({
                "language": "javascript",
                "framework": "react",
                "error_message": "Expected array but got object",
            }),
        )?;
        insert_record(
            &store,
            "2",
            "ImportError",
            json!({"environment": {"language": "python"}, "error_details": {"message": "kept"}}),
        )?;

        split_record_context(&mut store)?;
        let read = |id: &str| -> Result<Value> {
            let text: String = store.conn.query_row(
                "SELECT context FROM record WHERE id=?1",
                params![id],
                |row| row.get(0),
            )?;
            Ok(serde_json::from_str(&text)?)
        };
        let first = read("1")?;
        assert_eq!(first["environment"]["language"], "javascript");
        assert_eq!(first["environment"]["framework"], "react");
        assert_eq!(
            first["error_details"]["message"],
            "Expected array but got object"
        );
        assert_eq!(first["error_details"]["code_snippet"], "");
        assert_eq!(read("2")?["error_details"]["message"], "kept");
        assert_eq!(store.schema_version()?, SCHEMA_VERSION);
        Ok(())
    }

    #[test]
    fn non_object_context_fails_instead_of_dropping_data() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store_at(dir.path(), "1.1.0")?;
        insert_record(&store, "a", "ValueError", json!({"language": "rust"}))?;
        insert_record(&store, "b", "Segfault", json!("segfault in libfoo at 0x1"))?;

        let err = Schema::builtin()
            .manager
            .migrate(&mut store, "1.1.0", "1.2.0")
            .unwrap_err();
        assert!(format!("{:#}", anyhow::Error::from(err)).contains("record b is not an object"));

        let context: String =
            store
                .conn
                .query_row("SELECT context FROM record WHERE id='b'", [], |row| {
                    row.get(0)
                })?;
        assert_eq!(context, r#""segfault in libfoo at 0x1""#);
        let untouched: String =
            store
                .conn
                .query_row("SELECT context FROM record WHERE id='a'", [], |row| {
                    row.get(0)
                })?;
        assert_eq!(untouched, r#"{"language":"rust"}"#);
        assert_eq!(store.schema_version()?, "1.1.0");
        Ok(())
    }

    #[test]
    fn malformed_context_fails_the_step_atomically() -> Result<()> {
        let dir = tempdir()?;
        let mut store = store_at(dir.path(), "1.1.0")?;
        store.conn.execute(
            "INSERT INTO record (id, error_type, context, solution) VALUES ('bad', 'X', 'not json', '{}')",
            [],
        )?;

        let schema = Schema::builtin();
        assert!(!schema.manager.execute_migration(&mut store, "1.1.0", "1.2.0"));
        assert_eq!(store.schema_version()?, "1.1.0");
        assert_eq!(store.history()?.len(), 2);
        Ok(())
    }
}
