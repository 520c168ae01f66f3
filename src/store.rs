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
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::migrate::MigrationError;
use crate::migrate::MigrationReport;
use crate::model::HistoryRow;
use crate::schema::BASE_SCHEMA_VERSION;
use crate::schema::Schema;
use crate::version::VersionId;

pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
    _lock: StoreLock,
}

/// Advisory lock on a per-store file under the temp dir. The file is never
/// removed: openers blocked on it must contend on the same inode.
struct StoreLock {
    _file: File,
}

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub record_count: i64,
    pub db_size_bytes: u64,
}

#[derive(Debug)]
pub struct IntegrityReport {
    pub status: String,
    pub stats: StoreStats,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl Store {
    /// Creates a new store and migrates it from the base schema to the target.
    /// Nothing is left on disk when the target is unreachable or a step fails.
    pub fn init(path: &Path, schema: &Schema) -> Result<MigrationReport> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let target = schema.target.as_str();
        if schema
            .manager
            .get_migration_path(BASE_SCHEMA_VERSION, target)
            .is_none()
        {
            return Err(MigrationError::PathNotFound {
                from: BASE_SCHEMA_VERSION.into(),
                to: schema.target.clone(),
            })
            .with_context(|| format!("initialize schema {target}"));
        }

        let mut store = Self::open_unchecked(path, StoreMode::ReadWrite)?;
        match schema
            .manager
            .migrate(&mut store, BASE_SCHEMA_VERSION, target)
        {
            Ok(report) => Ok(report),
            Err(err) => {
                drop(store);
                Self::remove_database(path);
                Err(err).with_context(|| format!("initialize schema {target}"))
            }
        }
    }

    fn remove_database(path: &Path) {
        let journal = PathBuf::from(format!("{}-journal", path.display()));
        for file in [path, journal.as_path()] {
            match fs::remove_file(file) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %file.display(), %err, "failed to remove partial store");
                }
            }
        }
    }

    /// Opens a store whose schema the running application accepts, upgrading
    /// it first when it does not and auto-migration is enabled.
    pub fn open(path: &Path, mode: StoreMode, schema: &Schema) -> Result<Self> {
        let mut store = Self::open_unchecked(path, mode)?;
        let version = store.schema_version()?;
        if schema.accepts(version.as_str()) {
            return Ok(store);
        }
        if !schema.auto_migrate {
            anyhow::bail!(
                "store schema {} is not compatible with lore {}; run `lore migrate`",
                version,
                schema.app_version()
            );
        }

        match mode {
            StoreMode::ReadWrite => {
                store.upgrade(schema)?;
                Ok(store)
            }
            StoreMode::ReadOnly => {
                drop(store);
                let mut rw = Self::open_unchecked(path, StoreMode::ReadWrite)?;
                rw.upgrade(schema)?;
                drop(rw);
                Self::open_unchecked(path, StoreMode::ReadOnly)
            }
        }
    }

    /// Opens the database without any schema gating.
    pub fn open_unchecked(path: &Path, mode: StoreMode) -> Result<Self> {
        let lock = Self::acquire_lock(path, mode)?;
        let conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    fn upgrade(&mut self, schema: &Schema) -> Result<()> {
        let from = self.schema_version()?;
        tracing::info!(
            path = %self.path.display(),
            %from,
            to = %schema.target,
            "upgrading store schema"
        );
        schema
            .manager
            .migrate(self, from.as_str(), schema.target.as_str())
            .with_context(|| format!("upgrade store schema from {from}"))?;
        let version = self.schema_version()?;
        if !schema.accepts(version.as_str()) {
            anyhow::bail!(
                "store schema {} is not compatible with lore {} after migration",
                version,
                schema.app_version()
            );
        }
        Ok(())
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        let mut batch = String::from("PRAGMA foreign_keys=ON;");
        if matches!(mode, StoreMode::ReadWrite) {
            batch = format!("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\n{batch}");
        }
        conn.execute_batch(&batch).context("apply pragmas")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("lore");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("lore-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => file.try_lock_shared().map_err(|err| err.to_string()),
                StoreMode::ReadWrite => file.try_lock_exclusive().map_err(|err| err.to_string()),
            };
            match locked {
                Ok(()) => return Ok(StoreLock { _file: file }),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another process may be using {}",
                        path.display()
                    );
                }
                Err(_) => {
                    sleep(Duration::from_millis(50));
                }
            }
        }
    }

    pub(crate) fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .context("table info")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        for row in rows {
            if row? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Stored schema version; stores without a marker read as the base version.
    pub fn schema_version(&self) -> Result<VersionId> {
        Self::read_schema_version(&self.conn)
    }

    fn read_schema_version(conn: &Connection) -> Result<VersionId> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(BASE_SCHEMA_VERSION.into());
        }
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("read schema_version")?;
        Ok(value
            .map(VersionId::from)
            .unwrap_or_else(|| BASE_SCHEMA_VERSION.into()))
    }

    /// Moves the version marker to `to` and appends the step to the history.
    ///
    /// Migration steps call this themselves, inside their own transaction.
    pub fn record_schema_version(conn: &Connection, from: &str, to: &str) -> Result<()> {
        Self::set_meta(conn, "schema_version", to)?;
        let applied_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("format applied_at")?;
        conn.execute(
            "INSERT INTO schema_history (from_version, to_version, applied_at) VALUES (?1, ?2, ?3)",
            params![from, to, applied_at],
        )
        .context("append schema_history")?;
        Ok(())
    }

    pub fn history(&self) -> Result<Vec<HistoryRow>> {
        if !Self::table_exists(&self.conn, "schema_history")? {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT from_version, to_version, applied_at FROM schema_history ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryRow {
                from: VersionId::from(row.get::<_, String>(0)?),
                to: VersionId::from(row.get::<_, String>(1)?),
                applied_at: row.get(2)?,
            })
        })?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let record_count: i64 = if Self::table_exists(&self.conn, "record")? {
            self.conn
                .query_row("SELECT COUNT(*) FROM record", [], |row| row.get(0))
                .context("count records")?
        } else {
            0
        };
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            record_count,
            db_size_bytes,
        })
    }

    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let status: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("integrity_check")?;
        let stats = self.stats()?;
        Ok(IntegrityReport { status, stats })
    }
}
