//! SQLite-backed mirror catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use super::{
    CatalogError, CatalogStats, InstalledPackage, MarkerPruneCount, MirrorCatalog, MirroredFile,
};

/// Expected layout of one table: name, create statement, `(column, is_pk)` list.
struct TableSchema {
    name: &'static str,
    create: &'static str,
    columns: &'static [(&'static str, bool)],
}

const TABLES: &[TableSchema] = &[
    TableSchema {
        name: "installed_packages",
        create: "CREATE TABLE IF NOT EXISTS installed_packages (
                name TEXT PRIMARY KEY,
                repo TEXT NOT NULL
            )",
        columns: &[("name", true), ("repo", false)],
    },
    TableSchema {
        name: "local_mirror",
        create: "CREATE TABLE IF NOT EXISTS local_mirror (
                filename TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                repo TEXT NOT NULL,
                builddate INTEGER NOT NULL
            )",
        columns: &[
            ("filename", true),
            ("name", false),
            ("repo", false),
            ("builddate", false),
        ],
    },
    TableSchema {
        name: "db_hashes",
        create: "CREATE TABLE IF NOT EXISTS db_hashes (
                epoch_day INTEGER NOT NULL,
                hash TEXT PRIMARY KEY
            )",
        columns: &[("epoch_day", false), ("hash", true)],
    },
    TableSchema {
        name: "db_downloads",
        create: "CREATE TABLE IF NOT EXISTS db_downloads (
                db_url TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                epoch_day INTEGER NOT NULL
            )",
        columns: &[("db_url", true), ("timestamp", false), ("epoch_day", false)],
    },
];

fn db(e: rusqlite::Error) -> CatalogError {
    CatalogError::Database(e.to_string())
}

/// SQLite-backed mirror catalog.
pub struct SqliteMirrorCatalog {
    conn: Mutex<Connection>,
}

impl SqliteMirrorCatalog {
    /// Open the catalog file, creating it and its tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(db)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(db)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        for table in TABLES {
            let existing = Self::table_columns(conn, table.name)?;
            let expected: Vec<(String, bool)> = table
                .columns
                .iter()
                .map(|(name, pk)| (name.to_string(), *pk))
                .collect();

            // Layout changed: the data is rebuildable, so drop and recreate.
            if !existing.is_empty() && existing != expected {
                warn!(
                    table = table.name,
                    found = existing.len(),
                    expected = expected.len(),
                    "Catalog table layout mismatch, recreating"
                );
                conn.execute_batch(&format!("DROP TABLE {}", table.name))
                    .map_err(db)?;
            }

            conn.execute_batch(table.create).map_err(db)?;
        }

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_local_mirror_name ON local_mirror(name, builddate)",
        )
        .map_err(db)?;

        Ok(())
    }

    /// Column names and primary-key flags of a table, empty if it does not exist.
    fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, bool)>, CatalogError> {
        let mut stmt = conn
            .prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(db)?;

        let rows = stmt
            .query_map(params![table], |row| {
                let pk: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, pk > 0))
            })
            .map_err(db)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection lock poisoned".to_string()))
    }

    fn count(conn: &Connection, sql: &str) -> Result<u64, CatalogError> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0)).map_err(db)?;
        Ok(n.max(0) as u64)
    }
}

impl MirrorCatalog for SqliteMirrorCatalog {
    fn replace_installed(&self, entries: &[InstalledPackage]) -> Result<usize, CatalogError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db)?;

        tx.execute("DELETE FROM installed_packages", []).map_err(db)?;
        {
            let mut insert = tx
                .prepare("INSERT OR IGNORE INTO installed_packages (name, repo) VALUES (?1, ?2)")
                .map_err(db)?;
            for entry in entries {
                insert
                    .execute(params![&entry.name, &entry.repo])
                    .map_err(db)?;
            }
        }

        let removed = tx
            .execute(
                "DELETE FROM local_mirror
                 WHERE name NOT IN (SELECT name FROM installed_packages)",
                [],
            )
            .map_err(db)?;

        tx.commit().map_err(db)?;

        debug!(
            installed = entries.len(),
            removed,
            "Replaced installed package list"
        );
        Ok(removed)
    }

    fn list_installed(&self) -> Result<Vec<InstalledPackage>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name, repo FROM installed_packages ORDER BY name")
            .map_err(db)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(InstalledPackage {
                    name: row.get(0)?,
                    repo: row.get(1)?,
                })
            })
            .map_err(db)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    fn list_repos(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT repo FROM installed_packages ORDER BY repo")
            .map_err(db)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(db)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(db)
    }

    fn is_installed(&self, name: &str) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM installed_packages WHERE name = ?1)",
            params![name],
            |row| row.get(0),
        )
        .map_err(db)
    }

    fn has_mirrored_file(&self, filename: &str) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM local_mirror WHERE filename = ?1)",
            params![filename],
            |row| row.get(0),
        )
        .map_err(db)
    }

    fn count_mirrored_at_or_after(
        &self,
        name: &str,
        build_date: i64,
    ) -> Result<u32, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM local_mirror WHERE name = ?1 AND builddate >= ?2",
            params![name, build_date],
            |row| row.get(0),
        )
        .map_err(db)
    }

    fn upsert_mirrored_file(&self, file: &MirroredFile) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO local_mirror (filename, name, repo, builddate)
                 VALUES (?1, ?2, ?3, ?4)",
                params![&file.filename, &file.name, &file.repo, file.build_date],
            )
            .map_err(db)?;
        Ok(inserted > 0)
    }

    fn list_mirrored_files(&self) -> Result<Vec<MirroredFile>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT name, filename, repo, builddate FROM local_mirror
                 ORDER BY name ASC, builddate DESC, rowid ASC",
            )
            .map_err(db)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MirroredFile {
                    name: row.get(0)?,
                    filename: row.get(1)?,
                    repo: row.get(2)?,
                    build_date: row.get(3)?,
                })
            })
            .map_err(db)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    fn delete_mirrored_file(&self, filename: &str) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM local_mirror WHERE filename = ?1",
                params![filename],
            )
            .map_err(db)?;
        Ok(deleted > 0)
    }

    fn record_index_hash(&self, hash: &str, epoch_day: i64) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO db_hashes (hash, epoch_day) VALUES (?1, ?2)",
            params![hash, epoch_day],
        )
        .map_err(db)?;
        Ok(())
    }

    fn has_index_hash(&self, hash: &str) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM db_hashes WHERE hash = ?1)",
            params![hash],
            |row| row.get(0),
        )
        .map_err(db)
    }

    fn record_index_download(
        &self,
        url: &str,
        timestamp: &str,
        epoch_day: i64,
    ) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO db_downloads (db_url, timestamp, epoch_day) VALUES (?1, ?2, ?3)
             ON CONFLICT(db_url) DO UPDATE SET
                timestamp = excluded.timestamp,
                epoch_day = excluded.epoch_day",
            params![url, timestamp, epoch_day],
        )
        .map_err(db)?;
        Ok(())
    }

    fn has_index_download(&self, url: &str, timestamp: &str) -> Result<bool, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM db_downloads WHERE db_url = ?1 AND timestamp = ?2)",
            params![url, timestamp],
            |row| row.get(0),
        )
        .map_err(db)
    }

    fn prune_markers_older_than(&self, cutoff: i64) -> Result<MarkerPruneCount, CatalogError> {
        let conn = self.conn()?;

        let index_hashes = conn
            .execute(
                "DELETE FROM db_hashes WHERE epoch_day < ?1",
                params![cutoff],
            )
            .map_err(db)?;
        let index_downloads = conn
            .execute(
                "DELETE FROM db_downloads WHERE epoch_day < ?1",
                params![cutoff],
            )
            .map_err(db)?;

        Ok(MarkerPruneCount {
            index_hashes,
            index_downloads,
        })
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.conn()?;

        Ok(CatalogStats {
            installed_packages: Self::count(&conn, "SELECT COUNT(*) FROM installed_packages")?,
            mirrored_files: Self::count(&conn, "SELECT COUNT(*) FROM local_mirror")?,
            index_hashes: Self::count(&conn, "SELECT COUNT(*) FROM db_hashes")?,
            index_downloads: Self::count(&conn, "SELECT COUNT(*) FROM db_downloads")?,
        })
    }
}
