//! libSQL storage layer for the page tables.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the input
//! `pages` table, the narrow `qc_pages` table, and daily API usage counters.
//!
//! Tables are only ever replaced whole: [`Storage::replace_rows`] and
//! [`Storage::replace_qc_rows`] delete and re-insert inside one transaction,
//! so readers never observe a partially written table.

mod exchange;
mod migrations;

use std::path::Path;

use libsql::{Connection, Database, params};
use seoenrich_shared::{QcRow, Result, Row, SeoEnrichError};

pub use exchange::{read_jsonl, write_jsonl};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> SeoEnrichError {
    SeoEnrichError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| SeoEnrichError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SeoEnrichError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        SeoEnrichError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SeoEnrichError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Page table
    // -----------------------------------------------------------------------

    /// Load every row of the `pages` table in stored order.
    pub async fn load_rows(&self) -> Result<Vec<Row>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, url, title, seo_title, meta_description, processed
                 FROM pages ORDER BY position",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(Row {
                id: row.get::<String>(0).map_err(storage_err)?,
                url: row.get::<String>(1).map_err(storage_err)?,
                title: row.get::<String>(2).unwrap_or_default(),
                seo_title: row.get::<String>(3).unwrap_or_default(),
                meta_description: row.get::<String>(4).unwrap_or_default(),
                processed: row.get::<i64>(5).map_err(storage_err)? != 0,
            });
        }
        Ok(results)
    }

    /// Replace the whole `pages` table with `rows` in one transaction.
    pub async fn replace_rows(&self, rows: &[Row]) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        tx.execute("DELETE FROM pages", params![])
            .await
            .map_err(storage_err)?;

        for (position, row) in rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO pages (position, id, url, title, seo_title, meta_description, processed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    position as i64,
                    row.id.as_str(),
                    row.url.as_str(),
                    row.title.as_str(),
                    row.seo_title.as_str(),
                    row.meta_description.as_str(),
                    i64::from(row.processed),
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(rows = rows.len(), "rewrote pages table");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // QC table
    // -----------------------------------------------------------------------

    /// Load every row of the narrow `qc_pages` table in stored order.
    pub async fn load_qc_rows(&self) -> Result<Vec<QcRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT url, title, seo_title, meta_description FROM qc_pages ORDER BY position",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(QcRow {
                url: row.get::<String>(0).map_err(storage_err)?,
                title: row.get::<String>(1).unwrap_or_default(),
                seo_title: row.get::<String>(2).unwrap_or_default(),
                meta_description: row.get::<String>(3).unwrap_or_default(),
            });
        }
        Ok(results)
    }

    /// Replace the whole `qc_pages` table with `rows` in one transaction.
    pub async fn replace_qc_rows(&self, rows: &[QcRow]) -> Result<()> {
        self.check_writable()?;
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        tx.execute("DELETE FROM qc_pages", params![])
            .await
            .map_err(storage_err)?;

        for (position, row) in rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO qc_pages (position, url, title, seo_title, meta_description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    position as i64,
                    row.url.as_str(),
                    row.title.as_str(),
                    row.seo_title.as_str(),
                    row.meta_description.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        tracing::debug!(rows = rows.len(), "rewrote qc_pages table");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // API usage
    // -----------------------------------------------------------------------

    /// Generative calls already recorded for `day` (`YYYY-MM-DD`).
    pub async fn calls_on(&self, day: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT calls FROM api_usage WHERE day = ?1", params![day])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// Add `calls` to the counter for `day`.
    pub async fn record_calls(&self, day: &str, calls: u64) -> Result<()> {
        self.check_writable()?;
        if calls == 0 {
            return Ok(());
        }
        self.conn
            .execute(
                "INSERT INTO api_usage (day, calls) VALUES (?1, ?2)
                 ON CONFLICT(day) DO UPDATE SET calls = calls + excluded.calls",
                params![day, calls as i64],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("seoenrich_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_rows() -> Vec<Row> {
        let mut a = Row::new("https://example.com/a");
        a.title = "Alpha".into();
        let mut b = Row::new("https://example.com/tags/music");
        b.processed = true;
        b.seo_title = "Music in Richmond".into();
        b.meta_description = "Explore articles related to music.".into();
        vec![a, b]
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("seoenrich_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn rows_roundtrip_in_order() {
        let storage = test_storage().await;
        let rows = sample_rows();
        storage.replace_rows(&rows).await.expect("write");

        let loaded = storage.load_rows().await.expect("load");
        assert_eq!(loaded, rows);
    }

    #[tokio::test]
    async fn replace_drops_previous_rows() {
        let storage = test_storage().await;
        storage.replace_rows(&sample_rows()).await.unwrap();

        let only = vec![Row::new("https://example.com/only")];
        storage.replace_rows(&only).await.unwrap();

        let loaded = storage.load_rows().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].url, "https://example.com/only");
    }

    #[tokio::test]
    async fn qc_rows_roundtrip() {
        let storage = test_storage().await;
        let qc: Vec<QcRow> = sample_rows().iter().map(Row::to_qc_row).collect();
        storage.replace_qc_rows(&qc).await.unwrap();

        let loaded = storage.load_qc_rows().await.unwrap();
        assert_eq!(loaded, qc);
        // The input table is untouched.
        assert!(storage.load_rows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_usage_accumulates() {
        let storage = test_storage().await;
        assert_eq!(storage.calls_on("2026-01-01").await.unwrap(), 0);

        storage.record_calls("2026-01-01", 4).await.unwrap();
        storage.record_calls("2026-01-01", 6).await.unwrap();
        storage.record_calls("2026-01-02", 1).await.unwrap();

        assert_eq!(storage.calls_on("2026-01-01").await.unwrap(), 10);
        assert_eq!(storage.calls_on("2026-01-02").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("seoenrich_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.replace_rows(&sample_rows()).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.load_rows().await.unwrap().len(), 2);

        let result = ro.replace_rows(&[]).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("seoenrich_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
