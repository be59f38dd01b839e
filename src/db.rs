use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use surrealdb::engine::local::{Db, SurrealKv};
use surrealdb::Surreal;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::engine::sync::{CatalogStore, StoreError};
use crate::models::TrackRecord;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to open catalog at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("catalog migration failed: {0}")]
    Migration(String),

    #[error("catalog query failed: {0}")]
    Query(String),
}

/// Wrapper around the SurrealDB handle.
/// Clone is cheap (Arc internally).
#[derive(Clone)]
pub struct DbHandle {
    pub db: Surreal<Db>,
}

/// Open the catalog file, select ns/db, run migrations.
pub async fn init(path: &Path, namespace: &str, database: &str) -> Result<DbHandle, DbError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DbError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    let db = Surreal::new::<SurrealKv>(path.to_path_buf())
        .await
        .map_err(|e| DbError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    let handle = DbHandle::prepare(db, namespace, database).await?;
    info!(path = %path.display(), "catalog opened");
    Ok(handle)
}

/// Catalog that is only opened (and created on disk) by the first batch.
/// A declined or empty run never touches the database path.
pub struct LazyCatalog {
    path: PathBuf,
    namespace: String,
    database: String,
    handle: OnceCell<DbHandle>,
}

impl LazyCatalog {
    pub fn new(path: impl Into<PathBuf>, namespace: impl Into<String>, database: impl Into<String>) -> Self {
        LazyCatalog {
            path: path.into(),
            namespace: namespace.into(),
            database: database.into(),
            handle: OnceCell::new(),
        }
    }

    /// The open handle, if any batch has been sent.
    pub fn opened(&self) -> Option<&DbHandle> {
        self.handle.get()
    }

    async fn handle(&self) -> Result<&DbHandle, DbError> {
        self.handle
            .get_or_try_init(|| init(&self.path, &self.namespace, &self.database))
            .await
    }
}

impl CatalogStore for LazyCatalog {
    async fn upsert_batch(&self, rows: &[TrackRecord]) -> Result<(), StoreError> {
        let handle = self
            .handle()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        handle.upsert_batch(rows).await
    }
}

impl DbHandle {
    #[cfg(test)]
    pub async fn in_memory() -> Result<DbHandle, DbError> {
        let db = Surreal::new::<surrealdb::engine::local::Mem>(())
            .await
            .map_err(|e| DbError::Open {
                path: "memory".to_string(),
                reason: e.to_string(),
            })?;
        DbHandle::prepare(db, "poolsync", "test").await
    }

    async fn prepare(db: Surreal<Db>, namespace: &str, database: &str) -> Result<DbHandle, DbError> {
        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        run_migrations(&db).await?;
        Ok(DbHandle { db })
    }

    /// Number of rows in the track catalog.
    pub async fn count_tracks(&self) -> Result<u64, DbError> {
        let mut response = self
            .db
            .query("SELECT count() AS count FROM track GROUP ALL")
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        let count: Option<i64> = response
            .take("count")
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(count.unwrap_or(0) as u64)
    }

    /// Pool recorded for `file_path`, if the catalog has it.
    #[cfg(test)]
    pub async fn pool_of(&self, file_path: &str) -> Result<Option<String>, DbError> {
        let mut response = self
            .db
            .query("SELECT pool_origin FROM track WHERE file_path = $path")
            .bind(("path", file_path.to_string()))
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        response
            .take("pool_origin")
            .map_err(|e| DbError::Query(e.to_string()))
    }
}

/// Run schema migrations. DEFINE statements are idempotent.
async fn run_migrations(db: &Surreal<Db>) -> Result<(), DbError> {
    db.query(SCHEMA_V1)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;
    Ok(())
}

/// One transaction per batch: `UPSERT ... WHERE file_path = ...` per row.
/// Rows without a timestamp get the server's clock.
fn upsert_statement(rows: &[TrackRecord]) -> String {
    let mut sql = String::from("BEGIN TRANSACTION;\n");
    for (i, row) in rows.iter().enumerate() {
        let discovered_at = if row.discovered_at.is_some() {
            format!("<datetime> $at_{i}")
        } else {
            "time::now()".to_string()
        };
        let _ = writeln!(
            sql,
            "UPSERT track SET filename = $filename_{i}, pool_origin = $pool_{i}, file_path = $path_{i}, \
             discovered_at = {discovered_at} WHERE file_path = $path_{i};"
        );
    }
    sql.push_str("COMMIT TRANSACTION;");
    sql
}

impl CatalogStore for DbHandle {
    async fn upsert_batch(&self, rows: &[TrackRecord]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        self.execute_batch(upsert_statement(rows), rows).await?;
        debug!(rows = rows.len(), "batch committed");
        Ok(())
    }
}

impl DbHandle {
    async fn execute_batch(&self, sql: String, rows: &[TrackRecord]) -> Result<(), StoreError> {
        let mut query = self.db.query(sql);
        for (i, row) in rows.iter().enumerate() {
            query = query
                .bind((format!("filename_{i}"), row.filename.clone()))
                .bind((format!("pool_{i}"), row.pool_origin.clone()))
                .bind((format!("path_{i}"), row.file_path.clone()));
            if let Some(at) = row.discovered_at {
                query = query.bind((format!("at_{i}"), at.to_rfc3339()));
            }
        }

        let response = match query.await {
            Ok(response) => response,
            Err(e) => return Err(self.classify(e.to_string()).await),
        };
        response.check().map_err(|e| StoreError::Rejected(e.to_string()))?;
        Ok(())
    }

    /// A failed query is only an outage if the engine itself is unhealthy;
    /// otherwise the statement was refused (parse error, constraint).
    async fn classify(&self, reason: String) -> StoreError {
        match self.db.health().await {
            Ok(()) => StoreError::Rejected(reason),
            Err(e) => {
                warn!(error = %e, "catalog health check failed");
                StoreError::Unavailable(reason)
            }
        }
    }
}

const SCHEMA_V1: &str = "
    DEFINE TABLE OVERWRITE track SCHEMAFULL;
    DEFINE FIELD OVERWRITE filename ON track TYPE string;
    DEFINE FIELD OVERWRITE pool_origin ON track TYPE string;
    DEFINE FIELD OVERWRITE file_path ON track TYPE string;
    DEFINE FIELD OVERWRITE discovered_at ON track TYPE datetime;
    DEFINE INDEX OVERWRITE idx_track_file_path ON track FIELDS file_path UNIQUE;
";
