// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metadata catalog — SQLite-backed records of files and operations.
//
// The catalog stores record metadata only (never document bytes; those live
// in the artifact store, referenced by locator). Partial operation updates
// are applied as a single UPDATE under the connection lock, so a concurrent
// reader never observes a torn record, and the status state machine is
// enforced here: no transition ever leaves a terminal state.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, info, instrument};

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::{
    ArtifactId, ArtifactLocator, ArtifactOrigin, ArtifactRecord, OperationId, OperationKind,
    OperationOptions, OperationRecord, OperationStatus, PdfSummary,
};

/// SQLite schema for the files and operations tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS files (
        artifact_id TEXT PRIMARY KEY,
        container TEXT NOT NULL,
        object_path TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        sha256 TEXT NOT NULL,
        created_at TEXT NOT NULL,
        owner_id TEXT,
        lineage_parent_id TEXT,
        origin TEXT NOT NULL,
        pdf_info TEXT
    );
    CREATE TABLE IF NOT EXISTS operations (
        operation_id TEXT PRIMARY KEY,
        source_artifact_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        options TEXT NOT NULL,
        status TEXT NOT NULL,
        result_artifact_id TEXT,
        error TEXT,
        requested_by TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

/// A partial update to one operation record.
///
/// Absent fields keep their current value; the whole update lands in a single
/// UPDATE statement.
#[derive(Debug, Clone, Default)]
pub struct OperationUpdate {
    pub status: Option<OperationStatus>,
    pub result_artifact_id: Option<ArtifactId>,
    pub error: Option<String>,
}

impl OperationUpdate {
    pub fn status(status: OperationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Terminal success: status Completed plus the result artifact.
    pub fn completed(result_artifact_id: ArtifactId) -> Self {
        Self {
            status: Some(OperationStatus::Completed),
            result_artifact_id: Some(result_artifact_id),
            error: None,
        }
    }

    /// Terminal failure: status Failed plus the error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(OperationStatus::Failed),
            result_artifact_id: None,
            error: Some(error.into()),
        }
    }
}

/// Record-keeping contract consumed by the pipeline.
#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    async fn insert_file(&self, record: &ArtifactRecord) -> Result<()>;
    async fn insert_operation(&self, record: &OperationRecord) -> Result<()>;
    async fn update_operation(&self, operation_id: OperationId, update: OperationUpdate)
    -> Result<()>;
    async fn find_file(&self, artifact_id: ArtifactId) -> Result<Option<ArtifactRecord>>;
    async fn find_operation(&self, operation_id: OperationId) -> Result<Option<OperationRecord>>;
    async fn list_files(
        &self,
        owner_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ArtifactRecord>>;
}

/// SQLite-backed catalog.
///
/// `rusqlite` is synchronous, so the connection sits behind an
/// `Arc<Mutex<>>` and every trait method hops onto a blocking thread.
/// Contention is minimal — all statements are sub-millisecond.
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at the given path.
    ///
    /// Applies WAL journal mode for better concurrent-read behaviour and
    /// creates the tables if they do not exist.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| FalzwerkError::Catalog(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| FalzwerkError::Catalog(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| FalzwerkError::Catalog(format!("create tables: {e}")))?;

        info!("catalog database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory catalog (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FalzwerkError::Catalog(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| FalzwerkError::Catalog(format!("create tables: {e}")))?;

        debug!("in-memory catalog opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `work` on a blocking thread while holding the connection lock.
    async fn with_conn<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().expect("catalog lock poisoned");
            work(&guard)
        })
        .await
        .map_err(|e| FalzwerkError::Catalog(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl MetadataCatalog for SqliteCatalog {
    #[instrument(skip(self, record), fields(artifact_id = %record.artifact_id))]
    async fn insert_file(&self, record: &ArtifactRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| insert_file_inner(conn, &record))
            .await
    }

    #[instrument(skip(self, record), fields(operation_id = %record.operation_id))]
    async fn insert_operation(&self, record: &OperationRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| insert_operation_inner(conn, &record))
            .await
    }

    #[instrument(skip(self, update), fields(%operation_id, status = ?update.status))]
    async fn update_operation(
        &self,
        operation_id: OperationId,
        update: OperationUpdate,
    ) -> Result<()> {
        self.with_conn(move |conn| update_operation_inner(conn, operation_id, update))
            .await
    }

    #[instrument(skip(self), fields(%artifact_id))]
    async fn find_file(&self, artifact_id: ArtifactId) -> Result<Option<ArtifactRecord>> {
        self.with_conn(move |conn| find_file_inner(conn, artifact_id))
            .await
    }

    #[instrument(skip(self), fields(%operation_id))]
    async fn find_operation(&self, operation_id: OperationId) -> Result<Option<OperationRecord>> {
        self.with_conn(move |conn| find_operation_inner(conn, operation_id))
            .await
    }

    #[instrument(skip(self), fields(owner_id, offset, limit))]
    async fn list_files(
        &self,
        owner_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ArtifactRecord>> {
        let owner_id = owner_id.to_owned();
        self.with_conn(move |conn| list_files_inner(conn, &owner_id, offset, limit))
            .await
    }
}

// ---------------------------------------------------------------------------
// Synchronous statement helpers
// ---------------------------------------------------------------------------

fn insert_file_inner(conn: &Connection, record: &ArtifactRecord) -> Result<()> {
    let origin_json = serde_json::to_string(&record.origin)?;
    let pdf_info_json = record
        .pdf_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO files (artifact_id, container, object_path, mime_type, size_bytes,
         sha256, created_at, owner_id, lineage_parent_id, origin, pdf_info)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.artifact_id.to_string(),
            record.locator.container,
            record.locator.object_path,
            record.mime_type,
            record.size_bytes as i64,
            record.sha256,
            record.created_at.to_rfc3339(),
            record.owner_id,
            record.lineage_parent_id.map(|id| id.to_string()),
            origin_json,
            pdf_info_json,
        ],
    )
    .map_err(|e| FalzwerkError::Catalog(format!("insert file: {e}")))?;

    info!(artifact_id = %record.artifact_id, "file record inserted");
    Ok(())
}

fn insert_operation_inner(conn: &Connection, record: &OperationRecord) -> Result<()> {
    let kind_json = serde_json::to_string(&record.kind)?;
    let options_json = serde_json::to_string(&record.options)?;
    let status_json = serde_json::to_string(&record.status)?;

    conn.execute(
        "INSERT INTO operations (operation_id, source_artifact_id, kind, options, status,
         result_artifact_id, error, requested_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.operation_id.to_string(),
            record.source_artifact_id.to_string(),
            kind_json,
            options_json,
            status_json,
            record.result_artifact_id.map(|id| id.to_string()),
            record.error,
            record.requested_by,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| FalzwerkError::Catalog(format!("insert operation: {e}")))?;

    info!(operation_id = %record.operation_id, "operation record inserted");
    Ok(())
}

fn update_operation_inner(
    conn: &Connection,
    operation_id: OperationId,
    update: OperationUpdate,
) -> Result<()> {
    let current = find_operation_inner(conn, operation_id)?
        .ok_or(FalzwerkError::OperationNotFound(operation_id))?;

    if let Some(next) = update.status
        && !current.status.can_transition_to(next)
    {
        return Err(FalzwerkError::Catalog(format!(
            "operation {operation_id} cannot move from {} to {next}",
            current.status
        )));
    }

    let status = update.status.unwrap_or(current.status);
    let result_artifact_id = update.result_artifact_id.or(current.result_artifact_id);
    let error = update.error.or(current.error);
    let status_json = serde_json::to_string(&status)?;
    let updated_at = Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE operations SET status = ?1, result_artifact_id = ?2, error = ?3, updated_at = ?4
         WHERE operation_id = ?5",
        params![
            status_json,
            result_artifact_id.map(|id| id.to_string()),
            error,
            updated_at,
            operation_id.to_string(),
        ],
    )
    .map_err(|e| FalzwerkError::Catalog(format!("update operation: {e}")))?;

    debug!(%operation_id, status = %status, "operation record updated");
    Ok(())
}

fn find_file_inner(conn: &Connection, artifact_id: ArtifactId) -> Result<Option<ArtifactRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT artifact_id, container, object_path, mime_type, size_bytes, sha256,
                    created_at, owner_id, lineage_parent_id, origin, pdf_info
             FROM files WHERE artifact_id = ?1",
        )
        .map_err(|e| FalzwerkError::Catalog(format!("prepare find_file: {e}")))?;

    let mut rows = stmt
        .query_map(params![artifact_id.to_string()], row_to_artifact_record)
        .map_err(|e| FalzwerkError::Catalog(format!("query find_file: {e}")))?;

    match rows.next() {
        Some(Ok(record)) => Ok(Some(record)),
        Some(Err(e)) => Err(FalzwerkError::Catalog(format!("row parse: {e}"))),
        None => Ok(None),
    }
}

fn find_operation_inner(
    conn: &Connection,
    operation_id: OperationId,
) -> Result<Option<OperationRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT operation_id, source_artifact_id, kind, options, status,
                    result_artifact_id, error, requested_by, created_at, updated_at
             FROM operations WHERE operation_id = ?1",
        )
        .map_err(|e| FalzwerkError::Catalog(format!("prepare find_operation: {e}")))?;

    let mut rows = stmt
        .query_map(params![operation_id.to_string()], row_to_operation_record)
        .map_err(|e| FalzwerkError::Catalog(format!("query find_operation: {e}")))?;

    match rows.next() {
        Some(Ok(record)) => Ok(Some(record)),
        Some(Err(e)) => Err(FalzwerkError::Catalog(format!("row parse: {e}"))),
        None => Ok(None),
    }
}

fn list_files_inner(
    conn: &Connection,
    owner_id: &str,
    offset: u64,
    limit: u64,
) -> Result<Vec<ArtifactRecord>> {
    let mut stmt = conn
        .prepare(
            "SELECT artifact_id, container, object_path, mime_type, size_bytes, sha256,
                    created_at, owner_id, lineage_parent_id, origin, pdf_info
             FROM files WHERE owner_id = ?1
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
        )
        .map_err(|e| FalzwerkError::Catalog(format!("prepare list_files: {e}")))?;

    let records = stmt
        .query_map(
            params![owner_id, limit as i64, offset as i64],
            row_to_artifact_record,
        )
        .map_err(|e| FalzwerkError::Catalog(format!("query list_files: {e}")))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| FalzwerkError::Catalog(format!("collect rows: {e}")))?;

    debug!(count = records.len(), "files listed");
    Ok(records)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_err(
    index: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_uuid(index: usize, value: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).map_err(|e| conversion_err(index, e))
}

fn parse_timestamp(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(index, e))
}

/// Map a SQLite row to an `ArtifactRecord`. Column indices must match the
/// SELECT order used above.
fn row_to_artifact_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ArtifactRecord> {
    let artifact_id_str: String = row.get(0)?;
    let container: String = row.get(1)?;
    let object_path: String = row.get(2)?;
    let mime_type: String = row.get(3)?;
    let size_bytes: i64 = row.get(4)?;
    let sha256: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;
    let owner_id: Option<String> = row.get(7)?;
    let lineage_parent_str: Option<String> = row.get(8)?;
    let origin_json: String = row.get(9)?;
    let pdf_info_json: Option<String> = row.get(10)?;

    let artifact_id = ArtifactId(parse_uuid(0, &artifact_id_str)?);
    let created_at = parse_timestamp(6, &created_at_str)?;
    let lineage_parent_id = lineage_parent_str
        .map(|value| parse_uuid(8, &value).map(ArtifactId))
        .transpose()?;
    let origin: ArtifactOrigin =
        serde_json::from_str(&origin_json).map_err(|e| conversion_err(9, e))?;
    let pdf_info: Option<PdfSummary> = pdf_info_json
        .map(|value| serde_json::from_str(&value).map_err(|e| conversion_err(10, e)))
        .transpose()?;

    Ok(ArtifactRecord {
        artifact_id,
        locator: ArtifactLocator::new(container, object_path),
        mime_type,
        size_bytes: size_bytes as u64,
        sha256,
        created_at,
        owner_id,
        lineage_parent_id,
        origin,
        pdf_info,
    })
}

/// Map a SQLite row to an `OperationRecord`.
fn row_to_operation_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<OperationRecord> {
    let operation_id_str: String = row.get(0)?;
    let source_artifact_str: String = row.get(1)?;
    let kind_json: String = row.get(2)?;
    let options_json: String = row.get(3)?;
    let status_json: String = row.get(4)?;
    let result_artifact_str: Option<String> = row.get(5)?;
    let error: Option<String> = row.get(6)?;
    let requested_by: Option<String> = row.get(7)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    let operation_id = OperationId(parse_uuid(0, &operation_id_str)?);
    let source_artifact_id = ArtifactId(parse_uuid(1, &source_artifact_str)?);
    let kind: OperationKind = serde_json::from_str(&kind_json).map_err(|e| conversion_err(2, e))?;
    let options: OperationOptions =
        serde_json::from_str(&options_json).map_err(|e| conversion_err(3, e))?;
    let status: OperationStatus =
        serde_json::from_str(&status_json).map_err(|e| conversion_err(4, e))?;
    let result_artifact_id = result_artifact_str
        .map(|value| parse_uuid(5, &value).map(ArtifactId))
        .transpose()?;
    let created_at = parse_timestamp(8, &created_at_str)?;
    let updated_at = parse_timestamp(9, &updated_at_str)?;

    Ok(OperationRecord {
        operation_id,
        source_artifact_id,
        kind,
        options,
        status,
        result_artifact_id,
        error,
        requested_by,
        created_at,
        updated_at,
    })
}
