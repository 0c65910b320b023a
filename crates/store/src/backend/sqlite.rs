//! SQLite-backed storage for collections and documents.
//!
//! One database file can hold many partitions. The connection sits behind a
//! mutex; each operation holds the guard for its whole duration and
//! multi-statement changes run inside a transaction that rolls back on drop.

use crate::backend::envelope::{bytes_to_embedding, decode_body, embedding_to_bytes, encode_body};
use crate::backend::StorageBackend;
use crate::locks::CollectionLocks;
use crate::types::{Collection, CollectionKey, DistanceMetric, Document};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use recall_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        partition_key TEXT NOT NULL,
        name TEXT NOT NULL,
        embedding_dimension INTEGER,
        distance_metric TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (partition_key, name)
    );

    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        partition_key TEXT NOT NULL,
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        embedding BLOB,
        UNIQUE (partition_key, collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection
        ON documents (partition_key, collection, seq);
"#;

/// Storage backend persisting to a SQLite database.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    locks: CollectionLocks,
}

fn backend_err(context: &str, e: rusqlite::Error) -> AppError {
    AppError::Backend(format!("{}: {}", context, e))
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Backend(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| backend_err("Failed to open SQLite database", e))?;

        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| backend_err("Failed to open in-memory SQLite database", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| backend_err("Failed to create tables", e))?;

        Ok(Self {
            conn: Mutex::new(conn),
            locks: CollectionLocks::new(),
        })
    }

    fn require_collection(conn: &Connection, key: &CollectionKey) -> AppResult<()> {
        if Self::exists(conn, key)? {
            Ok(())
        } else {
            Err(AppError::collection_not_found(&key.to_string()))
        }
    }

    fn exists(conn: &Connection, key: &CollectionKey) -> AppResult<bool> {
        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM collections WHERE partition_key = ?1 AND name = ?2)",
            params![key.partition, key.name],
            |row| row.get(0),
        )
        .map_err(|e| backend_err("Failed to check collection", e))
    }

    fn row_to_collection(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCollection> {
        Ok(RawCollection {
            name: row.get(0)?,
            embedding_dimension: row.get(1)?,
            distance_metric: row.get(2)?,
            created_at: row.get(3)?,
            document_count: row.get(4)?,
        })
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
        Ok(RawDocument {
            id: row.get(0)?,
            body: row.get(1)?,
            embedding: row.get(2)?,
        })
    }
}

/// Collection row before validation.
struct RawCollection {
    name: String,
    embedding_dimension: Option<i64>,
    distance_metric: String,
    created_at: String,
    document_count: i64,
}

impl RawCollection {
    fn into_collection(self) -> AppResult<Collection> {
        let distance_metric: DistanceMetric = self.distance_metric.parse()?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Serialization(format!("Invalid created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Collection {
            name: self.name,
            embedding_dimension: self.embedding_dimension.map(|d| d as usize),
            distance_metric,
            created_at,
            document_count: self.document_count as usize,
        })
    }
}

/// Document row before decoding.
struct RawDocument {
    id: String,
    body: String,
    embedding: Option<Vec<u8>>,
}

impl RawDocument {
    fn into_document(self) -> AppResult<Document> {
        let embedding = self
            .embedding
            .as_deref()
            .map(bytes_to_embedding)
            .transpose()?;
        decode_body(self.id, &self.body, embedding)
    }
}

impl StorageBackend for SqliteBackend {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    fn collection_locks(&self) -> &CollectionLocks {
        &self.locks
    }

    fn collection_exists(&self, key: &CollectionKey) -> AppResult<bool> {
        let conn = self.conn.lock();
        Self::exists(&conn, key)
    }

    fn get_collection(&self, key: &CollectionKey) -> AppResult<Option<Collection>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT name, embedding_dimension, distance_metric, created_at, (
                     SELECT COUNT(*) FROM documents d
                     WHERE d.partition_key = c.partition_key AND d.collection = c.name
                 )
                 FROM collections c WHERE c.partition_key = ?1 AND c.name = ?2",
                params![key.partition, key.name],
                Self::row_to_collection,
            )
            .optional()
            .map_err(|e| backend_err("Failed to read collection", e))?;

        raw.map(RawCollection::into_collection).transpose()
    }

    fn create_collection(&self, key: &CollectionKey, collection: &Collection) -> AppResult<()> {
        let conn = self.conn.lock();
        if Self::exists(&conn, key)? {
            return Err(AppError::AlreadyExists(format!("collection '{}'", key)));
        }

        conn.execute(
            "INSERT INTO collections (partition_key, name, embedding_dimension, distance_metric, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.partition,
                key.name,
                collection.embedding_dimension.map(|d| d as i64),
                collection.distance_metric.as_str(),
                collection.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| backend_err("Failed to create collection", e))?;

        Ok(())
    }

    fn update_collection(&self, key: &CollectionKey, collection: &Collection) -> AppResult<()> {
        let conn = self.conn.lock();
        let updated = conn
            .execute(
                "UPDATE collections
                 SET embedding_dimension = ?3, distance_metric = ?4, created_at = ?5
                 WHERE partition_key = ?1 AND name = ?2",
                params![
                    key.partition,
                    key.name,
                    collection.embedding_dimension.map(|d| d as i64),
                    collection.distance_metric.as_str(),
                    collection.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| backend_err("Failed to update collection", e))?;

        if updated == 0 {
            return Err(AppError::collection_not_found(&key.to_string()));
        }
        Ok(())
    }

    fn drop_collection(&self, key: &CollectionKey) -> AppResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| backend_err("Failed to begin transaction", e))?;

        tx.execute(
            "DELETE FROM documents WHERE partition_key = ?1 AND collection = ?2",
            params![key.partition, key.name],
        )
        .map_err(|e| backend_err("Failed to delete documents", e))?;

        let removed = tx
            .execute(
                "DELETE FROM collections WHERE partition_key = ?1 AND name = ?2",
                params![key.partition, key.name],
            )
            .map_err(|e| backend_err("Failed to delete collection", e))?;

        tx.commit()
            .map_err(|e| backend_err("Failed to commit collection drop", e))?;

        Ok(removed > 0)
    }

    fn list_collections(&self, partition: &str) -> AppResult<Vec<Collection>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name, embedding_dimension, distance_metric, created_at, (
                     SELECT COUNT(*) FROM documents d
                     WHERE d.partition_key = c.partition_key AND d.collection = c.name
                 )
                 FROM collections c WHERE c.partition_key = ?1 ORDER BY c.seq",
            )
            .map_err(|e| backend_err("Failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![partition], Self::row_to_collection)
            .map_err(|e| backend_err("Failed to list collections", e))?;

        let mut collections = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| backend_err("Failed to read collection row", e))?;
            collections.push(raw.into_collection()?);
        }
        Ok(collections)
    }

    fn contains_document(&self, key: &CollectionKey, id: &str) -> AppResult<bool> {
        let conn = self.conn.lock();
        Self::require_collection(&conn, key)?;

        conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM documents
             WHERE partition_key = ?1 AND collection = ?2 AND id = ?3)",
            params![key.partition, key.name, id],
            |row| row.get(0),
        )
        .map_err(|e| backend_err("Failed to check document", e))
    }

    fn get_document(&self, key: &CollectionKey, id: &str) -> AppResult<Option<Document>> {
        let conn = self.conn.lock();
        Self::require_collection(&conn, key)?;

        let raw = conn
            .query_row(
                "SELECT id, body, embedding FROM documents
                 WHERE partition_key = ?1 AND collection = ?2 AND id = ?3",
                params![key.partition, key.name, id],
                Self::row_to_document,
            )
            .optional()
            .map_err(|e| backend_err("Failed to read document", e))?;

        raw.map(RawDocument::into_document).transpose()
    }

    fn put_document(&self, key: &CollectionKey, document: &Document) -> AppResult<()> {
        let body = encode_body(document)?;
        let embedding = document.embedding.as_deref().map(embedding_to_bytes);

        let conn = self.conn.lock();
        Self::require_collection(&conn, key)?;

        // ON CONFLICT keeps the row (and its seq), so overwrites stay in place
        conn.execute(
            "INSERT INTO documents (partition_key, collection, id, body, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (partition_key, collection, id)
             DO UPDATE SET body = excluded.body, embedding = excluded.embedding",
            params![key.partition, key.name, document.id, body, embedding],
        )
        .map_err(|e| backend_err("Failed to write document", e))?;

        Ok(())
    }

    fn delete_document(&self, key: &CollectionKey, id: &str) -> AppResult<bool> {
        let conn = self.conn.lock();
        Self::require_collection(&conn, key)?;

        let removed = conn
            .execute(
                "DELETE FROM documents WHERE partition_key = ?1 AND collection = ?2 AND id = ?3",
                params![key.partition, key.name, id],
            )
            .map_err(|e| backend_err("Failed to delete document", e))?;

        Ok(removed > 0)
    }

    fn scan(&self, key: &CollectionKey) -> AppResult<Vec<Document>> {
        let conn = self.conn.lock();
        Self::require_collection(&conn, key)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, body, embedding FROM documents
                 WHERE partition_key = ?1 AND collection = ?2 ORDER BY seq",
            )
            .map_err(|e| backend_err("Failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![key.partition, key.name], Self::row_to_document)
            .map_err(|e| backend_err("Failed to scan documents", e))?;

        let mut documents = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| backend_err("Failed to read document row", e))?;
            documents.push(raw.into_document()?);
        }

        tracing::debug!("Scanned {} documents from {}", documents.len(), key);
        Ok(documents)
    }

    fn count_documents(&self, key: &CollectionKey) -> AppResult<usize> {
        let conn = self.conn.lock();
        Self::require_collection(&conn, key)?;

        conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE partition_key = ?1 AND collection = ?2",
            params![key.partition, key.name],
            |row| row.get::<_, i64>(0).map(|v| v as usize),
        )
        .map_err(|e| backend_err("Failed to count documents", e))
    }
}
