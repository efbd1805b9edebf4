// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage interface for items and their embedding vectors, plus the
//! SQLite implementation.
//!
//! The core only reads items, reads embeddings by parent or by id, and
//! inserts new embedding records. Records are never updated in place.

use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::embedding::codec;
use crate::errors::{Error, Result};

/// SQLite's default host-parameter limit leaves room for a few extra binds.
const MAX_VARS: usize = 900;

/// A thread or comment record. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    /// Parent post; `None` for top-level posts
    #[serde(default, alias = "parent")]
    pub parent_id: Option<i64>,
    #[serde(default, alias = "by")]
    pub author: String,
    #[serde(default)]
    pub text: String,
    /// Unix timestamp in seconds
    #[serde(default, alias = "time")]
    pub created_at: i64,
    #[serde(default)]
    pub title: String,
}

/// One stored vector. At most one exists per `(item_id, model)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub item_id: i64,
    pub model: String,
    pub vector: Vec<f32>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl EmbeddingRecord {
    /// New record stamped with the current time.
    pub fn new(item_id: i64, model: &str, vector: Vec<f32>) -> Self {
        let now = now_unix();
        Self {
            item_id,
            model: model.to_string(),
            vector,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence access pattern required by ingestion and search.
///
/// Implementations must allow concurrent reads and concurrent inserts of
/// distinct records.
pub trait EmbeddingStore: Send + Sync {
    /// Most recent `window` posts whose title matches `category`, newest first.
    fn items_by_category(&self, category: &str, window: usize) -> Result<Vec<Item>>;

    /// Direct children of a post, in id order.
    fn children_of(&self, item_id: i64) -> Result<Vec<Item>>;

    /// Embeddings under `model` for every child of `parent_id`.
    fn embeddings_by_parent(&self, model: &str, parent_id: i64) -> Result<Vec<EmbeddingRecord>>;

    /// Embeddings under `model` for the given items. Missing ids are skipped.
    fn embeddings_by_ids(&self, model: &str, ids: &[i64]) -> Result<Vec<EmbeddingRecord>>;

    /// Items with the given ids. Missing ids are skipped.
    fn items_by_ids(&self, ids: &[i64]) -> Result<Vec<Item>>;

    /// Inserts a new record; never overwrites an existing one.
    ///
    /// Returns `false` when a record for the same `(item_id, model)` already
    /// existed and nothing was written.
    fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<bool>;
}

/// SQLite-backed store.
///
/// Stores data in `.threadrank/threadrank.sqlite` by default. The connection
/// sits behind a mutex so one store can be shared by worker threads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Opens or creates a store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::store(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(&path)?;
        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::store(format!("Connection lock poisoned: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                parent INTEGER,
                author TEXT NOT NULL DEFAULT '',
                text TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_items_parent ON items(parent);

            CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_embeddings_item_model
                ON embeddings(item_id, model);
            "#,
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', '1')",
            [],
        )?;
        Ok(())
    }

    /// Inserts or refreshes items, e.g. from an import file.
    pub fn insert_items(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO items (id, parent, author, text, created_at, title)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    parent = excluded.parent,
                    author = excluded.author,
                    text = excluded.text,
                    created_at = excluded.created_at,
                    title = excluded.title
                "#,
            )?;
            for item in items {
                stmt.execute(params![
                    item.id,
                    item.parent_id,
                    item.author,
                    item.text,
                    item.created_at,
                    item.title
                ])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    /// Counts stored embeddings for a model.
    pub fn count_embeddings(&self, model: &str) -> Result<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE model = ?1",
            params![model],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn query_items<P: rusqlite::Params>(&self, sql: &str, binds: P) -> Result<Vec<Item>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let items = stmt
            .query_map(binds, item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn query_embeddings<P: rusqlite::Params>(
        &self,
        sql: &str,
        binds: P,
    ) -> Result<Vec<EmbeddingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(binds, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(item_id, model, blob, created_at, updated_at)| {
                Ok(EmbeddingRecord {
                    item_id,
                    model,
                    vector: codec::decode(&blob)?,
                    created_at,
                    updated_at,
                })
            })
            .collect()
    }
}

impl EmbeddingStore for SqliteStore {
    fn items_by_category(&self, category: &str, window: usize) -> Result<Vec<Item>> {
        let window = window as i64;
        self.query_items(
            r#"
            SELECT id, parent, author, text, created_at, title
            FROM items
            WHERE title LIKE ?1
            ORDER BY id DESC
            LIMIT ?2
            "#,
            params![category, window],
        )
    }

    fn children_of(&self, item_id: i64) -> Result<Vec<Item>> {
        self.query_items(
            r#"
            SELECT id, parent, author, text, created_at, title
            FROM items
            WHERE parent = ?1
            ORDER BY id
            "#,
            params![item_id],
        )
    }

    fn embeddings_by_parent(&self, model: &str, parent_id: i64) -> Result<Vec<EmbeddingRecord>> {
        self.query_embeddings(
            r#"
            SELECT e.item_id, e.model, e.embedding, e.created_at, e.updated_at
            FROM embeddings e
            JOIN items i ON i.id = e.item_id
            WHERE e.model = ?1 AND i.parent = ?2
            ORDER BY e.item_id
            "#,
            params![model, parent_id],
        )
    }

    fn embeddings_by_ids(&self, model: &str, ids: &[i64]) -> Result<Vec<EmbeddingRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_VARS) {
            let sql = format!(
                "SELECT item_id, model, embedding, created_at, updated_at \
                 FROM embeddings WHERE model = ?1 AND item_id IN ({})",
                placeholders(2, chunk.len())
            );
            let mut binds: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() + 1);
            binds.push(model.to_string().into());
            binds.extend(chunk.iter().map(|id| rusqlite::types::Value::from(*id)));
            records.extend(self.query_embeddings(&sql, params_from_iter(binds))?);
        }
        Ok(records)
    }

    fn items_by_ids(&self, ids: &[i64]) -> Result<Vec<Item>> {
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_VARS) {
            let sql = format!(
                "SELECT id, parent, author, text, created_at, title FROM items WHERE id IN ({})",
                placeholders(1, chunk.len())
            );
            items.extend(self.query_items(&sql, params_from_iter(chunk.iter()))?);
        }
        Ok(items)
    }

    fn insert_embedding(&self, record: &EmbeddingRecord) -> Result<bool> {
        let blob = codec::encode(&record.vector);
        let inserted = self.conn()?.execute(
            r#"
            INSERT INTO embeddings (item_id, model, embedding, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(item_id, model) DO NOTHING
            "#,
            params![
                record.item_id,
                record.model,
                blob,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(inserted > 0)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        author: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
        title: row.get(5)?,
    })
}

/// `?start, ?start+1, ...` for `count` binds.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
