//! Analytical adapter over DuckDB.
//!
//! Read-mostly: the uniform contract works against an
//! `(id VARCHAR PRIMARY KEY, data VARCHAR)` table holding JSON text, and
//! [`AnalyticsRepository::query`] is the documented escape hatch for ad-hoc
//! aggregation the contract cannot express. Table names come from
//! configuration and are validated before any SQL text is built.
//!
//! DuckDB's connection is synchronous; operations run under a mutex and
//! never hold it across an await point.

use crate::error::{RepoResult, RepositoryError};
use crate::repository::{EntityStream, FieldPatch, Repository, DEFAULT_BATCH_SIZE};
use async_trait::async_trait;
use duckdb::types::Value;
use duckdb::{params, Connection};
use fastapp_model::{validate_identifier, Entity};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Repository backed by a DuckDB table of JSON rows.
#[derive(Clone)]
pub struct AnalyticsRepository {
    conn: Arc<Mutex<Connection>>,
    table: String,
    batch_size: usize,
}

impl AnalyticsRepository {
    /// Creates an adapter over an externally owned connection and
    /// bootstraps the backing table.
    pub fn new(conn: Arc<Mutex<Connection>>, table: &str) -> RepoResult<Self> {
        validate_identifier(table)?;
        let repo = Self {
            conn,
            table: table.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    /// Convenience constructor for an in-memory database.
    pub fn open_in_memory(table: &str) -> RepoResult<Self> {
        let conn = Connection::open_in_memory().map_err(translate)?;
        Self::new(Arc::new(Mutex::new(conn)), table)
    }

    /// Overrides the streaming page size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn ensure_table(&self) -> RepoResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id VARCHAR PRIMARY KEY, data VARCHAR NOT NULL)",
            self.table
        );
        self.lock().execute(&sql, []).map_err(translate)?;
        debug!(table = %self.table, "analytics table ready");
        Ok(())
    }

    /// Runs an ad-hoc parameterized query, returning rows as value grids.
    /// This is deliberately outside the [`Repository`] contract: analytical
    /// aggregation does not fit uniform CRUD, and callers opting in accept
    /// backend-specific SQL.
    pub fn query(&self, sql: &str, params: &[&dyn duckdb::ToSql]) -> RepoResult<Vec<Vec<Value>>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql).map_err(translate)?;
        let mut rows = stmt.query(params).map_err(translate)?;
        let mut grid = Vec::new();
        while let Some(row) = rows.next().map_err(translate)? {
            let cols = row.as_ref().column_count();
            let mut values: Vec<Value> = Vec::with_capacity(cols);
            for i in 0..cols {
                values.push(row.get::<_, Value>(i).map_err(translate)?);
            }
            grid.push(values);
        }
        Ok(grid)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("duckdb lock poisoned")
    }
}

#[async_trait]
impl Repository for AnalyticsRepository {
    async fn get(&self, id: &str) -> RepoResult<Option<Entity>> {
        let sql = format!("SELECT data FROM {} WHERE id = ?", self.table);
        let raw = optional_row(self.lock().query_row(&sql, params![id], |row| row.get(0)))?;
        raw.map(|raw| decode(id.to_string(), &raw)).transpose()
    }

    async fn get_bulk(&self, ids: &[String]) -> RepoResult<HashMap<String, Entity>> {
        let mut found = HashMap::new();
        let sql = format!("SELECT data FROM {} WHERE id = ?", self.table);
        let conn = self.lock();
        let mut stmt = conn.prepare(&sql).map_err(translate)?;
        for id in ids {
            let raw = optional_row(stmt.query_row(params![id], |row| row.get(0)))?;
            if let Some(raw) = raw {
                found.insert(id.clone(), decode(id.clone(), &raw)?);
            }
        }
        Ok(found)
    }

    async fn save(&self, mut entity: Entity) -> RepoResult<Entity> {
        entity.ensure_id();
        let raw = serde_json::to_string(&entity.data)?;
        let sql = format!("INSERT OR REPLACE INTO {} (id, data) VALUES (?, ?)", self.table);
        self.lock()
            .execute(&sql, params![entity.id, raw])
            .map_err(translate)?;
        Ok(entity)
    }

    async fn save_bulk(&self, entities: Vec<Entity>) -> RepoResult<Vec<Entity>> {
        let sql = format!("INSERT OR REPLACE INTO {} (id, data) VALUES (?, ?)", self.table);
        let mut saved = Vec::with_capacity(entities.len());
        let conn = self.lock();
        let mut stmt = conn.prepare(&sql).map_err(translate)?;
        for mut entity in entities {
            entity.ensure_id();
            let raw = serde_json::to_string(&entity.data)?;
            stmt.execute(params![entity.id, raw]).map_err(translate)?;
            saved.push(entity);
        }
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> RepoResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let removed = self.lock().execute(&sql, params![id]).map_err(translate)?;
        Ok(removed > 0)
    }

    async fn delete_bulk(&self, ids: &[String]) -> RepoResult<u64> {
        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let mut removed = 0u64;
        let conn = self.lock();
        let mut stmt = conn.prepare(&sql).map_err(translate)?;
        for id in ids {
            removed += stmt.execute(params![id]).map_err(translate)? as u64;
        }
        Ok(removed)
    }

    async fn update_bulk(&self, updates: &HashMap<String, FieldPatch>) -> RepoResult<u64> {
        // Host-side read-merge-write; the connection mutex serializes the
        // cycle against other operations on this handle.
        let select = format!("SELECT data FROM {} WHERE id = ?", self.table);
        let update = format!("UPDATE {} SET data = ? WHERE id = ?", self.table);
        let mut matched = 0;
        let conn = self.lock();
        for (id, fields) in updates {
            let raw = optional_row(conn.query_row(&select, params![id], |row| row.get(0)))?;
            let Some(raw) = raw else {
                continue;
            };
            let mut entity = decode(id.clone(), &raw)?;
            entity
                .merge_fields(fields)
                .map_err(|e| RepositoryError::Validation(e.to_string()))?;
            let merged = serde_json::to_string(&entity.data)?;
            conn.execute(&update, params![merged, id]).map_err(translate)?;
            matched += 1;
        }
        Ok(matched)
    }

    async fn stream_all(&self) -> RepoResult<EntityStream> {
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        let batch = self.batch_size;
        let pages = stream::unfold(
            (conn, None::<String>, false),
            move |(conn, last, done)| {
                let table = table.clone();
                async move {
                    if done {
                        return None;
                    }
                    let page = fetch_page(&conn, &table, last.as_deref(), batch);
                    match page {
                        Ok(page) if page.is_empty() => None,
                        Ok(page) => {
                            let next_last = page.last().map(|e| e.id.clone());
                            let items: Vec<RepoResult<Entity>> =
                                page.into_iter().map(Ok).collect();
                            Some((items, (conn, next_last, false)))
                        }
                        Err(err) => Some((vec![Err(err)], (conn, last, true))),
                    }
                }
            },
        );
        Ok(pages.flat_map(stream::iter).boxed())
    }
}

fn fetch_page(
    conn: &Arc<Mutex<Connection>>,
    table: &str,
    last: Option<&str>,
    batch: usize,
) -> RepoResult<Vec<Entity>> {
    let conn = conn.lock().expect("duckdb lock poisoned");
    let sql = match last {
        Some(_) => format!("SELECT id, data FROM {table} WHERE id > ? ORDER BY id LIMIT {batch}"),
        None => format!("SELECT id, data FROM {table} ORDER BY id LIMIT {batch}"),
    };
    let mut stmt = conn.prepare(&sql).map_err(translate)?;
    let mut rows = match last {
        Some(last) => stmt.query(params![last]).map_err(translate)?,
        None => stmt.query([]).map_err(translate)?,
    };
    let mut page = Vec::new();
    while let Some(row) = rows.next().map_err(translate)? {
        let id: String = row.get(0).map_err(translate)?;
        let raw: String = row.get(1).map_err(translate)?;
        page.push(decode(id, &raw)?);
    }
    Ok(page)
}

fn decode(id: String, raw: &str) -> RepoResult<Entity> {
    let data: serde_json::Value = serde_json::from_str(raw)?;
    Ok(Entity::new(id, data))
}

/// `None` for the no-rows case, which the contract treats as absence.
fn optional_row(
    result: Result<String, duckdb::Error>,
) -> RepoResult<Option<String>> {
    match result {
        Ok(raw) => Ok(Some(raw)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(translate(err)),
    }
}

/// Maps driver errors into the adapter-boundary taxonomy. An embedded
/// engine has no connection-loss class, so everything is `Backend`.
fn translate(err: duckdb::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}
