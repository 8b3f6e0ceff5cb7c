//! Key-value adapter over Redis.
//!
//! Entities are JSON strings under `{prefix}:{id}` keys. The shared
//! `ConnectionManager` is externally owned; it is `Clone` and multiplexes,
//! so every operation works on its own cheap clone. Streaming walks the
//! keyspace with cursor-based SCAN plus MGET batches; SCAN may revisit a
//! key during rehashing, so the stream tracks yielded ids to keep each
//! entity unique.

use crate::error::{RepoResult, RepositoryError};
use crate::repository::{EntityStream, FieldPatch, Repository, DEFAULT_BATCH_SIZE};
use async_trait::async_trait;
use fastapp_model::{validate_identifier, Entity};
use futures::stream::{self, StreamExt};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};

/// Repository backed by a Redis keyspace slice.
#[derive(Clone)]
pub struct RedisRepository {
    conn: ConnectionManager,
    prefix: String,
    batch_size: usize,
}

impl RedisRepository {
    /// Creates an adapter over an externally owned connection manager.
    /// The key prefix is validated like any other dynamic identifier.
    pub fn new(conn: ConnectionManager, prefix: &str) -> RepoResult<Self> {
        validate_identifier(prefix)?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Overrides the SCAN/MGET page size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }

    fn id_from_key<'a>(prefix: &str, key: &'a str) -> &'a str {
        key.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(key)
    }
}

#[async_trait]
impl Repository for RedisRepository {
    async fn get(&self, id: &str) -> RepoResult<Option<Entity>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(id)).await.map_err(translate)?;
        raw.map(|raw| decode(id.to_string(), &raw)).transpose()
    }

    async fn get_bulk(&self, ids: &[String]) -> RepoResult<HashMap<String, Entity>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> = conn.mget(&keys).await.map_err(translate)?;
        let mut found = HashMap::new();
        for (id, raw) in ids.iter().zip(values) {
            if let Some(raw) = raw {
                found.insert(id.clone(), decode(id.clone(), &raw)?);
            }
        }
        Ok(found)
    }

    async fn save(&self, mut entity: Entity) -> RepoResult<Entity> {
        entity.ensure_id();
        let raw = serde_json::to_string(&entity.data)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.key(&entity.id), raw)
            .await
            .map_err(translate)?;
        Ok(entity)
    }

    async fn save_bulk(&self, entities: Vec<Entity>) -> RepoResult<Vec<Entity>> {
        let mut pairs = Vec::with_capacity(entities.len());
        let mut saved = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.ensure_id();
            pairs.push((self.key(&entity.id), serde_json::to_string(&entity.data)?));
            saved.push(entity);
        }
        if !pairs.is_empty() {
            let mut conn = self.conn.clone();
            conn.mset::<_, _, ()>(&pairs).await.map_err(translate)?;
        }
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> RepoResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(self.key(id)).await.map_err(translate)?;
        Ok(removed > 0)
    }

    async fn delete_bulk(&self, ids: &[String]) -> RepoResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = ids.iter().map(|id| self.key(id)).collect();
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).await.map_err(translate)?;
        Ok(removed)
    }

    async fn update_bulk(&self, updates: &HashMap<String, FieldPatch>) -> RepoResult<u64> {
        // Read-merge-write per id. Redis has no server-side JSON merge in
        // the core command set; last-writer-wins is acceptable for a cache
        // backend.
        let mut conn = self.conn.clone();
        let mut matched = 0;
        for (id, fields) in updates {
            let key = self.key(id);
            let raw: Option<String> = conn.get(&key).await.map_err(translate)?;
            let Some(raw) = raw else {
                continue;
            };
            let mut entity = decode(id.clone(), &raw)?;
            entity
                .merge_fields(fields)
                .map_err(|e| RepositoryError::Validation(e.to_string()))?;
            let merged = serde_json::to_string(&entity.data)?;
            conn.set::<_, _, ()>(&key, merged).await.map_err(translate)?;
            matched += 1;
        }
        Ok(matched)
    }

    async fn stream_all(&self) -> RepoResult<EntityStream> {
        struct ScanState {
            conn: ConnectionManager,
            prefix: String,
            cursor: u64,
            started: bool,
            seen: HashSet<String>,
        }

        let state = ScanState {
            conn: self.conn.clone(),
            prefix: self.prefix.clone(),
            cursor: 0,
            started: false,
            seen: HashSet::new(),
        };
        let batch = self.batch_size;

        let pages = stream::unfold(state, move |mut st| async move {
            if st.started && st.cursor == 0 {
                return None;
            }
            st.started = true;
            let pattern = format!("{}:*", st.prefix);
            let scanned: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(st.cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(batch)
                .query_async(&mut st.conn)
                .await;
            let (next_cursor, keys) = match scanned {
                Ok(pair) => pair,
                Err(err) => {
                    st.cursor = 0;
                    return Some((vec![Err(translate(err))], st));
                }
            };
            st.cursor = next_cursor;

            let keys: Vec<String> = keys
                .into_iter()
                .filter(|key| {
                    st.seen
                        .insert(Self::id_from_key(&st.prefix, key).to_string())
                })
                .collect();
            if keys.is_empty() {
                return Some((Vec::new(), st));
            }

            let values: Result<Vec<Option<String>>, _> = st.conn.mget(&keys).await;
            let page = match values {
                Ok(values) => keys
                    .iter()
                    .zip(values)
                    .filter_map(|(key, raw)| {
                        let id = Self::id_from_key(&st.prefix, key).to_string();
                        raw.map(|raw| decode(id, &raw))
                    })
                    .collect(),
                Err(err) => {
                    st.cursor = 0;
                    vec![Err(translate(err))]
                }
            };
            Some((page, st))
        });
        Ok(pages.flat_map(stream::iter).boxed())
    }
}

fn decode(id: String, raw: &str) -> RepoResult<Entity> {
    let data: serde_json::Value = serde_json::from_str(raw)?;
    Ok(Entity::new(id, data))
}

/// Maps driver errors into the adapter-boundary taxonomy.
fn translate(err: redis::RedisError) -> RepositoryError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        RepositoryError::Unavailable(err.to_string())
    } else {
        RepositoryError::Backend(err.to_string())
    }
}
