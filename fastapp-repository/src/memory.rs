//! In-process mock adapter.
//!
//! Keeps entities in a `BTreeMap` behind an `RwLock`. Used by tests to
//! exercise the full contract without a server, and as the reference
//! implementation of the contract's semantics. Stream order is the key
//! order of the map.

use crate::error::{RepoResult, RepositoryError};
use crate::repository::{EntityStream, FieldPatch, Repository, DEFAULT_BATCH_SIZE};
use async_trait::async_trait;
use fastapp_model::Entity;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

type Shared = Arc<RwLock<BTreeMap<String, Entity>>>;

/// Repository backed by an in-process ordered map.
#[derive(Clone)]
pub struct MemoryRepository {
    entities: Shared,
    batch_size: usize,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(BTreeMap::new())),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Overrides the streaming page size (tests exercise small batches).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get(&self, id: &str) -> RepoResult<Option<Entity>> {
        Ok(self.entities.read().expect("lock poisoned").get(id).cloned())
    }

    async fn get_bulk(&self, ids: &[String]) -> RepoResult<HashMap<String, Entity>> {
        let map = self.entities.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| map.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    async fn save(&self, mut entity: Entity) -> RepoResult<Entity> {
        entity.ensure_id();
        self.entities
            .write()
            .expect("lock poisoned")
            .insert(entity.id.clone(), entity.clone());
        Ok(entity)
    }

    async fn save_bulk(&self, entities: Vec<Entity>) -> RepoResult<Vec<Entity>> {
        let mut saved = Vec::with_capacity(entities.len());
        let mut map = self.entities.write().expect("lock poisoned");
        for mut entity in entities {
            entity.ensure_id();
            map.insert(entity.id.clone(), entity.clone());
            saved.push(entity);
        }
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> RepoResult<bool> {
        Ok(self
            .entities
            .write()
            .expect("lock poisoned")
            .remove(id)
            .is_some())
    }

    async fn delete_bulk(&self, ids: &[String]) -> RepoResult<u64> {
        let mut map = self.entities.write().expect("lock poisoned");
        Ok(ids.iter().filter(|id| map.remove(*id).is_some()).count() as u64)
    }

    async fn update_bulk(&self, updates: &HashMap<String, FieldPatch>) -> RepoResult<u64> {
        let mut map = self.entities.write().expect("lock poisoned");
        let mut matched = 0;
        for (id, fields) in updates {
            if let Some(entity) = map.get_mut(id) {
                entity
                    .merge_fields(fields)
                    .map_err(|e| RepositoryError::Validation(e.to_string()))?;
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn stream_all(&self) -> RepoResult<EntityStream> {
        let entities = Arc::clone(&self.entities);
        let batch = self.batch_size;
        let pages = stream::unfold(
            (entities, None::<String>),
            move |(entities, last)| async move {
                let page: Vec<Entity> = {
                    let map = entities.read().expect("lock poisoned");
                    let lower = match &last {
                        Some(key) => Bound::Excluded(key.clone()),
                        None => Bound::Unbounded,
                    };
                    map.range((lower, Bound::Unbounded))
                        .take(batch)
                        .map(|(_, e)| e.clone())
                        .collect()
                };
                let next_last = page.last().map(|e| e.id.clone());
                if page.is_empty() {
                    None
                } else {
                    Some((page, (entities, next_last)))
                }
            },
        );
        Ok(pages
            .flat_map(|page| stream::iter(page.into_iter().map(Ok)))
            .boxed())
    }
}
