//! The storage-agnostic repository contract.

use crate::error::RepoResult;
use async_trait::async_trait;
use fastapp_model::Entity;
use futures::stream::BoxStream;
use std::collections::HashMap;

/// Default page size for internally batched streaming.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Partial-field update: top-level keys merged into the entity's data.
pub type FieldPatch = serde_json::Map<String, serde_json::Value>;

/// A lazy, one-shot sequence of entities. Backend-defined order; dropping
/// the stream releases any backend cursor it holds. Not restartable —
/// call `stream_all` again for a fresh pass.
pub type EntityStream = BoxStream<'static, RepoResult<Entity>>;

/// Uniform CRUD/batch/streaming contract over a storage backend.
///
/// Every operation is a suspension point; no ordering is guaranteed
/// between independently issued calls. Implementations hold a non-owning
/// handle to their backend connection and no other state.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fetches one entity by primary key. `None` when absent.
    async fn get(&self, id: &str) -> RepoResult<Option<Entity>>;

    /// Fetches many entities; missing ids are simply absent from the
    /// result, never an error.
    async fn get_bulk(&self, ids: &[String]) -> RepoResult<HashMap<String, Entity>>;

    /// Inserts or replaces one entity. The returned entity carries a
    /// backend-assigned id when the input id was empty.
    async fn save(&self, entity: Entity) -> RepoResult<Entity>;

    /// `save`, batched. The returned sequence has the same length and
    /// order as the input regardless of how the backend batches.
    async fn save_bulk(&self, entities: Vec<Entity>) -> RepoResult<Vec<Entity>>;

    /// Removes one entity. `true` if a record existed.
    async fn delete(&self, id: &str) -> RepoResult<bool>;

    /// Removes many entities, returning the count actually removed.
    async fn delete_bulk(&self, ids: &[String]) -> RepoResult<u64>;

    /// Merges partial field updates into existing entities. Returns the
    /// number of ids that matched an existing record; ids with no record
    /// are skipped, not errors.
    async fn update_bulk(&self, updates: &HashMap<String, FieldPatch>) -> RepoResult<u64>;

    /// Streams every entity without materializing the full result set.
    /// Internally batched; see [`EntityStream`] for lifecycle rules.
    async fn stream_all(&self) -> RepoResult<EntityStream>;
}
