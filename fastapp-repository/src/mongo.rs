//! Document-store adapter over the MongoDB driver.
//!
//! Entities are stored as `{_id, data}` documents. Document-store
//! transactions need an explicit session object, so this adapter exposes a
//! transaction-handle API keyed by a caller-supplied id: the caller owns
//! the handle's lifecycle (`prepare` then `commit` or `rollback`) and must
//! not use the same handle id concurrently.

use crate::error::{RepoResult, RepositoryError};
use crate::repository::{EntityStream, FieldPatch, Repository};
use async_trait::async_trait;
use fastapp_model::{validate_identifier, Entity};
use futures::stream::StreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, ClientSession, Collection};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Repository backed by a MongoDB collection.
pub struct MongoRepository {
    client: Client,
    coll: Collection<Document>,
    sessions: Mutex<HashMap<String, ClientSession>>,
}

impl MongoRepository {
    /// Creates an adapter over an externally owned client. Database and
    /// collection names are validated before use.
    pub fn new(client: Client, database: &str, collection: &str) -> RepoResult<Self> {
        validate_identifier(database)?;
        validate_identifier(collection)?;
        let coll = client.database(database).collection::<Document>(collection);
        Ok(Self {
            client,
            coll,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    // ================================================================
    // Transaction handles
    // ================================================================

    /// Starts a transaction under a caller-chosen handle id. Fails if the
    /// id is already in use; disjoint ids give disjoint transactions.
    pub async fn prepare_transaction(&self, txn_id: &str) -> RepoResult<()> {
        validate_identifier(txn_id)?;
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(txn_id) {
            return Err(RepositoryError::Transaction(format!(
                "transaction '{txn_id}' already prepared"
            )));
        }
        let mut session = self.client.start_session().await.map_err(translate)?;
        session.start_transaction().await.map_err(translate)?;
        sessions.insert(txn_id.to_string(), session);
        debug!(txn_id, "transaction prepared");
        Ok(())
    }

    /// Commits and releases the handle.
    pub async fn commit_transaction(&self, txn_id: &str) -> RepoResult<()> {
        let mut session = self.take_session(txn_id).await?;
        session.commit_transaction().await.map_err(translate)?;
        debug!(txn_id, "transaction committed");
        Ok(())
    }

    /// Aborts and releases the handle.
    pub async fn rollback_transaction(&self, txn_id: &str) -> RepoResult<()> {
        let mut session = self.take_session(txn_id).await?;
        session.abort_transaction().await.map_err(translate)?;
        debug!(txn_id, "transaction rolled back");
        Ok(())
    }

    /// Upserts an entity inside a prepared transaction.
    pub async fn save_in_transaction(&self, txn_id: &str, mut entity: Entity) -> RepoResult<Entity> {
        entity.ensure_id();
        let document = to_document(&entity)?;
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(txn_id).ok_or_else(|| {
            RepositoryError::Transaction(format!("unknown transaction '{txn_id}'"))
        })?;
        self.coll
            .replace_one(doc! { "_id": &entity.id }, document)
            .upsert(true)
            .session(&mut *session)
            .await
            .map_err(translate)?;
        Ok(entity)
    }

    async fn take_session(&self, txn_id: &str) -> RepoResult<ClientSession> {
        self.sessions.lock().await.remove(txn_id).ok_or_else(|| {
            RepositoryError::Transaction(format!("unknown transaction '{txn_id}'"))
        })
    }
}

#[async_trait]
impl Repository for MongoRepository {
    async fn get(&self, id: &str) -> RepoResult<Option<Entity>> {
        let found = self
            .coll
            .find_one(doc! { "_id": id })
            .await
            .map_err(translate)?;
        found.map(from_document).transpose()
    }

    async fn get_bulk(&self, ids: &[String]) -> RepoResult<HashMap<String, Entity>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut cursor = self
            .coll
            .find(doc! { "_id": { "$in": ids } })
            .await
            .map_err(translate)?;
        let mut found = HashMap::new();
        while let Some(document) = cursor.next().await {
            let entity = from_document(document.map_err(translate)?)?;
            found.insert(entity.id.clone(), entity);
        }
        Ok(found)
    }

    async fn save(&self, mut entity: Entity) -> RepoResult<Entity> {
        entity.ensure_id();
        let document = to_document(&entity)?;
        self.coll
            .replace_one(doc! { "_id": &entity.id }, document)
            .upsert(true)
            .await
            .map_err(translate)?;
        Ok(entity)
    }

    async fn save_bulk(&self, entities: Vec<Entity>) -> RepoResult<Vec<Entity>> {
        let mut saved = Vec::with_capacity(entities.len());
        for entity in entities {
            saved.push(self.save(entity).await?);
        }
        Ok(saved)
    }

    async fn delete(&self, id: &str) -> RepoResult<bool> {
        let result = self
            .coll
            .delete_one(doc! { "_id": id })
            .await
            .map_err(translate)?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_bulk(&self, ids: &[String]) -> RepoResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self
            .coll
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(translate)?;
        Ok(result.deleted_count)
    }

    async fn update_bulk(&self, updates: &HashMap<String, FieldPatch>) -> RepoResult<u64> {
        // Read-merge-write so patch keys stay literal top-level keys; a
        // `$set` would reinterpret dotted keys as nested paths and the
        // server rejects keys starting with `$`.
        let mut matched = 0;
        for (id, fields) in updates {
            let found = self
                .coll
                .find_one(doc! { "_id": id })
                .await
                .map_err(translate)?;
            let Some(found) = found else {
                continue;
            };
            let mut entity = from_document(found)?;
            entity
                .merge_fields(fields)
                .map_err(|e| RepositoryError::Validation(e.to_string()))?;
            let document = to_document(&entity)?;
            self.coll
                .replace_one(doc! { "_id": id }, document)
                .await
                .map_err(translate)?;
            matched += 1;
        }
        Ok(matched)
    }

    async fn stream_all(&self) -> RepoResult<EntityStream> {
        let cursor = self.coll.find(doc! {}).await.map_err(translate)?;
        Ok(cursor
            .map(|item| from_document(item.map_err(translate)?))
            .boxed())
    }
}

fn to_document(entity: &Entity) -> RepoResult<Document> {
    let data: Bson = entity
        .data
        .clone()
        .try_into()
        .map_err(|e: mongodb::bson::extjson::de::Error| {
            RepositoryError::Validation(e.to_string())
        })?;
    Ok(doc! { "_id": &entity.id, "data": data })
}

fn from_document(document: Document) -> RepoResult<Entity> {
    let id = document
        .get_str("_id")
        .map_err(|e| RepositoryError::Backend(format!("missing _id: {e}")))?
        .to_string();
    let data = document
        .get("data")
        .cloned()
        .unwrap_or(Bson::Document(Document::new()));
    let data: serde_json::Value = data.into();
    Ok(Entity::new(id, data))
}

/// Maps driver errors into the adapter-boundary taxonomy.
fn translate(err: mongodb::error::Error) -> RepositoryError {
    use mongodb::error::ErrorKind;
    match err.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
            RepositoryError::Unavailable(err.to_string())
        }
        _ => RepositoryError::Backend(err.to_string()),
    }
}
