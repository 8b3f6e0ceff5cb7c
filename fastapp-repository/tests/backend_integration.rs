//! Integration tests against real backend servers.
//!
//! All tests here are `#[ignore]`d and opt in through environment
//! variables, so `cargo test` stays green on a machine without servers:
//!
//! ```text
//! FASTAPP_PG_URL=postgres://localhost/fastapp \
//!   cargo test -p fastapp-repository -- --ignored postgres
//! FASTAPP_MONGO_URL=mongodb://localhost:27017 \
//!   cargo test -p fastapp-repository -- --ignored mongo
//! FASTAPP_REDIS_URL=redis://localhost:6379 \
//!   cargo test -p fastapp-repository -- --ignored redis
//! ```
//!
//! Mongo transaction tests additionally need a replica set.

use fastapp_repository::kv::RedisRepository;
use fastapp_repository::mongo::MongoRepository;
use fastapp_repository::postgres::PgRepository;
use fastapp_repository::{Entity, FieldPatch, Repository};
use futures::StreamExt;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn env_url(var: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| panic!("{var} must be set for this test"))
}

/// Namespace per run so concurrent or aborted runs never collide.
fn scratch_name(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7().simple())
}

async fn round_trip(repo: &dyn Repository) {
    let saved = repo
        .save(Entity::unsaved(json!({"source": "integration", "n": 1})))
        .await
        .unwrap();
    let fetched = repo.get(&saved.id).await.unwrap().unwrap();
    assert_eq!(fetched.get_str("/source"), Some("integration"));

    let mut updates: HashMap<String, FieldPatch> = HashMap::new();
    updates.insert(
        saved.id.clone(),
        json!({"n": 2}).as_object().unwrap().clone(),
    );
    assert_eq!(repo.update_bulk(&updates).await.unwrap(), 1);
    let patched = repo.get(&saved.id).await.unwrap().unwrap();
    assert_eq!(patched.get_number("/n"), Some(2.0));

    // Patch keys with '.' or '$' land verbatim at the top level.
    let mut dotted: HashMap<String, FieldPatch> = HashMap::new();
    dotted.insert(
        saved.id.clone(),
        json!({"a.b": 1, "$ref": "x"}).as_object().unwrap().clone(),
    );
    assert_eq!(repo.update_bulk(&dotted).await.unwrap(), 1);
    let merged = repo.get(&saved.id).await.unwrap().unwrap();
    assert_eq!(merged.data["a.b"], json!(1));
    assert_eq!(merged.data["$ref"], json!("x"));
    assert!(merged.data.get("a").is_none());

    // Rows holding non-object data reject partial updates.
    let scalar = repo.save(Entity::unsaved(json!("bare"))).await.unwrap();
    let mut bad: HashMap<String, FieldPatch> = HashMap::new();
    bad.insert(
        scalar.id.clone(),
        json!({"a": 1}).as_object().unwrap().clone(),
    );
    assert!(repo.update_bulk(&bad).await.is_err());
    assert!(repo.delete(&scalar.id).await.unwrap());

    let streamed: Vec<_> = repo.stream_all().await.unwrap().collect().await;
    assert!(streamed.iter().any(|r| {
        r.as_ref().map(|e| e.id == saved.id).unwrap_or(false)
    }));

    assert!(repo.delete(&saved.id).await.unwrap());
    assert!(repo.get(&saved.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a Postgres server (FASTAPP_PG_URL)"]
async fn postgres_round_trip() {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&env_url("FASTAPP_PG_URL"))
        .await
        .unwrap();
    let repo = PgRepository::new(pool, &scratch_name("it_pg")).unwrap();
    repo.ensure_table().await.unwrap();
    round_trip(&repo).await;
}

#[tokio::test]
#[ignore = "requires a MongoDB server (FASTAPP_MONGO_URL)"]
async fn mongo_round_trip() {
    let client = mongodb::Client::with_uri_str(&env_url("FASTAPP_MONGO_URL"))
        .await
        .unwrap();
    let repo = MongoRepository::new(client, "fastapp_it", &scratch_name("it_mongo")).unwrap();
    round_trip(&repo).await;
}

#[tokio::test]
#[ignore = "requires a MongoDB replica set (FASTAPP_MONGO_URL)"]
async fn mongo_transaction_commit_and_rollback() {
    let client = mongodb::Client::with_uri_str(&env_url("FASTAPP_MONGO_URL"))
        .await
        .unwrap();
    let repo = MongoRepository::new(client, "fastapp_it", &scratch_name("it_txn")).unwrap();

    repo.prepare_transaction("t1").await.unwrap();
    let committed = repo
        .save_in_transaction("t1", Entity::unsaved(json!({"keep": true})))
        .await
        .unwrap();
    repo.commit_transaction("t1").await.unwrap();
    assert!(repo.get(&committed.id).await.unwrap().is_some());

    repo.prepare_transaction("t2").await.unwrap();
    let discarded = repo
        .save_in_transaction("t2", Entity::unsaved(json!({"keep": false})))
        .await
        .unwrap();
    repo.rollback_transaction("t2").await.unwrap();
    assert!(repo.get(&discarded.id).await.unwrap().is_none());

    // Handles are consumed on commit/rollback.
    assert!(repo.commit_transaction("t1").await.is_err());
}

#[tokio::test]
#[ignore = "requires a Redis server (FASTAPP_REDIS_URL)"]
async fn redis_round_trip() {
    let client = redis::Client::open(env_url("FASTAPP_REDIS_URL")).unwrap();
    let conn = redis::aio::ConnectionManager::new(client).await.unwrap();
    let repo = RedisRepository::new(conn, &scratch_name("it_kv")).unwrap();
    round_trip(&repo).await;
}

#[tokio::test]
#[ignore = "requires a Redis server (FASTAPP_REDIS_URL)"]
async fn redis_scan_stream_with_small_batches() {
    let client = redis::Client::open(env_url("FASTAPP_REDIS_URL")).unwrap();
    let conn = redis::aio::ConnectionManager::new(client).await.unwrap();
    let repo = RedisRepository::new(conn, &scratch_name("it_scan"))
        .unwrap()
        .with_batch_size(2);

    let entities: Vec<Entity> = (0..9)
        .map(|i| Entity::new(format!("k{i}"), json!({"i": i})))
        .collect();
    repo.save_bulk(entities).await.unwrap();

    let streamed: Vec<_> = repo.stream_all().await.unwrap().collect().await;
    assert_eq!(streamed.len(), 9);

    let ids: Vec<String> = (0..9).map(|i| format!("k{i}")).collect();
    assert_eq!(repo.delete_bulk(&ids).await.unwrap(), 9);
}
