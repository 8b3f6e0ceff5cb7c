//! Storage-agnostic repository layer for FastApp.
//!
//! Defines a uniform CRUD/batch/streaming contract ([`Repository`]) so
//! calling code can target any supported backend without modification, and
//! ships one adapter per backend:
//!
//! - [`postgres::PgRepository`] — relational, over a `sqlx` pool
//! - [`mongo::MongoRepository`] — document store, with explicit
//!   transaction handles
//! - [`analytics::AnalyticsRepository`] — DuckDB, read-mostly, with an
//!   ad-hoc SQL escape hatch
//! - [`kv::RedisRepository`] — key-value cache backend
//! - [`memory::MemoryRepository`] — in-process map, the mock adapter for
//!   tests
//!
//! Adapters borrow externally owned connection handles (pool, client,
//! shared connection); they create no schema beyond bootstrapping their own
//! table, and they never retry — retry-vs-give-up is the caller's policy.
//! Backend-native errors are translated to [`RepositoryError`] at the
//! adapter boundary so callers never depend on a driver's error type.

mod error;
mod repository;

pub mod analytics;
pub mod kv;
pub mod memory;
pub mod mongo;
pub mod postgres;

pub use error::{RepoResult, RepositoryError};
pub use fastapp_model::Entity;
pub use repository::{EntityStream, FieldPatch, Repository, DEFAULT_BATCH_SIZE};
