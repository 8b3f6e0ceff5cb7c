//! Core model types for the FastApp storage layer.
//!
//! This crate defines the backend-agnostic types shared by every repository
//! adapter:
//! - `Entity`, the opaque id-keyed record all adapters persist
//! - identifier validation for dynamic table/collection/channel names
//!
//! Domain-specific record shapes (products, courses, posts, ...) belong to
//! the addons that own them, not here.

mod entity;
mod ident;

pub use entity::Entity;
pub use ident::{validate_identifier, MAX_IDENTIFIER_LEN};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in model operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid identifier {0:?}: {1}")]
    InvalidIdentifier(String, &'static str),

    #[error("entity data must be a JSON object")]
    NonObjectData,
}
