//! Addon resolution for FastApp.
//!
//! An addon is an optional, independently toggleable feature module
//! (commerce, lms, social, media, ...). This crate decides, from static
//! configuration, which addons are active and where their routes mount:
//!
//! - [`resolve`] — fixpoint closure of the enabled flags under the
//!   inter-addon dependency graph, with explicit cycle detection
//! - [`mount_path`] — URL prefix lookup with a `"/" + name` default
//! - [`AddonConfig`] — TOML configuration loader
//!
//! Resolution is pure computation over immutable inputs; it runs once at
//! startup and any error is fatal (a cyclic dependency graph never gets a
//! partial mount).

mod config;
mod error;
mod resolver;

pub use config::AddonConfig;
pub use error::{ConfigError, ConfigResult};
pub use resolver::{is_enabled, mount_path, resolve};
