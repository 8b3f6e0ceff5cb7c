//! Addon configuration file — reads `addons.toml` with the enabled flags,
//! inter-addon dependencies, and mount-prefix overrides.
//!
//! Unlike most runtime settings, addon configuration errors are fatal: an
//! unparseable file or a cyclic dependency graph stops initialization
//! rather than producing a partial mount.

use crate::error::ConfigResult;
use crate::resolver;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Static addon configuration parsed from `addons.toml`.
///
/// ```toml
/// [addons]
/// commerce = true
/// lms = true
/// social = false
///
/// [dependencies]
/// commerce = ["auth", "payments"]
/// lms = ["auth"]
///
/// [mounts]
/// commerce = "/shop"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddonConfig {
    /// Explicitly configured addons and their on/off flags.
    #[serde(default)]
    pub addons: BTreeMap<String, bool>,
    /// Prerequisites per addon; names need not appear under `[addons]`.
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
    /// URL mount-prefix overrides; absent addons mount at `"/" + name`.
    #[serde(default)]
    pub mounts: BTreeMap<String, String>,
}

impl AddonConfig {
    /// Loads configuration from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)?;
        info!(
            path = %path.as_ref().display(),
            addons = config.addons.len(),
            "loaded addon config"
        );
        Ok(config)
    }

    /// Parses configuration from an in-memory TOML string.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolves the active addon set for this configuration.
    pub fn resolve(&self) -> ConfigResult<BTreeSet<String>> {
        let resolved = resolver::resolve(&self.addons, &self.dependencies)?;
        info!(active = resolved.len(), "addon set resolved");
        Ok(resolved)
    }

    /// Mount prefix for an addon under this configuration.
    pub fn mount_path(&self, name: &str) -> ConfigResult<String> {
        resolver::mount_path(name, &self.mounts)
    }
}
