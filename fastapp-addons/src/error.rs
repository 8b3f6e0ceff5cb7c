//! Error types for addon configuration.

use thiserror::Error;

/// Result type for addon configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while resolving addon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The dependency graph contains a cycle. Startup must stop here;
    /// mounting a subset of a cycle would be a confusing partial state.
    #[error("cyclic addon dependency involving '{0}'")]
    CyclicDependency(String),

    /// An addon name was empty where one is required.
    #[error("addon name must not be empty")]
    EmptyAddonName,

    /// The resolver failed to reach a fixpoint within the pass bound.
    #[error("dependency resolution did not stabilize after {0} passes")]
    Unstable(usize),

    /// Failed to read the configuration file.
    #[error("failed to read addon config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse addon config: {0}")]
    Parse(#[from] toml::de::Error),
}
