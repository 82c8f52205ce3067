//! Render configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PlaceError, PlaceResult};

/// What to do with a `{token}` that matches nothing in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedTokenPolicy {
    /// Fail the render with `UnresolvedToken`.
    #[default]
    Error,
    /// Keep the token text verbatim and log a warning.
    Literal,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Policy for tokens that resolve to nothing
    pub unresolved_tokens: UnresolvedTokenPolicy,

    /// Dialect used instead of the provider's own (optional)
    pub dialect: Option<String>,

    /// Default execution timeout of new statements, in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unresolved_tokens: UnresolvedTokenPolicy::Error,
            dialect: None,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> PlaceResult<Self> {
        toml::from_str(text).map_err(|e| PlaceError::Config(e.to_string()))
    }

    /// Load configuration from `path`, else `./sqlplace.toml`, else the user
    /// config directory. Falls back to defaults when none exists.
    pub fn load(path: Option<&Path>) -> PlaceResult<Self> {
        if let Some(path) = path {
            return Self::read(path);
        }
        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::read(&candidate);
            }
        }
        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn read(path: &Path) -> PlaceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("sqlplace.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlplace").join("config.toml"));
        }
        paths
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the unresolved token policy
    pub fn unresolved_tokens(mut self, policy: UnresolvedTokenPolicy) -> Self {
        self.config.unresolved_tokens = policy;
        self
    }

    /// Override the dialect
    pub fn dialect(mut self, dialect: impl Into<String>) -> Self {
        self.config.dialect = Some(dialect.into());
        self
    }

    /// Set the default timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.unresolved_tokens, UnresolvedTokenPolicy::Error);
        assert_eq!(config.dialect, None);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml("unresolved_tokens = \"literal\"\n").unwrap();
        assert_eq!(config.unresolved_tokens, UnresolvedTokenPolicy::Literal);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_from_toml_full() {
        let config = Config::from_toml(
            "unresolved_tokens = \"error\"\ndialect = \"MSSQL\"\ntimeout_secs = 5\n",
        )
        .unwrap();
        assert_eq!(config.dialect.as_deref(), Some("MSSQL"));
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_from_toml_rejects_unknown_policy() {
        let err = Config::from_toml("unresolved_tokens = \"ignore\"").unwrap_err();
        assert!(matches!(err, PlaceError::Config(_)));
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .unresolved_tokens(UnresolvedTokenPolicy::Literal)
            .dialect("postgres")
            .timeout_secs(1)
            .build();
        assert_eq!(config.unresolved_tokens, UnresolvedTokenPolicy::Literal);
        assert_eq!(config.dialect.as_deref(), Some("postgres"));
        assert_eq!(config.timeout_secs, 1);
    }

    #[test]
    fn test_load_missing_explicit_path_is_io_error() {
        let err = Config::load(Some(Path::new("/nonexistent/sqlplace.toml"))).unwrap_err();
        assert!(matches!(err, PlaceError::Io(_)));
    }
}
