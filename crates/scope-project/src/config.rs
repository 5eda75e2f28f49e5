use std::fs;
use std::io;

use serde::{Deserialize, Serialize};

use scope_store::{ProjectLayout, StoreBackend};

use crate::error::{ProjectError, ProjectResult};

/// Default directory for generated test modules.
pub const DEFAULT_TESTS_DIRECTORY: &str = "tests";

/// Per-project settings.
///
/// Read from `<root>/.pythoscope/config.toml` when present:
///
/// ```toml
/// new_tests_directory = "tests"
/// store_backend = "durable"   # or "volatile"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Directory (relative to the root) that receives generated test modules.
    pub new_tests_directory: String,
    /// Where code trees are cached.
    pub store_backend: StoreBackend,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            new_tests_directory: DEFAULT_TESTS_DIRECTORY.to_string(),
            store_backend: StoreBackend::Durable,
        }
    }
}

impl ProjectConfig {
    /// Settings for throwaway projects: code trees stay in memory.
    pub fn volatile() -> Self {
        Self {
            store_backend: StoreBackend::Volatile,
            ..Default::default()
        }
    }

    pub fn with_new_tests_directory(mut self, dir: impl Into<String>) -> Self {
        self.new_tests_directory = dir.into();
        self
    }

    pub fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store_backend = backend;
        self
    }

    /// Parse settings from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> ProjectResult<Self> {
        toml::from_str(text).map_err(|e| ProjectError::Config(e.to_string()))
    }

    /// Render settings as TOML text.
    pub fn to_toml_string(&self) -> ProjectResult<String> {
        toml::to_string(self).map_err(|e| ProjectError::Config(e.to_string()))
    }

    /// Load settings for a project, falling back to defaults when the config
    /// file does not exist.
    pub fn load(layout: &ProjectLayout) -> ProjectResult<Self> {
        match fs::read_to_string(layout.config_file()) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ProjectError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProjectConfig::default();
        assert_eq!(config.new_tests_directory, "tests");
        assert_eq!(config.store_backend, StoreBackend::Durable);
        assert_eq!(ProjectConfig::volatile().store_backend, StoreBackend::Volatile);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ProjectConfig::from_toml_str("new_tests_directory = \"generated\"").unwrap();
        assert_eq!(config.new_tests_directory, "generated");
        assert_eq!(config.store_backend, StoreBackend::Durable);
    }

    #[test]
    fn toml_roundtrip() {
        let config = ProjectConfig::default()
            .with_new_tests_directory("generated")
            .with_store_backend(StoreBackend::Volatile);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("store_backend = \"volatile\""));
        assert_eq!(ProjectConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ProjectConfig::from_toml_str("store_backend = 3").unwrap_err();
        assert!(matches!(err, ProjectError::Config(_)));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        assert_eq!(ProjectConfig::load(&layout).unwrap(), ProjectConfig::default());
    }

    #[test]
    fn load_reads_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::new(tmp.path());
        layout.init().unwrap();
        fs::write(layout.config_file(), "store_backend = \"volatile\"\n").unwrap();
        let config = ProjectConfig::load(&layout).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Volatile);
    }
}
