//! Manager configuration: surfaces and their version entries.
//!
//! ```json
//! {
//!   "collision_policy": "disambiguate",
//!   "surfaces": [{
//!     "id": "api/petstore",
//!     "label": "Petstore",
//!     "versions": [
//!       { "input": { "kind": "file", "path": "schemas/petstore-v2.json" }, "version": "v2" },
//!       { "input": { "kind": "file", "path": "schemas/petstore-v1.json" }, "version": "v1" }
//!     ]
//!   }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::loader::InputSource;
use crate::slug::{slugify, CollisionPolicy};

/// Error type for reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The config is not valid JSON for [`ManagerConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Logical API surfaces, in navigation order.
    pub surfaces: Vec<SurfaceConfig>,
    /// Slug collision handling.
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

impl ManagerConfig {
    /// Parse configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Add a surface.
    pub fn surface(mut self, surface: SurfaceConfig) -> Self {
        self.surfaces.push(surface);
        self
    }
}

/// One navigable API surface with ordered versions (latest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Base navigation path, also the surface identifier (`api/petstore`).
    pub id: String,
    /// Display label; defaults to the document's `info.title`.
    #[serde(default)]
    pub label: Option<String>,
    /// Version entries; the first one is the latest.
    #[serde(default)]
    pub versions: Vec<VersionConfig>,
}

impl SurfaceConfig {
    /// Create a surface with no versions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            versions: Vec::new(),
        }
    }

    /// Set the display label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a version entry.
    pub fn version(mut self, version: VersionConfig) -> Self {
        self.versions.push(version);
        self
    }
}

/// One concrete source document bound to a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionConfig {
    /// Where the document comes from.
    pub input: InputSource,
    /// Version label; defaults to the document's `info.version`.
    #[serde(default)]
    pub version: Option<String>,
    /// Navigation path override.
    #[serde(default)]
    pub path: Option<String>,
}

impl VersionConfig {
    /// Create an entry with default label and path.
    pub fn new(input: InputSource) -> Self {
        Self {
            input,
            version: None,
            path: None,
        }
    }

    /// Set the version label.
    pub fn labeled(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Override the navigation path.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Navigation path for the entry at `index` of `surface_id`.
    ///
    /// Explicit path, else the surface id for the latest (first) entry, else
    /// `{surface}/{slug(version label or input stem)}`.
    pub fn navigation_path(&self, surface_id: &str, index: usize) -> String {
        let base = trim_slashes(surface_id);
        if let Some(path) = &self.path {
            return trim_slashes(path).to_string();
        }
        if index == 0 {
            return base.to_string();
        }
        let leaf = self
            .version
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&self.input.stem()));
        format!("{base}/{leaf}")
    }
}

fn trim_slashes(path: &str) -> &str {
    path.trim_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_config() {
        let config = ManagerConfig::from_json_str(
            &json!({
                "surfaces": [{
                    "id": "/api/petstore/",
                    "versions": [
                        {"input": {"kind": "file", "path": "v2.json"}, "version": "v2"},
                        {"input": {"kind": "url", "url": "https://example.com/v1.json"}, "version": "V 1"}
                    ]
                }]
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(config.collision_policy, CollisionPolicy::Disambiguate);
        let surface = &config.surfaces[0];
        assert_eq!(surface.versions[0].navigation_path(&surface.id, 0), "api/petstore");
        assert_eq!(surface.versions[1].navigation_path(&surface.id, 1), "api/petstore/v-1");
    }

    #[test]
    fn test_navigation_path_fallbacks() {
        let explicit = VersionConfig::new(InputSource::file("a.json")).at_path("/docs/custom/");
        assert_eq!(explicit.navigation_path("api", 3), "docs/custom");

        let unlabeled = VersionConfig::new(InputSource::file("schemas/Legacy API.json"));
        assert_eq!(unlabeled.navigation_path("api", 1), "api/legacy-api");
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            ManagerConfig::from_json_str("{\"surfaces\": 3}"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ManagerConfig::from_json_file("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
