//! Loader collaborator interface.
//!
//! Fetching, parsing and bundling raw documents (including cross-file
//! references) happens outside this crate. A [`DocumentLoader`] hands back
//! one bundled JSON tree plus every file it touched while bundling, which
//! the manager records as dependency edges.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where a version entry's document comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// A local file.
    File {
        /// Path to the document.
        path: PathBuf,
    },
    /// A remote document.
    Url {
        /// Absolute URL.
        url: String,
    },
    /// A document given literally in configuration.
    Inline {
        /// Name used for module naming and diagnostics.
        name: String,
        /// The raw document.
        content: serde_json::Value,
    },
}

impl InputSource {
    /// A file input.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }

    /// A URL input.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// An inline input.
    pub fn inline(name: impl Into<String>, content: serde_json::Value) -> Self {
        Self::Inline {
            name: name.into(),
            content,
        }
    }

    /// Stable identifier: the path, the URL, or `inline:<name>`.
    ///
    /// This is the "source file" key used for registration, lookups and
    /// dependency tracking.
    pub fn key(&self) -> String {
        match self {
            Self::File { path } => path.to_string_lossy().into_owned(),
            Self::Url { url } => url.clone(),
            Self::Inline { name, .. } => format!("inline:{name}"),
        }
    }

    /// Base name without extension, used to name generated modules.
    pub fn stem(&self) -> String {
        match self {
            Self::File { path } => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Url { url } => {
                let without_query = url.split(['?', '#']).next().unwrap_or_default();
                let last = without_query.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
                Path::new(last)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }
            Self::Inline { name, .. } => name.clone(),
        }
    }

    /// File name with extension (files and URLs only).
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::File { path } => path.file_name().map(|s| s.to_string_lossy().into_owned()),
            Self::Url { url } => {
                let without_query = url.split(['?', '#']).next().unwrap_or_default();
                without_query
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            }
            Self::Inline { .. } => None,
        }
    }
}

/// A bundled document and the files touched while bundling it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// The bundled raw document (only same-document `$ref`s remain).
    pub document: serde_json::Value,
    /// Every file read, root input included.
    pub files: Vec<String>,
}

/// Error type for loading. Scoped to one version entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The input does not exist.
    #[error("input not found: {source_id}")]
    NotFound {
        /// Input key.
        source_id: String,
    },
    /// Reading the input failed.
    #[error("failed to read {source_id}: {message}")]
    Io {
        /// Input key.
        source_id: String,
        /// Underlying error text.
        message: String,
    },
    /// The input is not a valid document.
    #[error("failed to parse {source_id}: {message}")]
    Parse {
        /// Input key.
        source_id: String,
        /// Underlying error text.
        message: String,
    },
    /// A field every API document must carry is absent.
    #[error("{source_id} is missing required field `{field}`")]
    MissingField {
        /// Input key.
        source_id: String,
        /// The missing field.
        field: String,
    },
    /// This loader cannot handle the input kind.
    #[error("cannot load {source_id}: {reason}")]
    Unsupported {
        /// Input key.
        source_id: String,
        /// Why.
        reason: String,
    },
}

/// Top-level fields identifying the document flavour; one must be present.
pub const VERSION_FIELDS: [&str; 3] = ["openapi", "swagger", "asyncapi"];

/// Minimal presence checks applied to every loaded document.
///
/// Requires an object root, a string version field (`openapi`, `swagger`
/// or `asyncapi`) and an `info` object. No further schema validation.
pub fn validate_document(source_id: &str, document: &serde_json::Value) -> Result<(), LoadError> {
    let root = document.as_object().ok_or_else(|| LoadError::Parse {
        source_id: source_id.to_string(),
        message: "document root must be an object".to_string(),
    })?;

    if !VERSION_FIELDS.iter().any(|f| root.get(*f).map_or(false, |v| v.is_string())) {
        return Err(LoadError::MissingField {
            source_id: source_id.to_string(),
            field: VERSION_FIELDS.join("|"),
        });
    }

    if !root.get("info").map_or(false, |v| v.is_object()) {
        return Err(LoadError::MissingField {
            source_id: source_id.to_string(),
            field: "info".to_string(),
        });
    }

    Ok(())
}

/// Trait for loader collaborators.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load and bundle one input.
    async fn load(&self, input: &InputSource) -> Result<LoadedDocument, LoadError>;
}

/// Loads local JSON files and inline documents.
///
/// Does not follow cross-file references; URL inputs are unsupported.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base_dir: Option<PathBuf>,
}

impl FileLoader {
    /// Create a loader resolving relative paths against the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, input: &InputSource) -> Result<LoadedDocument, LoadError> {
        let source_id = input.key();
        match input {
            InputSource::File { path } => {
                let full = self.full_path(path);
                let text = tokio::fs::read_to_string(&full).await.map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        LoadError::NotFound {
                            source_id: source_id.clone(),
                        }
                    } else {
                        LoadError::Io {
                            source_id: source_id.clone(),
                            message: e.to_string(),
                        }
                    }
                })?;
                let document: serde_json::Value = serde_json::from_str(&text).map_err(|e| LoadError::Parse {
                    source_id: source_id.clone(),
                    message: e.to_string(),
                })?;
                validate_document(&source_id, &document)?;
                Ok(LoadedDocument {
                    document,
                    files: vec![source_id],
                })
            }
            InputSource::Inline { content, .. } => {
                validate_document(&source_id, content)?;
                Ok(LoadedDocument {
                    document: content.clone(),
                    files: Vec::new(),
                })
            }
            InputSource::Url { .. } => Err(LoadError::Unsupported {
                source_id,
                reason: "remote inputs need a fetching loader".to_string(),
            }),
        }
    }
}

/// In-memory loader for tests and embedding.
///
/// Documents are keyed by [`InputSource::key`] and can be replaced between
/// calls to simulate edits.
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    documents: RwLock<BTreeMap<String, LoadedDocument>>,
}

impl InMemoryLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a document whose only touched file is `key`.
    pub fn insert(&self, key: impl Into<String>, document: serde_json::Value) {
        let key = key.into();
        self.insert_bundle(key.clone(), document, vec![key]);
    }

    /// Register (or replace) a document with an explicit touched-file list.
    pub fn insert_bundle(&self, key: impl Into<String>, document: serde_json::Value, files: Vec<String>) {
        self.documents
            .write()
            .insert(key.into(), LoadedDocument { document, files });
    }

    /// Remove a document; later loads fail with `NotFound`.
    pub fn remove(&self, key: &str) {
        self.documents.write().remove(key);
    }
}

#[async_trait]
impl DocumentLoader for InMemoryLoader {
    async fn load(&self, input: &InputSource) -> Result<LoadedDocument, LoadError> {
        let source_id = input.key();
        if let InputSource::Inline { content, .. } = input {
            validate_document(&source_id, content)?;
            return Ok(LoadedDocument {
                document: content.clone(),
                files: Vec::new(),
            });
        }

        let loaded = self
            .documents
            .read()
            .get(&source_id)
            .cloned()
            .ok_or(LoadError::NotFound { source_id: source_id.clone() })?;
        validate_document(&source_id, &loaded.document)?;
        Ok(loaded)
    }
}
