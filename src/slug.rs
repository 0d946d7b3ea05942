//! Slug generation for tags and operations.
//!
//! Two independent namespaces (tags, operations) each map a label or
//! operation key to a unique, lowercase kebab-case slug.
//!
//! ## Collision Rule
//!
//! Declaration order wins. The first entity keeps the base slug; every later
//! entity normalizing to a taken slug receives the first free numeric suffix
//! (`-2`, `-3`, ...). Collisions are reported, never silently dropped.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::types::document::{Node, ResolvedDocument, Value};

/// Fallback slug for a tag with no derivable name.
pub const FALLBACK_TAG_SLUG: &str = "tag";

/// Fallback slug for an operation with no derivable name.
pub const FALLBACK_OPERATION_SLUG: &str = "operation";

/// HTTP methods recognised under an OpenAPI path item, in canonical order.
const HTTP_METHODS: [&str; 8] = ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// AsyncAPI 2.x channel actions.
const CHANNEL_ACTIONS: [&str; 2] = ["publish", "subscribe"];

fn hyphen_runs() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new("-+").ok()).as_ref()
}

fn collapse_hyphens(mapped: &str) -> String {
    match hyphen_runs() {
        Some(re) => re.replace_all(mapped, "-").into_owned(),
        None => mapped
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-"),
    }
}

/// Normalize a human label into a slug base.
///
/// `&` becomes the word `and`, every non-alphanumeric character becomes a
/// hyphen, hyphen runs collapse and edges are trimmed. May return an empty
/// string; callers apply a fallback.
pub fn slugify(label: &str) -> String {
    let spelled = label.replace('&', " and ").to_lowercase();
    let mapped: String = spelled
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    collapse_hyphens(&mapped).trim_matches('-').to_string()
}

/// Which slug namespace an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlugNamespace {
    /// Tag slugs.
    Tag,
    /// Operation slugs.
    Operation,
}

impl SlugNamespace {
    fn fallback(self) -> &'static str {
        match self {
            Self::Tag => FALLBACK_TAG_SLUG,
            Self::Operation => FALLBACK_OPERATION_SLUG,
        }
    }
}

impl std::fmt::Display for SlugNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag => write!(f, "tag"),
            Self::Operation => write!(f, "operation"),
        }
    }
}

/// How to react when two entities normalize to the same slug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Append a numeric suffix and continue (logged as a warning).
    #[default]
    Disambiguate,
    /// Fail on the first collision.
    Reject,
}

/// A recorded slug collision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugCollision {
    /// Namespace the collision happened in.
    pub namespace: SlugNamespace,
    /// Label or operation key of the later entity.
    pub key: String,
    /// Slug both entities normalized to.
    pub base: String,
    /// Slug assigned to the later entity (equals `base` under `Reject`).
    pub assigned: String,
}

/// Error type for slug generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    /// A collision under [`CollisionPolicy::Reject`].
    #[error("{} slug collision: {:?} normalizes to taken slug {:?}", .0.namespace, .0.key, .0.base)]
    Collision(SlugCollision),
}

/// One operation to slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationInput {
    /// Declared operation id (AsyncAPI 3 `operations.{id}`), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// HTTP method (OpenAPI) or action (AsyncAPI).
    pub method: String,
    /// Path template (OpenAPI) or channel address (AsyncAPI).
    pub path: String,
}

impl OperationInput {
    /// Create an operation input keyed by method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            method: method.into(),
            path: path.into(),
        }
    }

    /// Create an operation input keyed by its declared id.
    ///
    /// Several AsyncAPI 3 operations may share one action and channel, so
    /// method and path alone do not identify them.
    pub fn with_id(id: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(method, path)
        }
    }

    /// Key under which the operation's slug is stored: the declared id when
    /// present, otherwise `"get /pets"`.
    pub fn key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method.to_lowercase(), self.path),
        }
    }
}

/// Entities to slug, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugInputs {
    /// Tag labels.
    pub tags: Vec<String>,
    /// Operations.
    pub operations: Vec<OperationInput>,
}

impl SlugInputs {
    /// Extract tags and operations from a resolved OpenAPI or AsyncAPI document.
    ///
    /// Declared `tags[].name` come first; tags only used by operations follow
    /// in order of first use.
    pub fn from_document(doc: &ResolvedDocument) -> Self {
        let mut inputs = Self::default();
        let root = doc.root();

        if let Some(Node::Array(tags)) = node_of(doc, doc.get(root, "tags")) {
            for tag in tags {
                if let Some(name) = doc.get(tag, "name").and_then(Value::as_str) {
                    inputs.push_tag(name);
                }
            }
        }

        // OpenAPI: paths.{template}.{method}
        if let Some(Node::Object(paths)) = node_of(doc, doc.get(root, "paths")) {
            for (template, item) in paths {
                let Some(Node::Object(members)) = node_of(doc, Some(item)) else {
                    continue;
                };
                for (method, operation) in members {
                    if HTTP_METHODS.contains(&method.as_str()) {
                        inputs.push_operation(doc, OperationInput::new(method, template), operation);
                    }
                }
            }
        }

        if let Some(Node::Object(channels)) = node_of(doc, doc.get(root, "channels")) {
            // AsyncAPI 3 declares operations at the top level.
            if doc.get(root, "operations").is_none() {
                // AsyncAPI 2: channels.{address}.{publish|subscribe}
                for (address, channel) in channels {
                    let Some(Node::Object(members)) = node_of(doc, Some(channel)) else {
                        continue;
                    };
                    for (action, operation) in members {
                        if CHANNEL_ACTIONS.contains(&action.as_str()) {
                            inputs.push_operation(doc, OperationInput::new(action, address), operation);
                        }
                    }
                }
            }
        }

        // AsyncAPI 3: operations.{id} with `action` and a resolved `channel`.
        if let Some(Node::Object(operations)) = node_of(doc, doc.get(root, "operations")) {
            for (id, operation) in operations {
                let action = doc.get(operation, "action").and_then(Value::as_str).unwrap_or_default();
                let address = doc
                    .get(operation, "channel")
                    .and_then(|channel| doc.get(channel, "address"))
                    .and_then(Value::as_str)
                    .unwrap_or(id.as_str());
                inputs.push_operation(doc, OperationInput::with_id(id, action, address), operation);
            }
        }

        inputs
    }

    fn push_tag(&mut self, name: &str) {
        if !self.tags.iter().any(|t| t == name) {
            self.tags.push(name.to_string());
        }
    }

    fn push_operation(&mut self, doc: &ResolvedDocument, input: OperationInput, operation: &Value) {
        if let Some(Node::Array(tags)) = node_of(doc, doc.get(operation, "tags")) {
            for tag in tags {
                // AsyncAPI tags are objects with a name; OpenAPI tags are strings.
                let name = tag.as_str().or_else(|| doc.get(tag, "name").and_then(Value::as_str));
                if let Some(name) = name {
                    self.push_tag(name);
                }
            }
        }
        self.operations.push(input);
    }
}

fn node_of<'a>(doc: &'a ResolvedDocument, value: Option<&Value>) -> Option<&'a Node> {
    doc.node(value?.as_node()?)
}

/// Disambiguated slug maps for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugTable {
    /// Tag label → slug.
    pub tags: BTreeMap<String, String>,
    /// Operation key (`"get /pets"`, or the AsyncAPI 3 operation id) → slug.
    pub operations: BTreeMap<String, String>,
}

impl SlugTable {
    /// Slug for a tag label.
    pub fn tag(&self, label: &str) -> Option<&str> {
        self.tags.get(label).map(String::as_str)
    }

    /// Slug for an operation.
    pub fn operation(&self, method: &str, path: &str) -> Option<&str> {
        self.operations
            .get(&OperationInput::new(method, path).key())
            .map(String::as_str)
    }

    /// Slug for an operation declared with an id.
    pub fn operation_by_id(&self, id: &str) -> Option<&str> {
        self.operations.get(id).map(String::as_str)
    }
}

/// Output of [`SlugGenerator::generate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugOutput {
    /// The slug maps.
    pub table: SlugTable,
    /// Collisions that were disambiguated.
    pub collisions: Vec<SlugCollision>,
}

/// Slug generator with a configurable collision policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlugGenerator {
    policy: CollisionPolicy,
}

impl SlugGenerator {
    /// Create a generator.
    pub fn new(policy: CollisionPolicy) -> Self {
        Self { policy }
    }

    /// Generate both namespaces.
    pub fn generate(&self, inputs: &SlugInputs) -> Result<SlugOutput, SlugError> {
        let mut output = SlugOutput::default();

        let mut tags = Namespace::new(SlugNamespace::Tag, self.policy);
        for label in &inputs.tags {
            if output.table.tags.contains_key(label) {
                continue;
            }
            let slug = tags.assign(label, label, &mut output.collisions)?;
            output.table.tags.insert(label.clone(), slug);
        }

        let mut operations = Namespace::new(SlugNamespace::Operation, self.policy);
        for op in &inputs.operations {
            let key = op.key();
            if output.table.operations.contains_key(&key) {
                continue;
            }
            let label = format!("{} {}", op.method, op.path);
            let slug = operations.assign(&key, &label, &mut output.collisions)?;
            output.table.operations.insert(key, slug);
        }

        Ok(output)
    }
}

struct Namespace {
    kind: SlugNamespace,
    policy: CollisionPolicy,
    taken: BTreeSet<String>,
}

impl Namespace {
    fn new(kind: SlugNamespace, policy: CollisionPolicy) -> Self {
        Self {
            kind,
            policy,
            taken: BTreeSet::new(),
        }
    }

    fn assign(&mut self, key: &str, label: &str, collisions: &mut Vec<SlugCollision>) -> Result<String, SlugError> {
        let mut base = slugify(label);
        if base.is_empty() {
            base = self.kind.fallback().to_string();
        }

        if self.taken.insert(base.clone()) {
            return Ok(base);
        }

        if self.policy == CollisionPolicy::Reject {
            return Err(SlugError::Collision(SlugCollision {
                namespace: self.kind,
                key: key.to_string(),
                assigned: base.clone(),
                base,
            }));
        }

        let assigned = (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or_default();
        self.taken.insert(assigned.clone());

        tracing::warn!(
            namespace = %self.kind,
            key,
            base = %base,
            assigned = %assigned,
            "slug collision disambiguated"
        );
        collisions.push(SlugCollision {
            namespace: self.kind,
            key: key.to_string(),
            base,
            assigned: assigned.clone(),
        });
        Ok(assigned)
    }
}
