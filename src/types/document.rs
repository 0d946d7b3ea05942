//! Arena model of a resolved document.
//!
//! Containers (objects and arrays) live in a node arena and are addressed by
//! [`NodeId`]. A pointer that was dereferenced becomes a [`Value::Node`]
//! holding the id of the shared target, so "reference-equal" means "same
//! `NodeId`". Scalars are stored inline and carry no identity.
//!
//! Provenance (the canonical pointer path a node was first addressed by) is a
//! side table keyed by `NodeId`. It never takes part in equality.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::pointer::{Pointer, PointerError};

/// Index of a container node inside a [`ResolvedDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Wrap a raw arena index.
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A value slot inside a container.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number, kept verbatim.
    Number(serde_json::Number),
    /// JSON string.
    String(String),
    /// Reference to a container node in the arena.
    Node(NodeId),
}

impl Value {
    /// Convert a scalar JSON value. Returns `None` for objects and arrays.
    pub fn from_scalar(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => Some(Self::Number(n.clone())),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// The node id, if this value is a container reference.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// The string payload, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Kind of a container node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Mapping node.
    Object,
    /// Sequence node.
    Array,
}

/// A container node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Mapping with members in document order.
    Object(Vec<(String, Value)>),
    /// Sequence.
    Array(Vec<Value>),
}

impl Node {
    /// An empty container of the given kind.
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Object => Self::Object(Vec::new()),
            NodeKind::Array => Self::Array(Vec::new()),
        }
    }

    /// The container kind.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Object(_) => NodeKind::Object,
            Self::Array(_) => NodeKind::Array,
        }
    }

    /// Look up a member (objects) or an index (arrays, decimal string).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(members) => members.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        }
    }

    /// All child values in order.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Self::Object(members) => Box::new(members.iter().map(|(_, v)| v)),
            Self::Array(items) => Box::new(items.iter()),
        }
    }

    /// Ids of child containers in order (duplicates preserved).
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.values().filter_map(Value::as_node)
    }

    /// Number of members or items.
    pub fn len(&self) -> usize {
        match self {
            Self::Object(members) => members.len(),
            Self::Array(items) => items.len(),
        }
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error raised when a resolved document cannot be expanded to plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The document contains a cycle through the given node.
    #[error("cannot expand cyclic document: {0} is reachable from itself")]
    Cyclic(NodeId),
    /// A value references a node outside the arena.
    #[error("dangling node reference: {0}")]
    Dangling(NodeId),
}

/// A fully resolved document: node arena, root value and provenance table.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    nodes: Vec<Node>,
    root: Value,
    provenance: BTreeMap<NodeId, String>,
}

impl ResolvedDocument {
    /// Assemble a document from its parts.
    pub fn from_parts(nodes: Vec<Node>, root: Value, provenance: BTreeMap<NodeId, String>) -> Self {
        Self { nodes, root, provenance }
    }

    /// The root value (normally a node).
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Fetch a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of container nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty (scalar root).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Member or index of a container value.
    pub fn get<'a>(&'a self, value: &Value, key: &str) -> Option<&'a Value> {
        self.node(value.as_node()?)?.get(key)
    }

    /// Follow a parsed pointer from the root.
    pub fn lookup(&self, pointer: &Pointer) -> Option<&Value> {
        let mut current = &self.root;
        for segment in pointer.segments() {
            current = self.get(current, segment)?;
        }
        Some(current)
    }

    /// Parse `raw` and follow it from the root.
    pub fn pointer(&self, raw: &str) -> Result<Option<&Value>, PointerError> {
        let pointer = Pointer::parse(raw)?;
        Ok(self.lookup(&pointer))
    }

    /// The node id at `raw`, if it addresses a container.
    pub fn node_at(&self, raw: &str) -> Option<NodeId> {
        self.pointer(raw).ok().flatten().and_then(Value::as_node)
    }

    /// Provenance path recorded for a node.
    pub fn provenance(&self, id: NodeId) -> Option<&str> {
        self.provenance.get(&id).map(String::as_str)
    }

    /// The whole provenance side table.
    pub fn provenance_table(&self) -> &BTreeMap<NodeId, String> {
        &self.provenance
    }

    /// Expand into plain JSON. Shared nodes are duplicated; cycles are an error.
    pub fn to_json(&self) -> Result<serde_json::Value, DocumentError> {
        let mut on_path = vec![false; self.nodes.len()];
        self.expand(&self.root, &mut on_path)
    }

    fn expand(&self, value: &Value, on_path: &mut [bool]) -> Result<serde_json::Value, DocumentError> {
        let id = match value {
            Value::Null => return Ok(serde_json::Value::Null),
            Value::Bool(b) => return Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => return Ok(serde_json::Value::Number(n.clone())),
            Value::String(s) => return Ok(serde_json::Value::String(s.clone())),
            Value::Node(id) => *id,
        };
        let node = self.node(id).ok_or(DocumentError::Dangling(id))?;
        if on_path[id.index()] {
            return Err(DocumentError::Cyclic(id));
        }
        on_path[id.index()] = true;
        let out = match node {
            Node::Object(members) => {
                let mut map = serde_json::Map::new();
                for (key, child) in members {
                    map.insert(key.clone(), self.expand(child, on_path)?);
                }
                serde_json::Value::Object(map)
            }
            Node::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|child| self.expand(child, on_path))
                    .collect::<Result<_, _>>()?,
            ),
        };
        on_path[id.index()] = false;
        Ok(out)
    }

    /// Cycle-aware structural comparison of `a` (in `self`) with `b` (in `other`).
    ///
    /// Compares visible structure only: provenance and arena numbering are
    /// ignored. Pairs already under comparison are assumed equal, which makes
    /// the check terminate on cyclic graphs.
    pub fn structurally_eq(&self, a: &Value, other: &ResolvedDocument, b: &Value) -> bool {
        let mut assumed = HashSet::new();
        self.eq_values(a, other, b, &mut assumed)
    }

    fn eq_values(
        &self,
        a: &Value,
        other: &ResolvedDocument,
        b: &Value,
        assumed: &mut HashSet<(NodeId, NodeId)>,
    ) -> bool {
        match (a, b) {
            (Value::Node(x), Value::Node(y)) => {
                if !assumed.insert((*x, *y)) {
                    return true;
                }
                match (self.node(*x), other.node(*y)) {
                    (Some(Node::Object(left)), Some(Node::Object(right))) => {
                        left.len() == right.len()
                            && left.iter().zip(right).all(|((lk, lv), (rk, rv))| {
                                lk == rk && self.eq_values(lv, other, rv, assumed)
                            })
                    }
                    (Some(Node::Array(left)), Some(Node::Array(right))) => {
                        left.len() == right.len()
                            && left
                                .iter()
                                .zip(right)
                                .all(|(lv, rv)| self.eq_values(lv, other, rv, assumed))
                    }
                    _ => false,
                }
            }
            (Value::Node(_), _) | (_, Value::Node(_)) => false,
            _ => a == b,
        }
    }
}

impl PartialEq for ResolvedDocument {
    fn eq(&self, other: &Self) -> bool {
        self.structurally_eq(&self.root, other, &other.root)
    }
}
