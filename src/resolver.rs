//! Reference graph resolver.
//!
//! Dereferences every same-document `$ref` in a bundled document while
//! preserving identity: all pointers to one location resolve to one
//! [`NodeId`], and that node is also the one found at the location itself.
//!
//! ## Algorithm
//!
//! 1. **Reserve**: walk the raw tree, parse every pointer, locate its target
//!    and reserve one empty arena node per distinct container target, keyed
//!    by canonical path (the RefTable). Nothing is populated yet.
//! 2. **Populate**: fill each reserved node from its raw target. Nested
//!    pointers, and nested locations that are themselves reserved, become
//!    references to the reserved node instead of being recursed into.
//! 3. **Replace**: build the remaining tree from the root the same way.
//! 4. **Provenance**: record the canonical path of every reserved node.
//!
//! Because a reserved node is never expanded in place, self and mutual
//! cycles terminate after one visit per location.

use std::collections::{BTreeMap, HashMap};

use crate::types::document::{Node, NodeId, NodeKind, ResolvedDocument, Value};
use crate::types::pointer::{Pointer, PointerError};

/// Upper bound on `$ref` → `$ref` hops while locating one target.
const MAX_ALIAS_HOPS: usize = 64;

/// Error type for resolution. Aborts only the document being resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A pointer has no matching location.
    #[error("unresolved reference {pointer} in {source_id}")]
    UnresolvedReference {
        /// The raw `$ref` string.
        pointer: String,
        /// Source the document was loaded from.
        source_id: String,
    },
    /// A `$ref` string is not a valid same-document pointer.
    #[error("invalid reference in {source_id}: {error}")]
    InvalidPointer {
        /// Source the document was loaded from.
        source_id: String,
        /// Underlying parse error.
        error: PointerError,
    },
    /// Pointers alias each other without ever reaching a concrete value.
    #[error("circular alias starting at {pointer} in {source_id}")]
    CircularAlias {
        /// The raw `$ref` string.
        pointer: String,
        /// Source the document was loaded from.
        source_id: String,
    },
}

/// Summary of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Number of `$ref` occurrences replaced.
    pub pointers: usize,
    /// Number of distinct container targets (RefTable size).
    pub shared_targets: usize,
    /// Total container nodes in the arena.
    pub nodes: usize,
}

/// Resolve all pointers in `raw`.
///
/// `source_id` names the input in diagnostics.
pub fn resolve(raw: &serde_json::Value, source_id: &str) -> Result<ResolvedDocument, ResolveError> {
    resolve_with_stats(raw, source_id).map(|(doc, _)| doc)
}

/// Resolve all pointers in `raw`, also returning pass statistics.
pub fn resolve_with_stats(
    raw: &serde_json::Value,
    source_id: &str,
) -> Result<(ResolvedDocument, ResolveStats), ResolveError> {
    let mut resolver = Resolver::new(raw, source_id);
    resolver.reserve(raw, &Pointer::root())?;
    resolver.populate_reserved()?;
    let root = resolver.build_value(raw, &Pointer::root())?;
    Ok(resolver.finish(root))
}

/// Whether `value` is a pointer node; returns its `$ref` string.
pub fn pointer_ref(value: &serde_json::Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

/// Where a pointer ends up after following aliases.
#[derive(Debug, Clone)]
enum Target<'a> {
    /// A container at a concrete location.
    Container(Pointer, &'a serde_json::Value),
    /// A scalar, copied on use.
    Scalar(Value),
}

struct Resolver<'a> {
    raw: &'a serde_json::Value,
    source_id: &'a str,
    nodes: Vec<Node>,
    /// Canonical path → reserved node.
    ref_table: HashMap<String, NodeId>,
    /// Reserved nodes in reservation order, with their raw targets.
    reserved: Vec<(NodeId, Pointer, &'a serde_json::Value)>,
    /// Canonical pointer string → resolved target, memoized per distinct `$ref`.
    targets: HashMap<String, Target<'a>>,
    pointers: usize,
}

impl<'a> Resolver<'a> {
    fn new(raw: &'a serde_json::Value, source_id: &'a str) -> Self {
        Self {
            raw,
            source_id,
            nodes: Vec::new(),
            ref_table: HashMap::new(),
            reserved: Vec::new(),
            targets: HashMap::new(),
            pointers: 0,
        }
    }

    /// First traversal: reserve a placeholder for every container target.
    fn reserve(&mut self, value: &'a serde_json::Value, location: &Pointer) -> Result<(), ResolveError> {
        if let Some(reference) = pointer_ref(value) {
            if value.as_object().map_or(0, |o| o.len()) > 1 {
                tracing::debug!(
                    source = self.source_id,
                    location = %location,
                    "ignoring siblings of $ref"
                );
            }
            if let Target::Container(path, target) = self.target(reference)? {
                let key = path.to_canonical_string();
                if !self.ref_table.contains_key(&key) {
                    let id = self.alloc(Node::empty(container_kind(target)));
                    self.ref_table.insert(key, id);
                    self.reserved.push((id, path, target));
                }
            }
            return Ok(());
        }

        match value {
            serde_json::Value::Object(members) => {
                for (key, child) in members {
                    self.reserve(child, &location.child(key.as_str()))?;
                }
            }
            serde_json::Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    self.reserve(child, &location.child(index.to_string()))?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Second traversal: populate reserved placeholders in reservation order.
    fn populate_reserved(&mut self) -> Result<(), ResolveError> {
        let reserved = self.reserved.clone();
        for (id, path, target) in reserved {
            let node = self.build_contents(target, &path)?;
            self.nodes[id.index()] = node;
        }
        Ok(())
    }

    /// Build a value for the raw `value` found at `location`.
    fn build_value(&mut self, value: &'a serde_json::Value, location: &Pointer) -> Result<Value, ResolveError> {
        if let Some(reference) = pointer_ref(value) {
            self.pointers += 1;
            return match self.target(reference)? {
                Target::Container(path, _) => {
                    let key = path.to_canonical_string();
                    self.ref_table.get(&key).map(|id| Value::Node(*id)).ok_or_else(|| {
                        // Every container target was reserved in the first pass.
                        ResolveError::UnresolvedReference {
                            pointer: reference.to_string(),
                            source_id: self.source_id.to_string(),
                        }
                    })
                }
                Target::Scalar(scalar) => Ok(scalar),
            };
        }

        if let Some(scalar) = Value::from_scalar(value) {
            return Ok(scalar);
        }

        // A location that some pointer targets is shared: reference it.
        if let Some(id) = self.ref_table.get(&location.to_canonical_string()) {
            return Ok(Value::Node(*id));
        }

        let id = self.alloc(Node::empty(container_kind(value)));
        let node = self.build_contents(value, location)?;
        self.nodes[id.index()] = node;
        Ok(Value::Node(id))
    }

    /// Build the members or items of a raw container.
    fn build_contents(&mut self, value: &'a serde_json::Value, location: &Pointer) -> Result<Node, ResolveError> {
        match value {
            serde_json::Value::Object(members) => {
                let mut out = Vec::with_capacity(members.len());
                for (key, child) in members {
                    let built = self.build_value(child, &location.child(key.as_str()))?;
                    out.push((key.clone(), built));
                }
                Ok(Node::Object(out))
            }
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, child) in items.iter().enumerate() {
                    out.push(self.build_value(child, &location.child(index.to_string()))?);
                }
                Ok(Node::Array(out))
            }
            _ => Ok(Node::Object(Vec::new())),
        }
    }

    /// Locate the concrete target of a `$ref`, following aliases. Memoized.
    fn target(&mut self, reference: &str) -> Result<Target<'a>, ResolveError> {
        let pointer = self.parse(reference)?;
        let key = pointer.to_canonical_string();
        if let Some(found) = self.targets.get(&key) {
            return Ok(found.clone());
        }

        let found = self.locate(reference, pointer)?;
        self.targets.insert(key, found.clone());
        Ok(found)
    }

    fn locate(&self, reference: &str, start: Pointer) -> Result<Target<'a>, ResolveError> {
        let mut pointer = start;
        let mut hops = 0;

        loop {
            let segments = pointer.segments().to_vec();
            let mut current = self.raw;
            let mut redirect = None;

            for (depth, segment) in segments.iter().enumerate() {
                // Traversing through a pointer node: continue from its target
                // with the remaining segments.
                if let Some(inner) = pointer_ref(current) {
                    let mut next = self.parse(inner)?;
                    for rest in &segments[depth..] {
                        next = next.child(rest.as_str());
                    }
                    redirect = Some(next);
                    break;
                }
                current = child_of(current, segment).ok_or_else(|| ResolveError::UnresolvedReference {
                    pointer: reference.to_string(),
                    source_id: self.source_id.to_string(),
                })?;
            }

            if redirect.is_none() {
                if let Some(inner) = pointer_ref(current) {
                    redirect = Some(self.parse(inner)?);
                }
            }

            match redirect {
                Some(next) => {
                    hops += 1;
                    if hops > MAX_ALIAS_HOPS {
                        return Err(ResolveError::CircularAlias {
                            pointer: reference.to_string(),
                            source_id: self.source_id.to_string(),
                        });
                    }
                    pointer = next;
                }
                None => {
                    return Ok(match Value::from_scalar(current) {
                        Some(scalar) => Target::Scalar(scalar),
                        None => Target::Container(pointer, current),
                    });
                }
            }
        }
    }

    fn parse(&self, reference: &str) -> Result<Pointer, ResolveError> {
        Pointer::parse(reference).map_err(|error| ResolveError::InvalidPointer {
            source_id: self.source_id.to_string(),
            error,
        })
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId::new(self.nodes.len() - 1)
    }

    fn finish(self, root: Value) -> (ResolvedDocument, ResolveStats) {
        let provenance: BTreeMap<NodeId, String> = self
            .reserved
            .iter()
            .map(|(id, path, _)| (*id, path.to_canonical_string()))
            .collect();
        let stats = ResolveStats {
            pointers: self.pointers,
            shared_targets: self.reserved.len(),
            nodes: self.nodes.len(),
        };
        (ResolvedDocument::from_parts(self.nodes, root, provenance), stats)
    }
}

fn container_kind(value: &serde_json::Value) -> NodeKind {
    if value.is_array() {
        NodeKind::Array
    } else {
        NodeKind::Object
    }
}

fn child_of<'v>(value: &'v serde_json::Value, segment: &str) -> Option<&'v serde_json::Value> {
    match value {
        serde_json::Value::Object(members) => members.get(segment),
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_without_pointers() {
        let raw = json!({"openapi": "3.1.0", "info": {"title": "t", "version": "1"}});
        let (doc, stats) = resolve_with_stats(&raw, "plain.json").unwrap();
        assert_eq!(stats.pointers, 0);
        assert_eq!(stats.shared_targets, 0);
        assert_eq!(doc.to_json().unwrap(), raw);
        assert!(doc.provenance_table().is_empty());
    }

    #[test]
    fn test_pointer_and_location_share_identity() {
        let raw = json!({
            "components": {"schemas": {"Pet": {"type": "object"}}},
            "a": {"$ref": "#/components/schemas/Pet"},
            "b": {"$ref": "#/components/schemas/Pet"}
        });
        let (doc, stats) = resolve_with_stats(&raw, "pets.json").unwrap();
        let pet = doc.node_at("#/components/schemas/Pet").unwrap();
        assert_eq!(doc.node_at("#/a"), Some(pet));
        assert_eq!(doc.node_at("#/b"), Some(pet));
        assert_eq!(doc.provenance(pet), Some("#/components/schemas/Pet"));
        assert_eq!(stats.pointers, 2);
        assert_eq!(stats.shared_targets, 1);
    }

    #[test]
    fn test_self_reference_terminates() {
        let raw = json!({
            "definitions": {
                "Node": {"properties": {"next": {"$ref": "#/definitions/Node"}}}
            }
        });
        let doc = resolve(&raw, "node.json").unwrap();
        let node = doc.node_at("#/definitions/Node").unwrap();
        assert_eq!(doc.node_at("#/definitions/Node/properties/next"), Some(node));
    }

    #[test]
    fn test_root_reference() {
        let raw = json!({"self": {"$ref": "#"}});
        let doc = resolve(&raw, "root.json").unwrap();
        let root = doc.root().as_node().unwrap();
        assert_eq!(doc.node_at("#/self"), Some(root));
        assert_eq!(doc.provenance(root), Some("#"));
    }

    #[test]
    fn test_escaped_and_encoded_pointers_share_slot() {
        let raw = json!({
            "paths": {"/pets": {"get": {"summary": "list"}}},
            "x": {"$ref": "#/paths/~1pets/get"},
            "y": {"$ref": "#/paths/%7E1pets/get"}
        });
        let doc = resolve(&raw, "paths.json").unwrap();
        let get = doc.node_at("#/paths/~1pets/get").unwrap();
        assert_eq!(doc.node_at("#/x"), Some(get));
        assert_eq!(doc.node_at("#/y"), Some(get));
    }

    #[test]
    fn test_scalar_target_is_copied() {
        let raw = json!({"info": {"title": "Pets"}, "alias": {"$ref": "#/info/title"}});
        let doc = resolve(&raw, "scalar.json").unwrap();
        assert_eq!(doc.pointer("#/alias").unwrap(), Some(&Value::String("Pets".into())));
    }

    #[test]
    fn test_array_targets_keep_identity_and_kind() {
        use crate::emitter::{emit, encode, load_module};
        use crate::slug::SlugTable;

        let raw = json!({
            "tags": [{"name": "a"}],
            "list": {"$ref": "#/tags"},
            "first": {"$ref": "#/tags/0"}
        });
        let doc = resolve(&raw, "tags.json").unwrap();
        let tags = doc.node_at("#/tags").unwrap();
        let first = doc.node_at("#/tags/0").unwrap();
        assert_eq!(doc.node_at("#/list"), Some(tags));
        assert_eq!(doc.node_at("#/first"), Some(first));
        assert_eq!(doc.node(tags).map(Node::kind), Some(NodeKind::Array));
        assert_eq!(doc.node_at("#/list/0"), Some(first));
        assert_eq!(doc.provenance(tags), Some("#/tags"));
        assert_eq!(doc.provenance(first), Some("#/tags/0"));

        let module = encode(&doc, &SlugTable::default()).unwrap();
        assert_eq!(module.slots, vec![NodeKind::Array, NodeKind::Object]);

        let loaded = load_module(&emit(&doc, &SlugTable::default()).unwrap().text).unwrap();
        let reloaded = &loaded.document;
        let tags = reloaded.node_at("#/tags").unwrap();
        let first = reloaded.node_at("#/tags/0").unwrap();
        assert_eq!(reloaded.node_at("#/list"), Some(tags));
        assert_eq!(reloaded.node_at("#/first"), Some(first));
        assert_eq!(reloaded.node(tags).map(Node::kind), Some(NodeKind::Array));
        assert_eq!(reloaded.provenance(tags), Some("#/tags"));
        assert!(*reloaded == doc);
    }

    #[test]
    fn test_alias_chain_and_traversal_through_pointer() {
        let raw = json!({
            "components": {"schemas": {
                "Pet": {"properties": {"name": {"type": "string"}}},
                "Alias": {"$ref": "#/components/schemas/Pet"}
            }},
            "direct": {"$ref": "#/components/schemas/Alias"},
            "nested": {"$ref": "#/components/schemas/Alias/properties/name"}
        });
        let doc = resolve(&raw, "alias.json").unwrap();
        let pet = doc.node_at("#/components/schemas/Pet").unwrap();
        assert_eq!(doc.node_at("#/direct"), Some(pet));
        assert_eq!(doc.node_at("#/components/schemas/Alias"), Some(pet));
        assert_eq!(
            doc.node_at("#/nested"),
            doc.node_at("#/components/schemas/Pet/properties/name")
        );
    }

    #[test]
    fn test_unresolved_reference_names_path_and_source() {
        let raw = json!({"a": {"$ref": "#/components/schemas/Missing"}});
        let err = resolve(&raw, "broken.json").unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnresolvedReference {
                pointer: "#/components/schemas/Missing".to_string(),
                source_id: "broken.json".to_string(),
            }
        );
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_circular_alias_is_an_error() {
        let raw = json!({"a": {"$ref": "#/b"}, "b": {"$ref": "#/a"}});
        let err = resolve(&raw, "loop.json").unwrap_err();
        assert!(matches!(err, ResolveError::CircularAlias { .. }));
    }

    #[test]
    fn test_external_reference_is_invalid() {
        let raw = json!({"a": {"$ref": "other.json#/a"}});
        let err = resolve(&raw, "ext.json").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPointer { .. }));
    }
}
