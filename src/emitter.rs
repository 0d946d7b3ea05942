//! Deterministic module emitter for resolved documents.
//!
//! A resolved document is a graph, not a tree: shared targets are reachable
//! from several places and cycles are allowed. A literal serializer would
//! loop forever on cycles and duplicate shared nodes. The emitter instead
//! writes an index-addressed encoding:
//!
//! ```text
//! slots      ["object", "array", ...]     one initially-empty literal per slot
//! populate   [Encoded, ...]               contents of each slot, in slot order
//! schema     Encoded                      the exported tree
//! provenance { "<slot>": "#/path" }       non-structural metadata
//! slugs      SlugTable
//! ```
//!
//! A node becomes a slot if it has provenance, has two or more incoming
//! edges, or sits on a cycle. Every other container is inlined; it has
//! exactly one parent so inlining cannot break identity.
//!
//! ## Determinism Guarantees
//!
//! - Slots are numbered in depth-first pre-order from the root
//! - Object members keep document order
//! - Output text depends only on document structure, never on arena layout

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::{text_fingerprint, to_canonical_string};
use crate::slug::SlugTable;
use crate::types::document::{Node, NodeId, NodeKind, ResolvedDocument, Value};

/// Format marker written into every module.
pub const MODULE_FORMAT_VERSION: &str = "schema_graph_module_v1";

/// Error type for emitting and loading modules.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// JSON (de)serialization failed.
    #[error("module serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A value references a node outside the arena.
    #[error("dangling node reference: {0}")]
    Dangling(NodeId),
    /// The module was written by an incompatible emitter.
    #[error("unsupported module format {0:?}")]
    UnsupportedFormat(String),
    /// The module is structurally inconsistent.
    #[error("malformed module: {0}")]
    Malformed(String),
}

/// One encoded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Encoded {
    /// JSON `null`.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Number literal.
    Number(serde_json::Number),
    /// String literal.
    String(String),
    /// Inline array.
    Array(Vec<Encoded>),
    /// Inline object as ordered `[key, value]` pairs.
    Object(Vec<(String, Encoded)>),
    /// Reference to a slot.
    Slot(usize),
}

/// The serialized form of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedModule {
    /// Format marker, see [`MODULE_FORMAT_VERSION`].
    pub format: String,
    /// Kind of each slot's initially-empty literal.
    pub slots: Vec<NodeKind>,
    /// Contents of each slot.
    pub populate: Vec<Encoded>,
    /// The exported schema tree.
    pub schema: Encoded,
    /// Slot → provenance path.
    pub provenance: BTreeMap<usize, String>,
    /// Slug tables exported alongside the schema.
    pub slugs: SlugTable,
}

/// Emitted module text plus its content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    /// Module text (pretty JSON).
    pub text: String,
    /// xxh64 of `text`, usable as a cache key.
    pub fingerprint: String,
    /// Number of slots in the module.
    pub slot_count: usize,
}

/// A module loaded back into memory.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// The rebuilt document. Slot `i` is `NodeId(i)`.
    pub document: ResolvedDocument,
    /// The exported slug tables.
    pub slugs: SlugTable,
}

/// Emit `doc` and `slugs` as module text.
pub fn emit(doc: &ResolvedDocument, slugs: &SlugTable) -> Result<GeneratedModule, EmitError> {
    let module = encode(doc, slugs)?;
    let text = to_canonical_string(&module)?;
    let fingerprint = text_fingerprint(&text);
    Ok(GeneratedModule {
        text,
        fingerprint,
        slot_count: module.slots.len(),
    })
}

/// Build the [`EmittedModule`] for `doc` without serializing it.
pub fn encode(doc: &ResolvedDocument, slugs: &SlugTable) -> Result<EmittedModule, EmitError> {
    let children = adjacency(doc)?;
    let order = preorder(doc, &children);

    let mut indegree = vec![0usize; doc.len()];
    for &id in &order {
        for &child in &children[id] {
            indegree[child] += 1;
        }
    }
    let cyclic = cyclic_nodes(&order, &children);

    let mut slot_of: Vec<Option<usize>> = vec![None; doc.len()];
    let mut slot_nodes = Vec::new();
    for &id in &order {
        let node = NodeId::new(id);
        if doc.provenance(node).is_some() || indegree[id] >= 2 || cyclic[id] {
            slot_of[id] = Some(slot_nodes.len());
            slot_nodes.push(node);
        }
    }

    let encoder = Encoder { doc, slot_of: &slot_of };
    let mut slots = Vec::with_capacity(slot_nodes.len());
    let mut populate = Vec::with_capacity(slot_nodes.len());
    for &node in &slot_nodes {
        slots.push(doc.node(node).ok_or(EmitError::Dangling(node))?.kind());
        populate.push(encoder.encode_node(node)?);
    }

    let provenance = slot_nodes
        .iter()
        .enumerate()
        .filter_map(|(slot, node)| doc.provenance(*node).map(|path| (slot, path.to_string())))
        .collect();

    Ok(EmittedModule {
        format: MODULE_FORMAT_VERSION.to_string(),
        slots,
        populate,
        schema: encoder.encode_value(doc.root())?,
        provenance,
        slugs: slugs.clone(),
    })
}

/// Parse module text back into a document with the same identity relationships.
pub fn load_module(text: &str) -> Result<LoadedModule, EmitError> {
    let module: EmittedModule = serde_json::from_str(text)?;
    if module.format != MODULE_FORMAT_VERSION {
        return Err(EmitError::UnsupportedFormat(module.format));
    }
    if module.populate.len() != module.slots.len() {
        return Err(EmitError::Malformed(format!(
            "{} slots but {} populate entries",
            module.slots.len(),
            module.populate.len()
        )));
    }

    let slot_count = module.slots.len();
    let mut nodes: Vec<Node> = module.slots.iter().map(|kind| Node::empty(*kind)).collect();

    for (slot, (kind, contents)) in module.slots.iter().zip(&module.populate).enumerate() {
        let node = decode_contents(contents, slot_count, &mut nodes)?;
        if node.kind() != *kind {
            return Err(EmitError::Malformed(format!("slot {slot} declared {kind:?} but populated as {:?}", node.kind())));
        }
        nodes[slot] = node;
    }

    let root = decode_value(&module.schema, slot_count, &mut nodes)?;

    let mut provenance = BTreeMap::new();
    for (slot, path) in module.provenance {
        if slot >= slot_count {
            return Err(EmitError::Malformed(format!("provenance for unknown slot {slot}")));
        }
        provenance.insert(NodeId::new(slot), path);
    }

    Ok(LoadedModule {
        document: ResolvedDocument::from_parts(nodes, root, provenance),
        slugs: module.slugs,
    })
}

struct Encoder<'a> {
    doc: &'a ResolvedDocument,
    slot_of: &'a [Option<usize>],
}

impl Encoder<'_> {
    fn encode_value(&self, value: &Value) -> Result<Encoded, EmitError> {
        Ok(match value {
            Value::Null => Encoded::Null,
            Value::Bool(b) => Encoded::Bool(*b),
            Value::Number(n) => Encoded::Number(n.clone()),
            Value::String(s) => Encoded::String(s.clone()),
            Value::Node(id) => match self.slot_of.get(id.index()).copied().flatten() {
                Some(slot) => Encoded::Slot(slot),
                None => self.encode_node(*id)?,
            },
        })
    }

    fn encode_node(&self, id: NodeId) -> Result<Encoded, EmitError> {
        Ok(match self.doc.node(id).ok_or(EmitError::Dangling(id))? {
            Node::Object(members) => Encoded::Object(
                members
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), self.encode_value(value)?)))
                    .collect::<Result<_, EmitError>>()?,
            ),
            Node::Array(items) => Encoded::Array(
                items
                    .iter()
                    .map(|value| self.encode_value(value))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

fn decode_value(encoded: &Encoded, slot_count: usize, nodes: &mut Vec<Node>) -> Result<Value, EmitError> {
    Ok(match encoded {
        Encoded::Null => Value::Null,
        Encoded::Bool(b) => Value::Bool(*b),
        Encoded::Number(n) => Value::Number(n.clone()),
        Encoded::String(s) => Value::String(s.clone()),
        Encoded::Slot(slot) if *slot < slot_count => Value::Node(NodeId::new(*slot)),
        Encoded::Slot(slot) => return Err(EmitError::Malformed(format!("reference to unknown slot {slot}"))),
        Encoded::Array(_) | Encoded::Object(_) => {
            let node = decode_contents(encoded, slot_count, nodes)?;
            nodes.push(node);
            Value::Node(NodeId::new(nodes.len() - 1))
        }
    })
}

fn decode_contents(encoded: &Encoded, slot_count: usize, nodes: &mut Vec<Node>) -> Result<Node, EmitError> {
    match encoded {
        Encoded::Object(members) => Ok(Node::Object(
            members
                .iter()
                .map(|(key, value)| Ok((key.clone(), decode_value(value, slot_count, nodes)?)))
                .collect::<Result<_, EmitError>>()?,
        )),
        Encoded::Array(items) => Ok(Node::Array(
            items
                .iter()
                .map(|value| decode_value(value, slot_count, nodes))
                .collect::<Result<_, _>>()?,
        )),
        other => Err(EmitError::Malformed(format!("slot contents must be a container, got {other:?}"))),
    }
}

/// Child node indices per node, in member order.
fn adjacency(doc: &ResolvedDocument) -> Result<Vec<Vec<usize>>, EmitError> {
    doc.nodes()
        .iter()
        .map(|node| {
            node.children()
                .map(|child| {
                    if child.index() < doc.len() {
                        Ok(child.index())
                    } else {
                        Err(EmitError::Dangling(child))
                    }
                })
                .collect()
        })
        .collect()
}

/// Reachable nodes in depth-first pre-order from the root.
fn preorder(doc: &ResolvedDocument, children: &[Vec<usize>]) -> Vec<usize> {
    let mut visited = vec![false; doc.len()];
    let mut order = Vec::new();
    let mut stack: Vec<usize> = doc.root().as_node().map(|id| id.index()).into_iter().collect();

    while let Some(id) = stack.pop() {
        if visited[id] {
            continue;
        }
        visited[id] = true;
        order.push(id);
        stack.extend(children[id].iter().rev().filter(|c| !visited[**c]));
    }
    order
}

/// Nodes on a cycle: members of non-trivial strongly connected components
/// and nodes with a self edge. Iterative Tarjan.
fn cyclic_nodes(order: &[usize], children: &[Vec<usize>]) -> Vec<bool> {
    const UNVISITED: usize = usize::MAX;
    let n = children.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut cyclic = vec![false; n];
    let mut stack = Vec::new();
    let mut next = 0usize;

    for &start in order {
        if index[start] != UNVISITED {
            continue;
        }
        index[start] = next;
        lowlink[start] = next;
        next += 1;
        stack.push(start);
        on_stack[start] = true;
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];

        while let Some(&(v, cursor)) = work.last() {
            if let Some(&w) = children[v].get(cursor) {
                if let Some(frame) = work.last_mut() {
                    frame.1 += 1;
                }
                if w == v {
                    cyclic[v] = true;
                }
                if index[w] == UNVISITED {
                    index[w] = next;
                    lowlink[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                if component.len() > 1 {
                    for w in component {
                        cyclic[w] = true;
                    }
                }
            }
        }
    }
    cyclic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use serde_json::json;

    #[test]
    fn test_tree_has_no_slots() {
        let raw = json!({"info": {"title": "t"}, "list": [1, 2, {"a": null}]});
        let doc = resolve(&raw, "tree.json").unwrap();
        let module = encode(&doc, &SlugTable::default()).unwrap();
        assert!(module.slots.is_empty());

        let loaded = load_module(&emit(&doc, &SlugTable::default()).unwrap().text).unwrap();
        assert_eq!(loaded.document.to_json().unwrap(), raw);
    }

    #[test]
    fn test_shared_target_becomes_one_slot() {
        let raw = json!({
            "components": {"schemas": {"Pet": {"type": "object"}}},
            "a": {"$ref": "#/components/schemas/Pet"},
            "b": {"$ref": "#/components/schemas/Pet"}
        });
        let doc = resolve(&raw, "pets.json").unwrap();
        let module = encode(&doc, &SlugTable::default()).unwrap();
        assert_eq!(module.slots, vec![NodeKind::Object]);
        assert_eq!(module.provenance.get(&0).map(String::as_str), Some("#/components/schemas/Pet"));
    }

    #[test]
    fn test_cycle_without_provenance_is_slotted() {
        // n0 = { next: n1 }, n1 = { back: n0 }: a cycle built directly in the arena.
        let nodes = vec![
            Node::Object(vec![("next".to_string(), Value::Node(NodeId::new(1)))]),
            Node::Object(vec![("back".to_string(), Value::Node(NodeId::new(0)))]),
        ];
        let doc = ResolvedDocument::from_parts(nodes, Value::Node(NodeId::new(0)), BTreeMap::new());
        let module = encode(&doc, &SlugTable::default()).unwrap();
        assert_eq!(module.slots.len(), 2);
        assert_eq!(module.schema, Encoded::Slot(0));

        let loaded = load_module(&emit(&doc, &SlugTable::default()).unwrap().text).unwrap();
        let root = loaded.document.root().as_node().unwrap();
        assert_eq!(loaded.document.node_at("#/next/back"), Some(root));
        assert_eq!(loaded.document, doc);
    }

    #[test]
    fn test_emission_is_independent_of_arena_layout() {
        // Same structure, different arena numbering.
        let a = ResolvedDocument::from_parts(
            vec![
                Node::Object(vec![("x".to_string(), Value::Node(NodeId::new(1)))]),
                Node::Array(vec![Value::Bool(true)]),
            ],
            Value::Node(NodeId::new(0)),
            BTreeMap::new(),
        );
        let b = ResolvedDocument::from_parts(
            vec![
                Node::Array(vec![Value::Bool(true)]),
                Node::Object(vec![("x".to_string(), Value::Node(NodeId::new(0)))]),
            ],
            Value::Node(NodeId::new(1)),
            BTreeMap::new(),
        );
        let slugs = SlugTable::default();
        assert_eq!(emit(&a, &slugs).unwrap(), emit(&b, &slugs).unwrap());
    }

    #[test]
    fn test_load_rejects_bad_modules() {
        let doc = resolve(&json!({"a": 1}), "a.json").unwrap();
        let mut module = encode(&doc, &SlugTable::default()).unwrap();
        module.format = "other".to_string();
        let text = serde_json::to_string(&module).unwrap();
        assert!(matches!(load_module(&text), Err(EmitError::UnsupportedFormat(_))));

        module.format = MODULE_FORMAT_VERSION.to_string();
        module.schema = Encoded::Slot(3);
        let text = serde_json::to_string(&module).unwrap();
        assert!(matches!(load_module(&text), Err(EmitError::Malformed(_))));

        assert!(matches!(load_module("{"), Err(EmitError::Serialization(_))));
    }
}
