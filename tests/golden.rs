//! Golden tests for the schema graph kernel.
//!
//! These tests verify identity preservation, determinism and round-tripping
//! of the resolve → emit → load pipeline.

use schema_graph_kernel::{
    emit, load_module, resolve, slugify, CollisionPolicy, ResolvedDocument, SlugGenerator,
    SlugInputs, SlugTable,
};
use serde_json::json;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn pet_and_error() -> serde_json::Value {
    json!({
        "openapi": "3.0.3",
        "info": {"title": "Petstore", "version": "1.0.0"},
        "paths": {
            "/pets": {
                "get": {
                    "responses": {
                        "200": {"content": {"application/json": {
                            "schema": {"$ref": "#/components/schemas/Pet"}
                        }}},
                        "default": {"content": {"application/json": {
                            "schema": {"$ref": "#/components/schemas/Error"}
                        }}}
                    }
                }
            }
        },
        "components": {"schemas": {
            "Pet": {
                "type": "object",
                "required": ["id", "name"],
                "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
            },
            "Error": {
                "type": "object",
                "properties": {"code": {"type": "integer"}, "message": {"type": "string"}}
            }
        }}
    })
}

fn people_and_pets() -> serde_json::Value {
    json!({
        "openapi": "3.1.0",
        "info": {"title": "People", "version": "2.0.0"},
        "paths": {},
        "components": {"schemas": {
            "Person": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "bestFriend": {"$ref": "#/components/schemas/Person"},
                    "pets": {"type": "array", "items": {"$ref": "#/components/schemas/Pet"}}
                }
            },
            "Pet": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "owner": {"$ref": "#/components/schemas/Person"}
                }
            }
        }}
    })
}

fn slugs_for(doc: &ResolvedDocument) -> SlugTable {
    SlugGenerator::new(CollisionPolicy::Disambiguate)
        .generate(&SlugInputs::from_document(doc))
        .unwrap()
        .table
}

const PET_RESPONSE: &str =
    "#/paths/~1pets/get/responses/200/content/application~1json/schema";
const ERROR_RESPONSE: &str =
    "#/paths/~1pets/get/responses/default/content/application~1json/schema";

// ─────────────────────────────────────────────────────────────────────────────
// Shared Definitions
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_referenced_definitions_keep_identity_and_provenance() {
    let raw = pet_and_error();
    let doc = resolve(&raw, "petstore.json").unwrap();

    let pet = doc.node_at("#/components/schemas/Pet").unwrap();
    let error = doc.node_at("#/components/schemas/Error").unwrap();
    assert_eq!(doc.node_at(PET_RESPONSE), Some(pet));
    assert_eq!(doc.node_at(ERROR_RESPONSE), Some(error));
    assert_eq!(doc.provenance(pet), Some("#/components/schemas/Pet"));
    assert_eq!(doc.provenance(error), Some("#/components/schemas/Error"));
}

#[test]
fn test_emitted_module_preserves_shared_definitions() {
    let raw = pet_and_error();
    let doc = resolve(&raw, "petstore.json").unwrap();
    let module = emit(&doc, &slugs_for(&doc)).unwrap();
    let loaded = load_module(&module.text).unwrap().document;

    // Deep-equal to the original definition.
    let expanded = loaded.to_json().unwrap();
    let schema = &expanded["paths"]["/pets"]["get"]["responses"]["200"]["content"]
        ["application/json"]["schema"];
    assert_eq!(schema, &raw["components"]["schemas"]["Pet"]);

    // Same node, same provenance.
    let pet = loaded.node_at("#/components/schemas/Pet").unwrap();
    assert_eq!(loaded.node_at(PET_RESPONSE), Some(pet));
    assert_eq!(loaded.provenance(pet), Some("#/components/schemas/Pet"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycles
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_mutual_recursion_resolves_to_shared_nodes() {
    let doc = resolve(&people_and_pets(), "people.json").unwrap();

    let person = doc.node_at("#/components/schemas/Person").unwrap();
    let pet = doc.node_at("#/components/schemas/Pet").unwrap();
    assert_eq!(doc.node_at("#/components/schemas/Person/properties/bestFriend"), Some(person));
    assert_eq!(doc.node_at("#/components/schemas/Pet/properties/owner"), Some(person));
    assert_eq!(doc.node_at("#/components/schemas/Person/properties/pets/items"), Some(pet));

    // Cycles can be walked indefinitely.
    assert_eq!(
        doc.node_at("#/components/schemas/Person/properties/pets/items/properties/owner/properties/bestFriend"),
        Some(person)
    );
    assert!(doc.to_json().is_err());
}

#[test]
fn test_cyclic_round_trip_preserves_structure_and_identity() {
    let doc = resolve(&people_and_pets(), "people.json").unwrap();
    let module = emit(&doc, &slugs_for(&doc)).unwrap();
    let loaded = load_module(&module.text).unwrap().document;

    assert!(doc == loaded);

    let person = loaded.node_at("#/components/schemas/Person").unwrap();
    let pet = loaded.node_at("#/components/schemas/Pet").unwrap();
    assert_eq!(loaded.node_at("#/components/schemas/Person/properties/bestFriend"), Some(person));
    assert_eq!(loaded.node_at("#/components/schemas/Pet/properties/owner"), Some(person));
    assert_eq!(loaded.node_at("#/components/schemas/Person/properties/pets/items"), Some(pet));
    assert_eq!(loaded.provenance(person), Some("#/components/schemas/Person"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Slugs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ampersand_tags_slug_without_collision() {
    let raw = json!({
        "openapi": "3.0.0",
        "info": {"title": "Zoo", "version": "1"},
        "tags": [{"name": "Pets & Animals"}, {"name": "Admins & Users"}],
        "paths": {}
    });
    let doc = resolve(&raw, "zoo.json").unwrap();
    let output = SlugGenerator::new(CollisionPolicy::Reject)
        .generate(&SlugInputs::from_document(&doc))
        .unwrap();

    assert_eq!(output.table.tag("Pets & Animals"), Some("pets-and-animals"));
    assert_eq!(output.table.tag("Admins & Users"), Some("admins-and-users"));
    assert!(output.collisions.is_empty());
    assert_eq!(slugify("Pets & Animals"), "pets-and-animals");
}

#[test]
fn test_slugs_travel_with_the_module() {
    let raw = json!({
        "openapi": "3.0.0",
        "info": {"title": "Zoo", "version": "1"},
        "tags": [{"name": "Pets"}],
        "paths": {"/pets": {"get": {"tags": ["Pets"], "responses": {}}}}
    });
    let doc = resolve(&raw, "zoo.json").unwrap();
    let slugs = slugs_for(&doc);
    let loaded = load_module(&emit(&doc, &slugs).unwrap().text).unwrap();

    assert_eq!(loaded.slugs, slugs);
    assert_eq!(loaded.slugs.operation("get", "/pets"), Some("get-pets"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_same_document_same_module_100_runs() {
    let raw = people_and_pets();
    let first = {
        let doc = resolve(&raw, "people.json").unwrap();
        emit(&doc, &slugs_for(&doc)).unwrap()
    };

    for _ in 0..100 {
        let doc = resolve(&raw, "people.json").unwrap();
        let module = emit(&doc, &slugs_for(&doc)).unwrap();
        assert_eq!(module.text, first.text);
        assert_eq!(module.fingerprint, first.fingerprint);
    }
}

#[test]
fn test_content_change_changes_fingerprint() {
    let mut raw = pet_and_error();
    let doc = resolve(&raw, "petstore.json").unwrap();
    let before = emit(&doc, &slugs_for(&doc)).unwrap();

    raw["components"]["schemas"]["Pet"]["properties"]["tag"] = json!({"type": "string"});
    let doc = resolve(&raw, "petstore.json").unwrap();
    let after = emit(&doc, &slugs_for(&doc)).unwrap();

    assert_ne!(before.fingerprint, after.fingerprint);
    assert_eq!(before.slot_count, after.slot_count);
}

#[test]
fn test_reemitting_a_loaded_module_is_stable() {
    let doc = resolve(&people_and_pets(), "people.json").unwrap();
    let slugs = slugs_for(&doc);
    let module = emit(&doc, &slugs).unwrap();
    let loaded = load_module(&module.text).unwrap();

    let again = emit(&loaded.document, &loaded.slugs).unwrap();
    assert_eq!(again.text, module.text);
}
