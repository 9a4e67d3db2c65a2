//! Schema document emission
//!
//! Produces a forward-reference-free schema document: a composite type is
//! declared in full the first time it occurs and referenced by bare name
//! thereafter. Pointer chains collapse to `["null", <innermost schema>]`
//! regardless of nesting depth; all sequence variants declare
//! `{"type": "array", "items": <element schema>}`.

use crate::errors::Result;
use crate::walker::{NodeId, PolyState, Walker, WalkerKind, WalkerTree};
use serde_json::{json, Value};
use std::collections::HashSet;

impl WalkerTree {
    /// Emit the schema document for this tree. Requires a fully resolved
    /// tree, since an unresolved polymorphic sequence has no element
    /// schema yet.
    pub fn emit_schema(&self) -> Result<Value> {
        self.require_resolved()?;
        let mut declared = HashSet::new();
        Ok(self.record_schema(self.root_id(), &mut declared))
    }

    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }

    fn record_schema(&self, id: NodeId, declared: &mut HashSet<NodeId>) -> Value {
        let node = self.node(id);
        if !declared.insert(id) {
            return Value::String(node.type_name.clone());
        }
        let fields: Vec<Value> = node
            .fields
            .iter()
            .map(|f| {
                json!({
                    "name": f.walker.field_name,
                    "type": self.walker_schema(&f.walker, declared),
                })
            })
            .collect();
        json!({
            "type": "record",
            "name": node.type_name,
            "fields": fields,
        })
    }

    fn walker_schema(&self, walker: &Walker, declared: &mut HashSet<NodeId>) -> Value {
        match &walker.kind {
            WalkerKind::Scalar(kind) => Value::String(kind.schema_name().to_string()),
            WalkerKind::CharText { .. } | WalkerKind::OwnedText | WalkerKind::LibText => {
                Value::String("string".to_string())
            }
            WalkerKind::Pointer { .. } => {
                let innermost = self.innermost(walker);
                json!(["null", self.walker_schema(innermost, declared)])
            }
            // Pruned at build time; an explicit null schema keeps the
            // match exhaustive
            WalkerKind::WeakRef => Value::String("null".to_string()),
            WalkerKind::FixedArray { element, .. } | WalkerKind::DynSequence { element } => {
                json!({"type": "array", "items": self.walker_schema(element, declared)})
            }
            WalkerKind::BitSequence => json!({"type": "array", "items": "boolean"}),
            WalkerKind::PolySequence { slot } => match self.poly_state(*slot) {
                // require_resolved() runs before any schema walk
                PolyState::Unresolved => Value::Null,
                PolyState::Resolved(id) => {
                    json!({"type": "array", "items": self.record_schema(id, declared)})
                }
            },
            WalkerKind::Record(id) => self.record_schema(*id, declared),
            WalkerKind::JaggedLeaf { element, dims } => {
                let mut schema = Value::String(element.schema_name().to_string());
                for _ in 0..dims.depth() {
                    schema = json!({"type": "array", "items": schema});
                }
                schema
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WalkError;
    use rowcast_model::{DictionaryProvider, FieldDescriptor, TypeDescriptor};

    #[test]
    fn test_scalar_and_text_schema() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Row", 48)
                .with_field(FieldDescriptor::new("flag", 8, "bool"))
                .with_field(FieldDescriptor::new("count", 9, "unsigned int"))
                .with_field(FieldDescriptor::new("label", 16, "char").with_dims(&[16]))
                .with_field(FieldDescriptor::new("name", 32, "string")),
        );
        let tree = WalkerTree::build(&dict, "Row").unwrap();

        let schema = tree.emit_schema().unwrap();
        assert_eq!(schema["type"], "record");
        assert_eq!(schema["name"], "Row");
        let fields = schema["fields"].as_array().unwrap();
        assert_eq!(fields[0]["type"], "boolean");
        // Promoted carrier shows up in the schema
        assert_eq!(fields[1]["type"], "long");
        assert_eq!(fields[2]["type"], "string");
        assert_eq!(fields[3]["type"], "string");
    }

    #[test]
    fn test_pointer_schema_is_null_union() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Row", 16)
                .with_field(FieldDescriptor::new("next", 8, "Point**")),
        );
        dict.add_type(
            TypeDescriptor::new("Point", 16).with_field(FieldDescriptor::new("x", 8, "double")),
        );
        let tree = WalkerTree::build(&dict, "Row").unwrap();

        let schema = tree.emit_schema().unwrap();
        let next = &schema["fields"][0]["type"];
        // The chain of pointers collapses to one union with the innermost
        // concrete schema
        assert_eq!(next[0], "null");
        assert_eq!(next[1]["type"], "record");
        assert_eq!(next[1]["name"], "Point");
    }

    #[test]
    fn test_repeated_composite_referenced_by_name() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Pair", 56)
                .with_field(FieldDescriptor::new("a", 8, "Point"))
                .with_field(FieldDescriptor::new("b", 32, "Point")),
        );
        dict.add_type(
            TypeDescriptor::new("Point", 24)
                .with_field(FieldDescriptor::new("x", 8, "double"))
                .with_field(FieldDescriptor::new("y", 16, "double")),
        );
        let tree = WalkerTree::build(&dict, "Pair").unwrap();

        let schema = tree.emit_schema().unwrap();
        let fields = schema["fields"].as_array().unwrap();
        assert_eq!(fields[0]["type"]["type"], "record");
        assert_eq!(fields[1]["type"], json!("Point"));
    }

    #[test]
    fn test_sequence_schemas() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Row", 56)
                .with_field(FieldDescriptor::new("samples", 8, "vector<float>"))
                .with_field(FieldDescriptor::new("hits", 24, "vector<bool>"))
                .with_field(FieldDescriptor::new("grid", 40, "int").with_dims(&[3])),
        );
        let tree = WalkerTree::build(&dict, "Row").unwrap();

        let schema = tree.emit_schema().unwrap();
        let fields = schema["fields"].as_array().unwrap();
        assert_eq!(fields[0]["type"], json!({"type": "array", "items": "float"}));
        assert_eq!(fields[1]["type"], json!({"type": "array", "items": "boolean"}));
        assert_eq!(fields[2]["type"], json!({"type": "array", "items": "int"}));
    }

    #[test]
    fn test_jagged_schema_nests_per_dimension() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Sample", 32)
                .with_field(FieldDescriptor::new("n", 8, "int"))
                .with_field(FieldDescriptor::new("x", 16, "float").with_shape("x[n][4]")),
        );
        let tree = WalkerTree::build(&dict, "Sample").unwrap();

        let schema = tree.emit_schema().unwrap();
        assert_eq!(
            schema["fields"][1]["type"],
            json!({"type": "array", "items": {"type": "array", "items": "float"}})
        );
    }

    #[test]
    fn test_unresolved_tree_has_no_schema() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Event", 24)
                .with_field(FieldDescriptor::new("tracks", 8, "ObjectArray")),
        );
        let tree = WalkerTree::build(&dict, "Event").unwrap();
        assert!(matches!(
            tree.emit_schema().unwrap_err(),
            WalkError::UnresolvedPolymorphicType { .. }
        ));
    }
}
