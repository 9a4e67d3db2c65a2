//! Field and type descriptors supplied by the reflective service
//!
//! A [`TypeDescriptor`] is the external input the walker is built from:
//! the declared name, the instance byte size, and the ordered field list
//! with offsets and declared type names. The [`TypeProvider`] trait is the
//! boundary to the type-description service; [`DictionaryProvider`] is an
//! in-memory implementation used by tests and embedding tools.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One field of a composite type, as described by the reflective service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Byte offset within the owning composite. Non-positive offsets mark
    /// synthetic entries and are dropped at tree-build time.
    pub offset: i64,
    pub type_name: String,
    /// Declared fixed array dimensions, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub array_dims: Vec<usize>,
    /// Free-text shape annotation, e.g. `"x[n][4]"` for a jagged leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
}

impl FieldDescriptor {
    /// Create a plain field descriptor with no dims and no shape
    pub fn new(name: &str, offset: i64, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            offset,
            type_name: type_name.to_string(),
            array_dims: Vec::new(),
            shape: None,
        }
    }

    /// Attach declared fixed array dimensions, outermost first
    pub fn with_dims(mut self, dims: &[usize]) -> Self {
        self.array_dims = dims.to_vec();
        self
    }

    /// Attach a shape annotation
    pub fn with_shape(mut self, shape: &str) -> Self {
        self.shape = Some(shape.to_string());
        self
    }
}

/// Externally supplied description of one composite type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub byte_size: usize,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: &str, byte_size: usize) -> Self {
        Self {
            name: name.to_string(),
            byte_size,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// Boundary to the reflective type-description service.
pub trait TypeProvider {
    /// Descriptor for a composite type, or `None` when the service has
    /// nothing under that name.
    fn describe(&self, type_name: &str) -> Option<&TypeDescriptor>;

    /// Instance byte size of a composite type.
    fn byte_size(&self, type_name: &str) -> Option<usize> {
        self.describe(type_name).map(|d| d.byte_size)
    }
}

/// In-memory type dictionary, serde-loadable so a whole dictionary can be
/// captured to JSON and replayed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryProvider {
    pub types: Vec<TypeDescriptor>,

    // Name lookup map, rebuilt after deserialization (not serialized)
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl DictionaryProvider {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor and return its index.
    /// Re-adding a name replaces the previous descriptor.
    pub fn add_type(&mut self, descriptor: TypeDescriptor) -> usize {
        if let Some(&i) = self.index.get(&descriptor.name) {
            tracing::debug!("replacing descriptor for {}", descriptor.name);
            self.types[i] = descriptor;
            return i;
        }
        let i = self.types.len();
        self.index.insert(descriptor.name.clone(), i);
        self.types.push(descriptor);
        i
    }

    /// Number of registered types
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Rebuild the name lookup map after deserialization
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, d) in self.types.iter().enumerate() {
            self.index.insert(d.name.clone(), i);
        }
    }
}

impl TypeProvider for DictionaryProvider {
    fn describe(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.index.get(type_name).map(|&i| &self.types[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_descriptor() -> TypeDescriptor {
        TypeDescriptor::new("Point", 16)
            .with_field(FieldDescriptor::new("x", 1, "double"))
            .with_field(FieldDescriptor::new("y", 9, "double"))
    }

    #[test]
    fn test_dictionary_lookup() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(point_descriptor());

        let d = dict.describe("Point").unwrap();
        assert_eq!(d.byte_size, 16);
        assert_eq!(d.fields.len(), 2);
        assert_eq!(dict.byte_size("Point"), Some(16));
        assert!(dict.describe("Missing").is_none());
    }

    #[test]
    fn test_readd_replaces() {
        let mut dict = DictionaryProvider::new();
        let i1 = dict.add_type(point_descriptor());
        let i2 = dict.add_type(TypeDescriptor::new("Point", 24));
        assert_eq!(i1, i2);
        assert_eq!(dict.type_count(), 1);
        assert_eq!(dict.byte_size("Point"), Some(24));
    }

    #[test]
    fn test_serialization() {
        let mut dict = DictionaryProvider::new();
        dict.add_type(point_descriptor());

        let serialized = serde_json::to_string(&dict).unwrap();
        let mut deserialized: DictionaryProvider = serde_json::from_str(&serialized).unwrap();

        // Lookup map is not serialized and must be rebuilt
        deserialized.rebuild_index();

        assert_eq!(deserialized.describe("Point"), dict.describe("Point"));
    }
}
