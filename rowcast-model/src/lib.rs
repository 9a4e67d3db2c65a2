//! Rowcast Model Library
//!
//! Data model for run-time type descriptions: scalar kinds, declared
//! type-name parsing, and the field/type descriptors handed out by a
//! reflective type-description service.

pub mod descriptor;
pub mod scalar;
pub mod type_name;

pub use descriptor::{DictionaryProvider, FieldDescriptor, TypeDescriptor, TypeProvider};

pub use scalar::{Carrier, ScalarKind};

pub use type_name::{parse_shape, parse_type_name, DimSpec, ParsedTypeName};
