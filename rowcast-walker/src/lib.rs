//! Rowcast Walker Library
//!
//! Converts records whose layout is discovered at run time into four
//! representations: a self-describing textual encoding, a schema-tagged
//! binary encoding, a schema document, and a raw fixed-layout byte
//! buffer. The core is a walker tree built from a reflective type
//! description, with memoized composite nodes, lazily resolved
//! polymorphic sequences, and per-record dimension chains.

// Core modules
pub mod consts;
pub mod emit;
pub mod errors;
pub mod memory;
pub mod source;
pub mod walker;

pub use errors::{Result, WalkError};

pub use memory::{Address, MemoryImage};

pub use walker::{
    DimChain, Field, NodeId, PolyState, RecordNode, Walker, WalkerKind, WalkerTree,
};

pub use emit::binary::{BinarySink, BufferSink};

pub use source::{CursorMap, FieldCursor, MemorySource, RecordSource, RecordStream};

// Re-export the model crate's surface the way callers consume it
pub use rowcast_model as model;
pub use rowcast_model::{
    DictionaryProvider, DimSpec, FieldDescriptor, ScalarKind, TypeDescriptor, TypeProvider,
};
