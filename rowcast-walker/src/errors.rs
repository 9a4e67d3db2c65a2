//! Error types for the walker library

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    #[error("unsupported type: {name}")]
    UnsupportedType { name: String },
    #[error("recursive type not supported: {name}")]
    RecursiveTypeNotSupported { name: String },
    #[error("polymorphic sequence '{field}' has not been resolved")]
    UnresolvedPolymorphicType { field: String },
    #[error("inconsistent element class in '{field}': expected {expected}, found {found}")]
    InconsistentElementClass {
        field: String,
        expected: String,
        found: String,
    },
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("out of bounds read: {addr:#x}+{len} exceeds image of {size} bytes")]
    OutOfBounds { addr: u64, len: usize, size: usize },
    #[error("counter field '{name}' not found among sibling leaves")]
    MissingCounter { name: String },
    #[error("maximum walk depth exceeded at '{field}'")]
    DepthExceeded { field: String },
    #[error("record source error: {0}")]
    Source(#[from] anyhow::Error),
}

/// Result type used throughout the library.
///
/// The error is the typed [`WalkError`] rather than an opaque one because
/// callers match on recoverable variants such as `BufferTooSmall` and
/// `UnresolvedPolymorphicType`.
pub type Result<T> = std::result::Result<T, WalkError>;
