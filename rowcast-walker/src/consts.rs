//! Fixed layout constants
//!
//! Inline layouts are defined for a 64-bit little-endian image; every
//! variable-length kind stores a fixed-size header inside its owning
//! composite and points at out-of-line storage.

/// Width of a stored address
pub const POINTER_SIZE: usize = 8;

/// Inline header of an owned text object: `{data_ptr: u64, byte_len: u64}`
pub const OWNED_TEXT_HEADER_SIZE: usize = 16;

/// Inline size of a library text object: a single pointer to its block
pub const LIB_TEXT_SIZE: usize = POINTER_SIZE;

/// Length prefix of a library text block: `u32` byte count
pub const LIB_TEXT_PREFIX_SIZE: usize = 4;

/// Inline header of a dynamic sequence: `{data_ptr: u64, byte_len: u64}`
pub const SEQ_HEADER_SIZE: usize = 16;

/// Inline header of a bit-packed sequence: `{data_ptr: u64, bit_len: u64}`
pub const BIT_SEQ_HEADER_SIZE: usize = 16;

/// Inline header of a polymorphic sequence: `{data_ptr: u64, count: u64}`
pub const POLY_HEADER_SIZE: usize = 16;
