//! Bounds-checked memory image
//!
//! Replaces raw pointer arithmetic over opaque byte ranges with validated
//! slice views: every read checks `addr + len` against the image length
//! and fails with a typed error instead of undefined behavior. Addresses
//! are plain offsets into the image; address 0 is reserved as the null
//! address so pointer fields can use it as their absent value.

use crate::errors::{Result, WalkError};
use std::collections::HashMap;

/// Offset into a [`MemoryImage`]. 0 is the null address.
pub type Address = u64;

/// Owned byte store with class tags for run-time class lookup.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    bytes: Vec<u8>,
    classes: HashMap<Address, String>,
}

impl MemoryImage {
    /// Create an empty image. The first 8 bytes are reserved so that no
    /// allocation ever lands on the null address.
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; 8],
            classes: HashMap::new(),
        }
    }

    /// Total image length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append `data` and return its address
    pub fn alloc(&mut self, data: &[u8]) -> Address {
        let addr = self.bytes.len() as Address;
        self.bytes.extend_from_slice(data);
        addr
    }

    /// Append `len` zero bytes and return their address
    pub fn alloc_zeroed(&mut self, len: usize) -> Address {
        let addr = self.bytes.len() as Address;
        self.bytes.resize(self.bytes.len() + len, 0);
        addr
    }

    /// Overwrite bytes at `addr`
    pub fn write(&mut self, addr: Address, data: &[u8]) -> Result<()> {
        let start = self.checked_range(addr, data.len())?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Borrow `len` bytes at `addr`
    pub fn read(&self, addr: Address, len: usize) -> Result<&[u8]> {
        let start = self.checked_range(addr, len)?;
        Ok(&self.bytes[start..start + len])
    }

    /// Read a little-endian u64 at `addr`
    pub fn read_u64(&self, addr: Address) -> Result<u64> {
        let raw = self.read(addr, 8)?;
        Ok(u64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ]))
    }

    /// Read a little-endian u32 at `addr`
    pub fn read_u32(&self, addr: Address) -> Result<u32> {
        let raw = self.read(addr, 4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Tag the object at `addr` with its run-time class name
    pub fn tag_class(&mut self, addr: Address, class: &str) {
        self.classes.insert(addr, class.to_string());
    }

    /// Run-time class of the object at `addr`, if tagged
    pub fn class_of(&self, addr: Address) -> Option<&str> {
        self.classes.get(&addr).map(|s| s.as_str())
    }

    fn checked_range(&self, addr: Address, len: usize) -> Result<usize> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start),
            _ => Err(WalkError::OutOfBounds {
                addr,
                len,
                size: self.bytes.len(),
            }),
        }
    }
}
