//! Sequence element addressing
//!
//! The four sequence variants share one external contract: a length and
//! an element accessor. Fixed arrays lay elements out at
//! `base + index * element_size`, dynamic sequences carry their own byte
//! length, polymorphic sequences store a table of object addresses, and
//! bit-packed sequences have no addressable elements at all; their values
//! are materialized one bit at a time.

use crate::emit::{bit_at, out_of_line};
use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::walker::{Walker, WalkerKind, WalkerTree};

impl WalkerTree {
    /// Element count of a sequence-kind walker whose inline data sits at
    /// `addr`.
    pub fn sequence_length(
        &self,
        mem: &MemoryImage,
        walker: &Walker,
        addr: Address,
    ) -> Result<usize> {
        match &walker.kind {
            WalkerKind::FixedArray { len, .. } => Ok(*len),
            WalkerKind::DynSequence { element } => {
                let (_, byte_len) = out_of_line(mem, addr)?;
                if element.byte_size == 0 {
                    Ok(0)
                } else {
                    Ok(byte_len / element.byte_size)
                }
            }
            WalkerKind::BitSequence => {
                let (_, bit_len) = out_of_line(mem, addr)?;
                Ok(bit_len)
            }
            WalkerKind::PolySequence { .. } => {
                let (_, count) = out_of_line(mem, addr)?;
                Ok(count)
            }
            _ => Err(WalkError::UnsupportedType {
                name: walker.type_name.clone(),
            }),
        }
    }

    /// Address of one element. Refuses indexes at or past the current
    /// length. Bit-packed sequences have no addressable elements; use
    /// [`WalkerTree::bit_element`] for those.
    pub fn element_address(
        &self,
        mem: &MemoryImage,
        walker: &Walker,
        addr: Address,
        index: usize,
    ) -> Result<Address> {
        let len = self.sequence_length(mem, walker, addr)?;
        if index >= len {
            return Err(WalkError::OutOfBounds {
                addr,
                len: index,
                size: len,
            });
        }
        match &walker.kind {
            WalkerKind::FixedArray { element, .. } => {
                Ok(addr + (index * element.byte_size) as u64)
            }
            WalkerKind::DynSequence { element } => {
                let (data, _) = out_of_line(mem, addr)?;
                Ok(data + (index * element.byte_size) as u64)
            }
            WalkerKind::PolySequence { .. } => {
                let (data, _) = out_of_line(mem, addr)?;
                mem.read_u64(data + (index * 8) as u64)
            }
            _ => Err(WalkError::UnsupportedType {
                name: walker.type_name.clone(),
            }),
        }
    }

    /// Materialize one boolean of a bit-packed sequence. No reference
    /// into packed storage exists, so the value is returned by copy.
    pub fn bit_element(
        &self,
        mem: &MemoryImage,
        walker: &Walker,
        addr: Address,
        index: usize,
    ) -> Result<bool> {
        if !matches!(walker.kind, WalkerKind::BitSequence) {
            return Err(WalkError::UnsupportedType {
                name: walker.type_name.clone(),
            });
        }
        let (data, bit_len) = out_of_line(mem, addr)?;
        if index >= bit_len {
            return Err(WalkError::OutOfBounds {
                addr,
                len: index,
                size: bit_len,
            });
        }
        let storage = mem.read(data, bit_len.div_ceil(8))?;
        Ok(bit_at(storage, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcast_model::{DictionaryProvider, FieldDescriptor, TypeDescriptor};

    fn seq_fixture() -> (WalkerTree, MemoryImage, Address) {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Row", 56)
                .with_field(FieldDescriptor::new("grid", 8, "int").with_dims(&[4]))
                .with_field(FieldDescriptor::new("samples", 24, "vector<short>"))
                .with_field(FieldDescriptor::new("hits", 40, "vector<bool>")),
        );
        let tree = WalkerTree::build(&dict, "Row").unwrap();

        let mut mem = MemoryImage::new();
        let mut raw = Vec::new();
        for v in [3i16, 5, 7] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let sdata = mem.alloc(&raw);
        let bdata = mem.alloc(&[0b0000_0110u8]);

        let record = mem.alloc_zeroed(56);
        for (i, v) in [10i32, 20, 30, 40].iter().enumerate() {
            mem.write(record + 8 + 4 * i as u64, &v.to_le_bytes()).unwrap();
        }
        mem.write(record + 24, &sdata.to_le_bytes()).unwrap();
        mem.write(record + 32, &6u64.to_le_bytes()).unwrap();
        mem.write(record + 40, &bdata.to_le_bytes()).unwrap();
        mem.write(record + 48, &3u64.to_le_bytes()).unwrap();
        (tree, mem, record)
    }

    #[test]
    fn test_fixed_array_addressing() {
        let (tree, mem, record) = seq_fixture();
        let grid = &tree.root_node().fields[0].walker;
        assert_eq!(tree.sequence_length(&mem, grid, record + 8).unwrap(), 4);
        let third = tree.element_address(&mem, grid, record + 8, 2).unwrap();
        assert_eq!(mem.read(third, 4).unwrap(), &30i32.to_le_bytes());
    }

    #[test]
    fn test_dynamic_sequence_addressing() {
        let (tree, mem, record) = seq_fixture();
        let samples = &tree.root_node().fields[1].walker;
        assert_eq!(tree.sequence_length(&mem, samples, record + 24).unwrap(), 3);
        let second = tree.element_address(&mem, samples, record + 24, 1).unwrap();
        assert_eq!(mem.read(second, 2).unwrap(), &5i16.to_le_bytes());
    }

    #[test]
    fn test_bit_elements_are_materialized() {
        let (tree, mem, record) = seq_fixture();
        let hits = &tree.root_node().fields[2].walker;
        assert_eq!(tree.sequence_length(&mem, hits, record + 40).unwrap(), 3);
        assert!(!tree.bit_element(&mem, hits, record + 40, 0).unwrap());
        assert!(tree.bit_element(&mem, hits, record + 40, 1).unwrap());
        assert!(tree.bit_element(&mem, hits, record + 40, 2).unwrap());
        assert!(tree.bit_element(&mem, hits, record + 40, 3).is_err());
    }

    #[test]
    fn test_index_past_length_refused() {
        let (tree, mem, record) = seq_fixture();
        let grid = &tree.root_node().fields[0].walker;
        assert!(matches!(
            tree.element_address(&mem, grid, record + 8, 4),
            Err(WalkError::OutOfBounds { .. })
        ));
    }
}
