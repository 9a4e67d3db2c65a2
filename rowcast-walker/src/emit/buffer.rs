//! Raw-buffer copy
//!
//! Flattens one record's resolved values into caller-supplied memory for
//! zero-copy batch extraction: scalars and embedded buffers as their raw
//! little-endian bytes, variable-length kinds behind a `u64` count, and
//! pointers behind a one-byte presence tag. The copy is bounded; a buffer
//! that cannot hold the record yields `BufferTooSmall` and no partial
//! write is reported as success.

use crate::emit::{
    self, counter_value, field_location, poly_storage, sequence_storage, ReadCtx, Scope,
    MAX_DEPTH,
};
use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::source::CursorMap;
use crate::walker::{jagged_element_offset, PolyState, Walker, WalkerKind, WalkerTree};

/// Bounded write position over the caller's buffer.
struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl BoundedWriter<'_> {
    fn push(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            return Err(WalkError::BufferTooSmall {
                needed: end,
                available: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    fn push_count(&mut self, count: usize) -> Result<()> {
        self.push(&(count as u64).to_le_bytes())
    }
}

impl WalkerTree {
    /// Copy one record's resolved values into `buf`, returning the number
    /// of bytes written.
    pub fn copy_to_buffer(
        &self,
        mem: &MemoryImage,
        record_addr: Address,
        buf: &mut [u8],
    ) -> Result<usize> {
        self.copy_to_buffer_bound(mem, record_addr, None, buf)
    }

    pub(crate) fn copy_to_buffer_bound(
        &self,
        mem: &MemoryImage,
        record_addr: Address,
        cursors: Option<&CursorMap>,
        buf: &mut [u8],
    ) -> Result<usize> {
        self.require_resolved()?;
        let ctx = ReadCtx { mem, cursors };
        let mut writer = BoundedWriter { buf, pos: 0 };
        copy_record(self, &ctx, self.root_id(), record_addr, true, 0, &mut writer)?;
        Ok(writer.pos)
    }
}

fn copy_record(
    tree: &WalkerTree,
    ctx: &ReadCtx<'_>,
    id: usize,
    base: Address,
    top: bool,
    depth: usize,
    out: &mut BoundedWriter<'_>,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(WalkError::DepthExceeded {
            field: tree.node(id).type_name.clone(),
        });
    }
    let node = tree.node(id);
    let scope = Scope { node, base, top };
    for field in &node.fields {
        let (addr, declared_len) = field_location(ctx, &scope, field);
        copy_walker(tree, ctx, &scope, &field.walker, addr, declared_len, depth + 1, out)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn copy_walker(
    tree: &WalkerTree,
    ctx: &ReadCtx<'_>,
    scope: &Scope<'_>,
    walker: &Walker,
    addr: Address,
    declared_len: Option<usize>,
    depth: usize,
    out: &mut BoundedWriter<'_>,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(WalkError::DepthExceeded {
            field: walker.field_name.clone(),
        });
    }
    match &walker.kind {
        WalkerKind::Scalar(kind) => out.push(ctx.mem.read(addr, kind.byte_size())?),
        WalkerKind::CharText { capacity } => out.push(ctx.mem.read(addr, *capacity)?),
        WalkerKind::OwnedText | WalkerKind::LibText => {
            let text = emit::render_text(ctx.mem, walker, addr)?;
            out.push_count(text.len())?;
            out.push(text.as_bytes())
        }
        WalkerKind::Pointer { inner } => {
            let target = ctx.mem.read_u64(addr)?;
            if target == 0 {
                out.push(&[0u8])
            } else {
                out.push(&[1u8])?;
                copy_walker(tree, ctx, scope, inner, target, None, depth + 1, out)
            }
        }
        WalkerKind::WeakRef => Ok(()),
        WalkerKind::FixedArray { len, element } => {
            for i in 0..*len {
                let elem_addr = addr + (i * element.byte_size) as u64;
                copy_walker(tree, ctx, scope, element, elem_addr, None, depth + 1, out)?;
            }
            Ok(())
        }
        WalkerKind::DynSequence { element } => {
            let (data, byte_len) = sequence_storage(ctx.mem, addr, declared_len)?;
            let count = if element.byte_size == 0 {
                0
            } else {
                byte_len / element.byte_size
            };
            out.push_count(count)?;
            for i in 0..count {
                let elem_addr = data + (i * element.byte_size) as u64;
                copy_walker(tree, ctx, scope, element, elem_addr, None, depth + 1, out)?;
            }
            Ok(())
        }
        WalkerKind::BitSequence => {
            let (data, bit_len) = sequence_storage(ctx.mem, addr, declared_len)?;
            let bit_len = match declared_len {
                Some(bytes) => bit_len.min(bytes * 8),
                None => bit_len,
            };
            let storage = ctx.mem.read(data, bit_len.div_ceil(8))?;
            out.push_count(bit_len)?;
            for i in 0..bit_len {
                out.push(&[emit::bit_at(storage, i) as u8])?;
            }
            Ok(())
        }
        WalkerKind::PolySequence { slot } => {
            let PolyState::Resolved(id) = tree.poly_state(*slot) else {
                return Err(WalkError::UnresolvedPolymorphicType {
                    field: walker.field_name.clone(),
                });
            };
            let (data, count) = poly_storage(ctx.mem, addr, declared_len)?;
            let expected = tree.node(id).type_name.clone();
            out.push_count(count)?;
            for i in 0..count {
                let elem = ctx.mem.read_u64(data + (i * 8) as u64)?;
                emit::expect_class(ctx.mem, elem, &expected, &walker.field_name)?;
                copy_record(tree, ctx, id, elem, false, depth + 1, out)?;
            }
            Ok(())
        }
        WalkerKind::Record(id) => copy_record(tree, ctx, *id, addr, false, depth + 1, out),
        WalkerKind::JaggedLeaf { element, dims } => {
            let sizes = dims.sizes(|name| counter_value(ctx, scope, name))?;
            if sizes.is_empty() {
                return out.push_count(0);
            }
            let flat: usize = sizes.iter().product();
            let (data, avail) = sequence_storage(ctx.mem, addr, declared_len)?;
            let elem_size = element.byte_size();
            let mut written = 0usize;
            // Count first, then the elements that survive the bound check
            let avail_count = flat.min(avail / elem_size.max(1));
            out.push_count(avail_count)?;
            for i in 0..flat {
                let Ok(offset) = jagged_element_offset(i, flat, elem_size, avail) else {
                    break;
                };
                out.push(ctx.mem.read(data + offset as u64, elem_size)?)?;
                written += 1;
            }
            debug_assert_eq!(written, avail_count);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcast_model::{DictionaryProvider, FieldDescriptor, TypeDescriptor};

    fn row_fixture() -> (WalkerTree, MemoryImage, Address) {
        let mut dict = DictionaryProvider::new();
        dict.add_type(
            TypeDescriptor::new("Row", 40)
                .with_field(FieldDescriptor::new("id", 8, "int"))
                .with_field(FieldDescriptor::new("label", 12, "char").with_dims(&[8]))
                .with_field(FieldDescriptor::new("samples", 24, "vector<short>")),
        );
        let tree = WalkerTree::build(&dict, "Row").unwrap();

        let mut mem = MemoryImage::new();
        let mut data = Vec::new();
        for v in [100i16, 200] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let data_addr = mem.alloc(&data);
        let record = mem.alloc_zeroed(40);
        mem.write(record + 8, &7i32.to_le_bytes()).unwrap();
        mem.write(record + 12, b"abc\0").unwrap();
        mem.write(record + 24, &data_addr.to_le_bytes()).unwrap();
        mem.write(record + 32, &4u64.to_le_bytes()).unwrap();
        (tree, mem, record)
    }

    #[test]
    fn test_copy_layout_and_length() {
        let (tree, mem, record) = row_fixture();
        let mut buf = vec![0u8; 64];
        let written = tree.copy_to_buffer(&mem, record, &mut buf).unwrap();

        // id(4) + label(8) + count(8) + 2 shorts(4)
        assert_eq!(written, 24);
        assert_eq!(&buf[0..4], &7i32.to_le_bytes());
        assert_eq!(&buf[4..8], b"abc\0");
        assert_eq!(&buf[12..20], &2u64.to_le_bytes());
        assert_eq!(&buf[20..22], &100i16.to_le_bytes());
    }

    #[test]
    fn test_buffer_too_small_is_typed() {
        let (tree, mem, record) = row_fixture();
        let mut buf = vec![0u8; 10];
        let err = tree.copy_to_buffer(&mem, record, &mut buf).unwrap_err();
        match err {
            WalkError::BufferTooSmall { available, .. } => assert_eq!(available, 10),
            other => panic!("expected BufferTooSmall, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_fit_succeeds() {
        let (tree, mem, record) = row_fixture();
        let mut buf = vec![0u8; 24];
        assert_eq!(tree.copy_to_buffer(&mem, record, &mut buf).unwrap(), 24);
    }
}
