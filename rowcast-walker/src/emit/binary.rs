//! Binary value encoding
//!
//! Drives an external schema-tagged binary sink with one value per
//! record, conforming to the document produced by schema emission: record
//! fields in declaration order, sequences as length-prefixed arrays, and
//! pointers as a two-branch union (branch 0 = null, branch 1 = value).
//! The concrete wire bytes belong to the sink, not to this walk.

use crate::emit::{
    self, counter_value, field_location, poly_storage, read_scalar, render_text,
    sequence_storage, ReadCtx, ScalarValue, Scope, MAX_DEPTH,
};
use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::source::CursorMap;
use crate::walker::{jagged_element_offset, PolyState, Walker, WalkerKind, WalkerTree};
use rowcast_model::ScalarKind;

/// External binary value sink.
///
/// The walker promises calls that match the emitted schema; the sink owns
/// the wire format.
pub trait BinarySink {
    fn null(&mut self) -> Result<()>;
    fn boolean(&mut self, v: bool) -> Result<()>;
    fn int(&mut self, v: i32) -> Result<()>;
    fn long(&mut self, v: i64) -> Result<()>;
    fn float(&mut self, v: f32) -> Result<()>;
    fn double(&mut self, v: f64) -> Result<()>;
    fn text(&mut self, v: &str) -> Result<()>;
    fn begin_array(&mut self, len: usize) -> Result<()>;
    fn end_array(&mut self) -> Result<()>;
    /// Union branch marker: 0 = null, 1 = value for pointer fields.
    fn branch(&mut self, index: u32) -> Result<()>;
}

/// Byte-buffer sink with a small tagged little-endian framing, used by
/// tests and same-process consumers.
#[derive(Debug, Default)]
pub struct BufferSink {
    pub bytes: Vec<u8>,
}

mod tag {
    pub const NULL: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const INT: u8 = 0x02;
    pub const LONG: u8 = 0x03;
    pub const FLOAT: u8 = 0x04;
    pub const DOUBLE: u8 = 0x05;
    pub const TEXT: u8 = 0x06;
    pub const ARRAY_BEGIN: u8 = 0x10;
    pub const ARRAY_END: u8 = 0x11;
    pub const BRANCH: u8 = 0x12;
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl BinarySink for BufferSink {
    fn null(&mut self) -> Result<()> {
        self.bytes.push(tag::NULL);
        Ok(())
    }

    fn boolean(&mut self, v: bool) -> Result<()> {
        self.bytes.push(tag::BOOLEAN);
        self.bytes.push(v as u8);
        Ok(())
    }

    fn int(&mut self, v: i32) -> Result<()> {
        self.bytes.push(tag::INT);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn long(&mut self, v: i64) -> Result<()> {
        self.bytes.push(tag::LONG);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn float(&mut self, v: f32) -> Result<()> {
        self.bytes.push(tag::FLOAT);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn double(&mut self, v: f64) -> Result<()> {
        self.bytes.push(tag::DOUBLE);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        Ok(())
    }

    fn text(&mut self, v: &str) -> Result<()> {
        self.bytes.push(tag::TEXT);
        self.bytes
            .extend_from_slice(&(v.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(v.as_bytes());
        Ok(())
    }

    fn begin_array(&mut self, len: usize) -> Result<()> {
        self.bytes.push(tag::ARRAY_BEGIN);
        self.bytes.extend_from_slice(&(len as u32).to_le_bytes());
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.bytes.push(tag::ARRAY_END);
        Ok(())
    }

    fn branch(&mut self, index: u32) -> Result<()> {
        self.bytes.push(tag::BRANCH);
        self.bytes.extend_from_slice(&index.to_le_bytes());
        Ok(())
    }
}

impl WalkerTree {
    /// Encode one record into a binary sink.
    pub fn emit_binary(
        &self,
        mem: &MemoryImage,
        record_addr: Address,
        sink: &mut dyn BinarySink,
    ) -> Result<()> {
        self.emit_binary_bound(mem, record_addr, None, sink)
    }

    pub(crate) fn emit_binary_bound(
        &self,
        mem: &MemoryImage,
        record_addr: Address,
        cursors: Option<&CursorMap>,
        sink: &mut dyn BinarySink,
    ) -> Result<()> {
        self.require_resolved()?;
        let ctx = ReadCtx { mem, cursors };
        sink_record(self, &ctx, self.root_id(), record_addr, true, 0, sink)
    }
}

fn sink_record(
    tree: &WalkerTree,
    ctx: &ReadCtx<'_>,
    id: usize,
    base: Address,
    top: bool,
    depth: usize,
    sink: &mut dyn BinarySink,
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
        sink_walker(tree, ctx, &scope, &field.walker, addr, declared_len, depth + 1, sink)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sink_walker(
    tree: &WalkerTree,
    ctx: &ReadCtx<'_>,
    scope: &Scope<'_>,
    walker: &Walker,
    addr: Address,
    declared_len: Option<usize>,
    depth: usize,
    sink: &mut dyn BinarySink,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(WalkError::DepthExceeded {
            field: walker.field_name.clone(),
        });
    }
    match &walker.kind {
        WalkerKind::Scalar(kind) => sink_scalar(read_scalar(ctx.mem, addr, *kind)?, sink),
        WalkerKind::CharText { .. } | WalkerKind::OwnedText | WalkerKind::LibText => {
            sink.text(&render_text(ctx.mem, walker, addr)?)
        }
        WalkerKind::Pointer { inner } => {
            let target = ctx.mem.read_u64(addr)?;
            if target == 0 {
                sink.branch(0)?;
                sink.null()
            } else {
                sink.branch(1)?;
                sink_walker(tree, ctx, scope, inner, target, None, depth + 1, sink)
            }
        }
        WalkerKind::WeakRef => sink.null(),
        WalkerKind::FixedArray { len, element } => {
            sink.begin_array(*len)?;
            for i in 0..*len {
                let elem_addr = addr + (i * element.byte_size) as u64;
                sink_walker(tree, ctx, scope, element, elem_addr, None, depth + 1, sink)?;
            }
            sink.end_array()
        }
        WalkerKind::DynSequence { element } => {
            let (data, byte_len) = sequence_storage(ctx.mem, addr, declared_len)?;
            let count = if element.byte_size == 0 {
                0
            } else {
                byte_len / element.byte_size
            };
            sink.begin_array(count)?;
            for i in 0..count {
                let elem_addr = data + (i * element.byte_size) as u64;
                sink_walker(tree, ctx, scope, element, elem_addr, None, depth + 1, sink)?;
            }
            sink.end_array()
        }
        WalkerKind::BitSequence => {
            let (data, bit_len) = sequence_storage(ctx.mem, addr, declared_len)?;
            let bit_len = match declared_len {
                Some(bytes) => bit_len.min(bytes * 8),
                None => bit_len,
            };
            let storage = ctx.mem.read(data, bit_len.div_ceil(8))?;
            sink.begin_array(bit_len)?;
            for i in 0..bit_len {
                sink.boolean(emit::bit_at(storage, i))?;
            }
            sink.end_array()
        }
        WalkerKind::PolySequence { slot } => {
            let PolyState::Resolved(id) = tree.poly_state(*slot) else {
                return Err(WalkError::UnresolvedPolymorphicType {
                    field: walker.field_name.clone(),
                });
            };
            let (data, count) = poly_storage(ctx.mem, addr, declared_len)?;
            let expected = tree.node(id).type_name.clone();
            sink.begin_array(count)?;
            for i in 0..count {
                let elem = ctx.mem.read_u64(data + (i * 8) as u64)?;
                emit::expect_class(ctx.mem, elem, &expected, &walker.field_name)?;
                sink_record(tree, ctx, id, elem, false, depth + 1, sink)?;
            }
            sink.end_array()
        }
        WalkerKind::Record(id) => sink_record(tree, ctx, *id, addr, false, depth + 1, sink),
        WalkerKind::JaggedLeaf { element, dims } => {
            let sizes = dims.sizes(|name| counter_value(ctx, scope, name))?;
            if sizes.is_empty() {
                sink.begin_array(0)?;
                return sink.end_array();
            }
            let flat: usize = sizes.iter().product();
            let (data, avail) = sequence_storage(ctx.mem, addr, declared_len)?;
            let mut next = 0usize;
            sink_jagged_dim(ctx.mem, *element, &sizes, 0, data, avail, flat, &mut next, sink)
        }
    }
}

fn sink_scalar(value: ScalarValue, sink: &mut dyn BinarySink) -> Result<()> {
    match value {
        ScalarValue::Boolean(v) => sink.boolean(v),
        ScalarValue::Int(v) => sink.int(v),
        ScalarValue::Long(v) => sink.long(v),
        // The widest carrier is signed; the bit pattern is preserved
        ScalarValue::Unsigned(v) => sink.long(v as i64),
        ScalarValue::Float(v) => sink.float(v),
        ScalarValue::Double(v) => sink.double(v),
    }
}

#[allow(clippy::too_many_arguments)]
fn sink_jagged_dim(
    mem: &MemoryImage,
    element: ScalarKind,
    sizes: &[usize],
    level: usize,
    data: Address,
    avail: usize,
    flat: usize,
    next: &mut usize,
    sink: &mut dyn BinarySink,
) -> Result<()> {
    let elem_size = element.byte_size();
    sink.begin_array(sizes[level])?;
    for _ in 0..sizes[level] {
        if level + 1 < sizes.len() {
            sink_jagged_dim(mem, element, sizes, level + 1, data, avail, flat, next, sink)?;
        } else {
            let Ok(offset) = jagged_element_offset(*next, flat, elem_size, avail) else {
                break;
            };
            *next += 1;
            sink_scalar(read_scalar(mem, data + offset as u64, element)?, sink)?;
        }
    }
    sink.end_array()
}
