//! Emission strategies
//!
//! Four independent traversal strategies over one walker tree, sharing a
//! single recursive-descent contract and the read helpers in this module:
//! the debug description, the schema document, the textual value
//! encoding, the binary value encoding, and the raw-buffer copy. None of
//! them mutates the tree; resolution happens before emission.

pub mod binary;
pub mod buffer;
pub mod debug;
pub mod schema;
pub mod text;

use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::source::CursorMap;
use crate::walker::{Field, RecordNode, Walker, WalkerKind, WalkerTree};
use rowcast_model::ScalarKind;
use std::borrow::Cow;

/// Walk depth cap. Record data is expected to be acyclic; a pointer loop
/// in the data would otherwise recurse without bound.
pub(crate) const MAX_DEPTH: usize = 64;

/// Read context for one emission call.
#[derive(Clone, Copy)]
pub(crate) struct ReadCtx<'a> {
    pub mem: &'a MemoryImage,
    /// Per-record field cursors, present when emitting through a record
    /// source; `None` for plain in-memory records.
    pub cursors: Option<&'a CursorMap>,
}

/// The composite a field is being read out of: its node, the record base
/// address, and whether it is the top-level record of a source-bound walk
/// (only top-level fields have cursors).
#[derive(Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub node: &'a RecordNode,
    pub base: Address,
    pub top: bool,
}

/// Where a field's data lives: its address, plus the declared byte length
/// when a cursor points directly at out-of-line storage.
pub(crate) fn field_location(
    ctx: &ReadCtx<'_>,
    scope: &Scope<'_>,
    field: &Field,
) -> (Address, Option<usize>) {
    if scope.top {
        if let Some(cursors) = ctx.cursors {
            if let Some(cursor) = cursors.get(&field.walker.field_name) {
                return (cursor.addr, Some(cursor.byte_len));
            }
        }
    }
    (scope.base + field.offset as u64, None)
}

/// A scalar widened to its encoder carrier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ScalarValue {
    Boolean(bool),
    Int(i32),
    Long(i64),
    /// u64 keeps its exact value for the text encoding; the binary
    /// carrier reinterprets the bit pattern as a signed 64-bit.
    Unsigned(u64),
    Float(f32),
    Double(f64),
}

/// Read one scalar at `addr`, widening it per the carrier rules: unsigned
/// 32-bit values do not fit the 32-bit signed carrier and ride the 64-bit
/// one instead.
pub(crate) fn read_scalar(
    mem: &MemoryImage,
    addr: Address,
    kind: ScalarKind,
) -> Result<ScalarValue> {
    let raw = mem.read(addr, kind.byte_size())?;
    let value = match kind {
        ScalarKind::Bool => ScalarValue::Boolean(raw[0] != 0),
        ScalarKind::I8 => ScalarValue::Int(raw[0] as i8 as i32),
        ScalarKind::I16 => ScalarValue::Int(i16::from_le_bytes([raw[0], raw[1]]) as i32),
        ScalarKind::I32 => {
            ScalarValue::Int(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }
        ScalarKind::I64 => ScalarValue::Long(i64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ])),
        ScalarKind::U8 => ScalarValue::Int(raw[0] as i32),
        ScalarKind::U16 => ScalarValue::Int(u16::from_le_bytes([raw[0], raw[1]]) as i32),
        ScalarKind::U32 => {
            ScalarValue::Long(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64)
        }
        ScalarKind::U64 => ScalarValue::Unsigned(u64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ])),
        ScalarKind::F32 => {
            ScalarValue::Float(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        }
        ScalarKind::F64 => ScalarValue::Double(f64::from_le_bytes([
            raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
        ])),
    };
    Ok(value)
}

/// Current value of a sibling counter field within `scope`. Counters
/// drive jagged dimension sizes and must be integer leaves.
pub(crate) fn counter_value(ctx: &ReadCtx<'_>, scope: &Scope<'_>, name: &str) -> Result<i64> {
    let missing = || WalkError::MissingCounter {
        name: name.to_string(),
    };
    let field = scope
        .node
        .fields
        .iter()
        .find(|f| f.walker.field_name == name)
        .ok_or_else(&missing)?;
    let WalkerKind::Scalar(kind) = field.walker.kind else {
        return Err(missing());
    };
    let (addr, _) = field_location(ctx, scope, field);
    match read_scalar(ctx.mem, addr, kind)? {
        ScalarValue::Int(v) => Ok(v as i64),
        ScalarValue::Long(v) => Ok(v),
        ScalarValue::Unsigned(v) => Ok(v.min(i64::MAX as u64) as i64),
        _ => Err(missing()),
    }
}

/// Read an out-of-line header: `{data_ptr: u64, len: u64}`. Used by
/// dynamic, bit-packed, and polymorphic sequences, by owned text, and by
/// jagged leaves when no cursor overrides them.
pub(crate) fn out_of_line(mem: &MemoryImage, addr: Address) -> Result<(Address, usize)> {
    let ptr = mem.read_u64(addr)?;
    let len = mem.read_u64(addr + 8)?;
    Ok((ptr, len as usize))
}

/// Storage location of a sequence-like field: cursor-direct when a
/// declared length is present, header-indirect otherwise.
pub(crate) fn sequence_storage(
    mem: &MemoryImage,
    addr: Address,
    declared_len: Option<usize>,
) -> Result<(Address, usize)> {
    match declared_len {
        Some(len) => Ok((addr, len)),
        None => out_of_line(mem, addr),
    }
}

/// Render any of the three text representations as a borrowed string
/// slice. Text rendering never fails beyond a bounds error: an absent or
/// garbled terminator simply yields a shorter string.
pub(crate) fn render_text<'a>(
    mem: &'a MemoryImage,
    walker: &Walker,
    addr: Address,
) -> Result<Cow<'a, str>> {
    let bytes: &[u8] = match &walker.kind {
        WalkerKind::CharText { capacity } => {
            let raw = mem.read(addr, *capacity)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            &raw[..end]
        }
        WalkerKind::OwnedText => {
            let (ptr, len) = out_of_line(mem, addr)?;
            if ptr == 0 || len == 0 {
                return Ok(Cow::Borrowed(""));
            }
            mem.read(ptr, len)?
        }
        WalkerKind::LibText => {
            let block = mem.read_u64(addr)?;
            if block == 0 {
                return Ok(Cow::Borrowed(""));
            }
            let len = mem.read_u32(block)? as usize;
            mem.read(block + crate::consts::LIB_TEXT_PREFIX_SIZE as u64, len)?
        }
        other => unreachable!("render_text on non-text walker {other:?}"),
    };
    Ok(String::from_utf8_lossy(bytes))
}

/// One bit of a bit-packed sequence's storage.
pub(crate) fn bit_at(storage: &[u8], index: usize) -> bool {
    (storage[index / 8] >> (index % 8)) & 1 != 0
}

/// Element count and data address of a polymorphic sequence: the storage
/// is `count` object addresses.
pub(crate) fn poly_storage(
    mem: &MemoryImage,
    addr: Address,
    declared_len: Option<usize>,
) -> Result<(Address, usize)> {
    match declared_len {
        // A cursor carries the byte length of the address table
        Some(len) => Ok((addr, len / crate::consts::POINTER_SIZE)),
        None => out_of_line(mem, addr),
    }
}

/// Check one polymorphic element against the class fixed at resolution.
pub(crate) fn expect_class(
    mem: &MemoryImage,
    elem_addr: Address,
    expected: &str,
    field: &str,
) -> Result<()> {
    let found = if elem_addr == 0 {
        None
    } else {
        mem.class_of(elem_addr)
    };
    match found {
        Some(class) if class == expected => Ok(()),
        other => Err(WalkError::InconsistentElementClass {
            field: field.to_string(),
            expected: expected.to_string(),
            found: other.unwrap_or("<null>").to_string(),
        }),
    }
}

impl WalkerTree {
    /// Field name of the first polymorphic sequence still unresolved, in
    /// declaration order.
    pub fn first_unresolved(&self) -> Option<String> {
        fn scan(tree: &WalkerTree, walker: &Walker, seen: &mut Vec<usize>) -> Option<String> {
            match &walker.kind {
                WalkerKind::Pointer { inner }
                | WalkerKind::FixedArray { element: inner, .. }
                | WalkerKind::DynSequence { element: inner } => scan(tree, inner, seen),
                WalkerKind::PolySequence { slot } => match tree.poly_state(*slot) {
                    crate::walker::PolyState::Unresolved => Some(walker.field_name.clone()),
                    crate::walker::PolyState::Resolved(id) => scan_node(tree, id, seen),
                },
                WalkerKind::Record(id) => scan_node(tree, *id, seen),
                _ => None,
            }
        }
        fn scan_node(tree: &WalkerTree, id: usize, seen: &mut Vec<usize>) -> Option<String> {
            if seen.contains(&id) {
                return None;
            }
            seen.push(id);
            tree.nodes[id]
                .fields
                .iter()
                .find_map(|f| scan(tree, &f.walker, seen))
        }
        scan_node(self, self.root, &mut Vec::new())
    }

    /// Refuse emission while any polymorphic sequence is unresolved.
    pub(crate) fn require_resolved(&self) -> Result<()> {
        match self.first_unresolved() {
            Some(field) => Err(WalkError::UnresolvedPolymorphicType { field }),
            None => Ok(()),
        }
    }
}
