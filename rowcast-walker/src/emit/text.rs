//! Textual value encoding
//!
//! One JSON object per record, field values keyed by field name. Pointer
//! fields encode `null` when absent and `{"<innermost type>": value}`
//! when present, so polymorphic dispatch stays recoverable from the text
//! output alone.

use crate::emit::{
    self, counter_value, field_location, poly_storage, read_scalar, render_text,
    sequence_storage, ReadCtx, ScalarValue, Scope, MAX_DEPTH,
};
use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::source::CursorMap;
use crate::walker::{jagged_element_offset, PolyState, Walker, WalkerKind, WalkerTree};
use rowcast_model::ScalarKind;
use serde_json::{Map, Number, Value};

impl WalkerTree {
    /// Encode one record as a JSON-like document.
    pub fn emit_text(&self, mem: &MemoryImage, record_addr: Address) -> Result<Value> {
        self.emit_text_bound(mem, record_addr, None)
    }

    /// Encode one record read through per-field cursors.
    pub(crate) fn emit_text_bound(
        &self,
        mem: &MemoryImage,
        record_addr: Address,
        cursors: Option<&CursorMap>,
    ) -> Result<Value> {
        self.require_resolved()?;
        let ctx = ReadCtx { mem, cursors };
        record_value(self, &ctx, self.root, record_addr, true, 0)
    }
}

fn record_value(
    tree: &WalkerTree,
    ctx: &ReadCtx<'_>,
    id: usize,
    base: Address,
    top: bool,
    depth: usize,
) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(WalkError::DepthExceeded {
            field: tree.node(id).type_name.clone(),
        });
    }
    let node = tree.node(id);
    let scope = Scope { node, base, top };
    let mut map = Map::new();
    for field in &node.fields {
        let (addr, declared_len) = field_location(ctx, &scope, field);
        let value = walker_value(tree, ctx, &scope, &field.walker, addr, declared_len, depth + 1)?;
        map.insert(field.walker.field_name.clone(), value);
    }
    Ok(Value::Object(map))
}

fn walker_value(
    tree: &WalkerTree,
    ctx: &ReadCtx<'_>,
    scope: &Scope<'_>,
    walker: &Walker,
    addr: Address,
    declared_len: Option<usize>,
    depth: usize,
) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(WalkError::DepthExceeded {
            field: walker.field_name.clone(),
        });
    }
    match &walker.kind {
        WalkerKind::Scalar(kind) => Ok(scalar_value(read_scalar(ctx.mem, addr, *kind)?)),
        WalkerKind::CharText { .. } | WalkerKind::OwnedText | WalkerKind::LibText => Ok(
            Value::String(render_text(ctx.mem, walker, addr)?.into_owned()),
        ),
        WalkerKind::Pointer { inner } => {
            let target = ctx.mem.read_u64(addr)?;
            if target == 0 {
                return Ok(Value::Null);
            }
            let inner_value = walker_value(tree, ctx, scope, inner, target, None, depth + 1)?;
            let mut wrapped = Map::new();
            wrapped.insert(tree.innermost(walker).type_name.clone(), inner_value);
            Ok(Value::Object(wrapped))
        }
        // Weak references are pruned at build time
        WalkerKind::WeakRef => Ok(Value::Null),
        WalkerKind::FixedArray { len, element } => {
            let mut items = Vec::with_capacity(*len);
            for i in 0..*len {
                let elem_addr = addr + (i * element.byte_size) as u64;
                items.push(walker_value(tree, ctx, scope, element, elem_addr, None, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        WalkerKind::DynSequence { element } => {
            let (data, byte_len) = sequence_storage(ctx.mem, addr, declared_len)?;
            let count = if element.byte_size == 0 {
                0
            } else {
                byte_len / element.byte_size
            };
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                let elem_addr = data + (i * element.byte_size) as u64;
                items.push(walker_value(tree, ctx, scope, element, elem_addr, None, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        WalkerKind::BitSequence => {
            let (data, bit_len) = sequence_storage(ctx.mem, addr, declared_len)?;
            let bit_len = match declared_len {
                // A cursor's byte length bounds the bits it can carry
                Some(bytes) => bit_len.min(bytes * 8),
                None => bit_len,
            };
            let storage = ctx.mem.read(data, bit_len.div_ceil(8))?;
            let items = (0..bit_len)
                .map(|i| Value::Bool(emit::bit_at(storage, i)))
                .collect();
            Ok(Value::Array(items))
        }
        WalkerKind::PolySequence { slot } => {
            let PolyState::Resolved(id) = tree.poly_state(*slot) else {
                return Err(WalkError::UnresolvedPolymorphicType {
                    field: walker.field_name.clone(),
                });
            };
            let (data, count) = poly_storage(ctx.mem, addr, declared_len)?;
            let expected = tree.node(id).type_name.clone();
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                let elem = ctx.mem.read_u64(data + (i * 8) as u64)?;
                emit::expect_class(ctx.mem, elem, &expected, &walker.field_name)?;
                items.push(record_value(tree, ctx, id, elem, false, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        WalkerKind::Record(id) => record_value(tree, ctx, *id, addr, false, depth + 1),
        WalkerKind::JaggedLeaf { element, dims } => {
            let sizes = dims.sizes(|name| counter_value(ctx, scope, name))?;
            if sizes.is_empty() {
                return Ok(Value::Array(vec![]));
            }
            let flat: usize = sizes.iter().product();
            let (data, avail) = sequence_storage(ctx.mem, addr, declared_len)?;
            let mut next = 0usize;
            jagged_dim_value(ctx.mem, *element, &sizes, 0, data, avail, flat, &mut next)
        }
    }
}

/// Emit one dimension level of a jagged leaf, consuming a running flat
/// index and stopping early at the computed bound.
#[allow(clippy::too_many_arguments)]
fn jagged_dim_value(
    mem: &MemoryImage,
    element: ScalarKind,
    sizes: &[usize],
    level: usize,
    data: Address,
    avail: usize,
    flat: usize,
    next: &mut usize,
) -> Result<Value> {
    let elem_size = element.byte_size();
    let mut items = Vec::with_capacity(sizes[level]);
    for _ in 0..sizes[level] {
        if level + 1 < sizes.len() {
            items.push(jagged_dim_value(
                mem,
                element,
                sizes,
                level + 1,
                data,
                avail,
                flat,
                next,
            )?);
        } else {
            let Ok(offset) = jagged_element_offset(*next, flat, elem_size, avail) else {
                break;
            };
            *next += 1;
            items.push(scalar_value(read_scalar(mem, data + offset as u64, element)?));
        }
    }
    Ok(Value::Array(items))
}

fn scalar_value(value: ScalarValue) -> Value {
    match value {
        ScalarValue::Boolean(v) => Value::Bool(v),
        ScalarValue::Int(v) => Value::Number(v.into()),
        ScalarValue::Long(v) => Value::Number(v.into()),
        ScalarValue::Unsigned(v) => Value::Number(v.into()),
        // Non-finite floats have no number form in the text model
        ScalarValue::Float(v) => Number::from_f64(v as f64).map_or(Value::Null, Value::Number),
        ScalarValue::Double(v) => Number::from_f64(v).map_or(Value::Null, Value::Number),
    }
}
