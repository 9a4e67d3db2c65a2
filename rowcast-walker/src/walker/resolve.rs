//! Polymorphic sequence resolution
//!
//! A polymorphic sequence starts `Unresolved` and fixes its element class
//! from the first element of the first non-empty collection it is shown.
//! `Unresolved -> Resolved` is the only legal transition; once a class is
//! fixed it never changes, and a later record carrying a different class
//! fails emission with `InconsistentElementClass`.

use crate::emit::{field_location, poly_storage, sequence_storage, ReadCtx, Scope, MAX_DEPTH};
use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::source::CursorMap;
use crate::walker::build::build_composite;
use crate::walker::{PolyId, PolyState, Walker, WalkerKind, WalkerTree};
use rowcast_model::TypeProvider;
use std::collections::HashSet;
use tracing::debug;

impl WalkerTree {
    /// Resolve every polymorphic sequence that has data in the given
    /// record. Safe to call repeatedly; sequences whose collections are
    /// empty at this record stay unresolved for a later one.
    pub fn resolve_against(
        &mut self,
        provider: &dyn TypeProvider,
        mem: &MemoryImage,
        record_addr: Address,
        cursors: Option<&CursorMap>,
    ) -> Result<()> {
        // Newly resolved element classes may contain further polymorphic
        // sequences, so scan to a fixpoint.
        loop {
            let pending = self.scan_unresolved(mem, record_addr, cursors)?;
            if pending.is_empty() {
                return Ok(());
            }
            for (slot, class) in pending {
                let id = build_composite(self, provider, &class, &mut HashSet::new())?;
                debug!(slot, class = %class, "resolved polymorphic sequence");
                self.poly_states[slot] = PolyState::Resolved(id);
            }
        }
    }

    /// Collect the slots that can be resolved against this record, with
    /// the run-time class of their first element.
    fn scan_unresolved(
        &self,
        mem: &MemoryImage,
        record_addr: Address,
        cursors: Option<&CursorMap>,
    ) -> Result<Vec<(PolyId, String)>> {
        let ctx = ReadCtx { mem, cursors };
        let mut found = Vec::new();
        self.scan_node(&ctx, self.root, record_addr, true, 0, &mut found)?;
        Ok(found)
    }

    fn scan_node(
        &self,
        ctx: &ReadCtx<'_>,
        id: usize,
        base: Address,
        top: bool,
        depth: usize,
        found: &mut Vec<(PolyId, String)>,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(WalkError::DepthExceeded {
                field: self.nodes[id].type_name.clone(),
            });
        }
        let scope = Scope {
            node: &self.nodes[id],
            base,
            top,
        };
        for field in &self.nodes[id].fields {
            let (addr, declared_len) = field_location(ctx, &scope, field);
            self.scan_walker(ctx, &field.walker, addr, declared_len, depth + 1, found)?;
        }
        Ok(())
    }

    fn scan_walker(
        &self,
        ctx: &ReadCtx<'_>,
        walker: &Walker,
        addr: Address,
        declared_len: Option<usize>,
        depth: usize,
        found: &mut Vec<(PolyId, String)>,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(WalkError::DepthExceeded {
                field: walker.field_name.clone(),
            });
        }
        match &walker.kind {
            WalkerKind::Pointer { inner } => {
                let target = ctx.mem.read_u64(addr)?;
                if target != 0 {
                    self.scan_walker(ctx, inner, target, None, depth + 1, found)?;
                }
            }
            WalkerKind::FixedArray { len, element } => {
                for i in 0..*len {
                    let elem_addr = addr + (i * element.byte_size) as u64;
                    self.scan_walker(ctx, element, elem_addr, None, depth + 1, found)?;
                }
            }
            WalkerKind::DynSequence { element } => {
                if element.byte_size == 0 {
                    return Ok(());
                }
                let (data, byte_len) = sequence_storage(ctx.mem, addr, declared_len)?;
                let count = byte_len / element.byte_size;
                for i in 0..count {
                    let elem_addr = data + (i * element.byte_size) as u64;
                    self.scan_walker(ctx, element, elem_addr, None, depth + 1, found)?;
                }
            }
            WalkerKind::PolySequence { slot } => {
                let (data, count) = poly_storage(ctx.mem, addr, declared_len)?;
                match self.poly_state(*slot) {
                    PolyState::Unresolved => {
                        if count == 0 || data == 0 {
                            return Ok(());
                        }
                        let first = ctx.mem.read_u64(data)?;
                        if first == 0 {
                            return Ok(());
                        }
                        if let Some(class) = ctx.mem.class_of(first) {
                            if !found.iter().any(|(s, _)| s == slot) {
                                found.push((*slot, class.to_string()));
                            }
                        }
                    }
                    PolyState::Resolved(id) => {
                        // Look inside resolved elements for nested
                        // sequences still pending.
                        for i in 0..count {
                            let elem = ctx.mem.read_u64(data + (i * 8) as u64)?;
                            if elem != 0 {
                                self.scan_node(ctx, id, elem, false, depth + 1, found)?;
                            }
                        }
                    }
                }
            }
            WalkerKind::Record(id) => {
                self.scan_node(ctx, *id, addr, false, depth + 1, found)?;
            }
            _ => {}
        }
        Ok(())
    }
}
