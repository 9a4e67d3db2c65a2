//! Record source adapter
//!
//! The record source is an external collaborator: it opens a container,
//! advances through stored records, and hands out per-field cursor
//! addresses that are only valid for the current record. [`RecordStream`]
//! adapts a source to a walker tree: it re-binds cursors on every
//! advance, rebuilds the tree when the container's declared class
//! changes, and drives resolution and per-record emission.

use crate::emit::binary::BinarySink;
use crate::errors::{Result, WalkError};
use crate::memory::{Address, MemoryImage};
use crate::walker::WalkerTree;
use rowcast_model::TypeProvider;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Address and declared byte length of one field's storage for the
/// current record. Stale cursors are a correctness bug: every advance
/// re-binds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCursor {
    pub addr: Address,
    pub byte_len: usize,
}

/// Per-record cursor bindings, keyed by field name.
pub type CursorMap = HashMap<String, FieldCursor>;

/// External record sequence over one container.
pub trait RecordSource {
    /// Declared class of the records in the current container
    fn class_name(&self) -> &str;

    /// Total number of stored records
    fn record_count(&self) -> i64;

    /// Move to the next record; `false` when exhausted
    fn advance(&mut self) -> Result<bool>;

    /// Position on a specific record
    fn seek(&mut self, index: i64) -> Result<()>;

    /// Address of the current record's inline data
    fn current_record_address(&self) -> Result<Address>;

    /// Cursor for one top-level field at the current record, when the
    /// source stores that field out of line
    fn field_cursor(&self, field_name: &str) -> Option<FieldCursor>;

    /// Memory image the record addresses refer to
    fn memory(&self) -> &MemoryImage;
}

/// Adapter that owns a source and the walker tree mirroring its records.
pub struct RecordStream<'p, S: RecordSource> {
    provider: &'p dyn TypeProvider,
    source: S,
    tree: WalkerTree,
    frame: CursorMap,
}

impl<'p, S: RecordSource> RecordStream<'p, S> {
    /// Build the walker tree for the source's declared class and wrap
    /// both into a stream positioned before the first record.
    pub fn open(provider: &'p dyn TypeProvider, source: S) -> Result<Self> {
        let tree = WalkerTree::build(provider, source.class_name())?;
        Ok(Self {
            provider,
            source,
            tree,
            frame: CursorMap::new(),
        })
    }

    pub fn tree(&self) -> &WalkerTree {
        &self.tree
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn record_count(&self) -> i64 {
        self.source.record_count()
    }

    /// Advance to the next record, re-binding every field cursor. When
    /// the container's declared class has changed, the walker tree is
    /// rebuilt before the cursors are bound.
    pub fn advance(&mut self) -> Result<bool> {
        if !self.source.advance()? {
            return Ok(false);
        }
        self.after_move()?;
        Ok(true)
    }

    /// Seek to a specific record, re-binding cursors like `advance`.
    pub fn seek(&mut self, index: i64) -> Result<()> {
        self.source.seek(index)?;
        self.after_move()
    }

    fn after_move(&mut self) -> Result<()> {
        if self.source.class_name() != self.tree.class_name() {
            debug!(
                from = self.tree.class_name(),
                to = self.source.class_name(),
                "container class changed, rebuilding walker tree"
            );
            self.tree = WalkerTree::build(self.provider, self.source.class_name())?;
        }
        self.rebind();
        Ok(())
    }

    /// Re-bind the per-record cursor frame from the source.
    fn rebind(&mut self) {
        self.frame.clear();
        for field in &self.tree.root_node().fields {
            let name = &field.walker.field_name;
            if let Some(cursor) = self.source.field_cursor(name) {
                self.frame.insert(name.clone(), cursor);
            }
        }
    }

    /// Resolve polymorphic sequences against the current record.
    pub fn resolve_current(&mut self) -> Result<()> {
        let addr = self.source.current_record_address()?;
        self.tree.resolve_against(
            self.provider,
            self.source.memory(),
            addr,
            Some(&self.frame),
        )
    }

    /// Advance until every polymorphic sequence is resolved. Exhausting
    /// the container first is the fatal cannot-resolve startup condition.
    pub fn resolve_all(&mut self) -> Result<()> {
        loop {
            if self.tree.resolved() {
                return Ok(());
            }
            if !self.advance()? {
                let field = self.tree.first_unresolved().unwrap_or_default();
                warn!(field = %field, "container exhausted with unresolved dynamic types");
                return Err(WalkError::UnresolvedPolymorphicType { field });
            }
            self.resolve_current()?;
        }
    }

    /// Resolve lazily against the record about to be emitted, when some
    /// polymorphic sequence is still pending.
    fn ensure_resolved(&mut self) -> Result<()> {
        if self.tree.resolved() {
            return Ok(());
        }
        self.resolve_current()
    }

    /// Textual encoding of the current record
    pub fn emit_text(&mut self) -> Result<Value> {
        self.ensure_resolved()?;
        let addr = self.source.current_record_address()?;
        self.tree
            .emit_text_bound(self.source.memory(), addr, Some(&self.frame))
    }

    /// Binary encoding of the current record
    pub fn emit_binary(&mut self, sink: &mut dyn BinarySink) -> Result<()> {
        self.ensure_resolved()?;
        let addr = self.source.current_record_address()?;
        self.tree
            .emit_binary_bound(self.source.memory(), addr, Some(&self.frame), sink)
    }

    /// Raw-buffer copy of the current record
    pub fn copy_to_buffer(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_resolved()?;
        let addr = self.source.current_record_address()?;
        self.tree
            .copy_to_buffer_bound(self.source.memory(), addr, Some(&self.frame), buf)
    }
}

/// In-memory record source backed by a [`MemoryImage`], used by tests and
/// by tools that already hold records in memory.
#[derive(Debug)]
pub struct MemorySource {
    class_name: String,
    mem: MemoryImage,
    records: Vec<Address>,
    cursors: Vec<CursorMap>,
    /// Current position; -1 before the first record
    position: i64,
}

impl MemorySource {
    pub fn new(class_name: &str, mem: MemoryImage) -> Self {
        Self {
            class_name: class_name.to_string(),
            mem,
            records: Vec::new(),
            cursors: Vec::new(),
            position: -1,
        }
    }

    pub fn push_record(&mut self, addr: Address) {
        self.records.push(addr);
        self.cursors.push(CursorMap::new());
    }

    pub fn push_record_with_cursors(&mut self, addr: Address, cursors: CursorMap) {
        self.records.push(addr);
        self.cursors.push(cursors);
    }

    /// Change the declared class, as happens when the underlying
    /// container is swapped for the next file.
    pub fn set_class_name(&mut self, class_name: &str) {
        self.class_name = class_name.to_string();
    }

    pub fn memory_mut(&mut self) -> &mut MemoryImage {
        &mut self.mem
    }
}

impl RecordSource for MemorySource {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn record_count(&self) -> i64 {
        self.records.len() as i64
    }

    fn advance(&mut self) -> Result<bool> {
        if self.position + 1 < self.records.len() as i64 {
            self.position += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn seek(&mut self, index: i64) -> Result<()> {
        if index < 0 || index >= self.records.len() as i64 {
            return Err(WalkError::Source(anyhow::anyhow!(
                "seek to {index} outside 0..{}",
                self.records.len()
            )));
        }
        self.position = index;
        Ok(())
    }

    fn current_record_address(&self) -> Result<Address> {
        if self.position < 0 || self.position as usize >= self.records.len() {
            return Err(WalkError::Source(anyhow::anyhow!(
                "no current record; advance first"
            )));
        }
        Ok(self.records[self.position as usize])
    }

    fn field_cursor(&self, field_name: &str) -> Option<FieldCursor> {
        if self.position < 0 || self.position as usize >= self.cursors.len() {
            return None;
        }
        self.cursors[self.position as usize].get(field_name).copied()
    }

    fn memory(&self) -> &MemoryImage {
        &self.mem
    }
}
