//! Walker node tree
//!
//! A [`WalkerTree`] mirrors the run-time layout of one record class: a
//! tagged-union node per field shape, composite nodes deduplicated
//! through an arena plus a per-tree type memo, and a two-state resolution
//! flag for every polymorphic sequence. Once built, a node's `byte_size`
//! never changes; the only post-construction mutation is the
//! `Unresolved -> Resolved` transition performed by
//! [`WalkerTree::resolve_against`].

mod build;
mod jagged;
mod resolve;
mod sequence;

pub use jagged::DimChain;
pub(crate) use jagged::element_offset as jagged_element_offset;

use rowcast_model::ScalarKind;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Index of a composite node in the tree's arena.
pub type NodeId = usize;

/// Index of a polymorphic sequence's resolution slot.
pub type PolyId = usize;

/// One node of the tree mirroring a record's layout.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Stable identifier used in text and schema output; empty for
    /// anonymous sequence elements.
    pub field_name: String,
    /// Normalized type label, used for schema naming and debug output.
    pub type_name: String,
    /// Inline size of one instance within its owning composite.
    pub byte_size: usize,
    pub kind: WalkerKind,
}

/// Closed tagged union over every node shape the walker supports.
#[derive(Debug, Clone)]
pub enum WalkerKind {
    /// Fixed-width numeric or boolean leaf
    Scalar(ScalarKind),
    /// Embedded NUL-terminated character buffer
    CharText { capacity: usize },
    /// Owned text object, inline `{data_ptr, byte_len}` header
    OwnedText,
    /// Library text object, inline pointer to a length-prefixed block
    LibText,
    /// Nullable reference wrapping another walker
    Pointer { inner: Box<Walker> },
    /// Intentionally unsupported cross-record reference; always empty
    WeakRef,
    /// Contiguous fixed-length array
    FixedArray { len: usize, element: Box<Walker> },
    /// Length-carrying dynamic sequence
    DynSequence { element: Box<Walker> },
    /// One-bit-per-element boolean sequence
    BitSequence,
    /// Heterogeneous ordered collection; element class fixed at resolution
    PolySequence { slot: PolyId },
    /// Composite, stored in the tree's arena
    Record(NodeId),
    /// Streaming-cursor leaf with a run-time dimension chain
    JaggedLeaf { element: ScalarKind, dims: DimChain },
}

/// A composite's field: the walker plus its byte offset within the owner.
#[derive(Debug, Clone)]
pub struct Field {
    pub offset: usize,
    pub walker: Walker,
}

/// Arena entry for one composite type.
#[derive(Debug, Clone)]
pub struct RecordNode {
    pub type_name: String,
    pub byte_size: usize,
    pub fields: Vec<Field>,
}

/// Resolution state of a polymorphic sequence.
///
/// `Unresolved -> Resolved` is the only legal transition; there is no
/// re-resolution once an element class has been fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyState {
    Unresolved,
    Resolved(NodeId),
}

/// One record class's walker tree: arena, type memo, and root.
#[derive(Debug, Clone)]
pub struct WalkerTree {
    pub(crate) nodes: Vec<RecordNode>,
    pub(crate) memo: HashMap<String, NodeId>,
    pub(crate) poly_states: Vec<PolyState>,
    pub(crate) root: NodeId,
}

impl WalkerTree {
    /// Declared class name of the records this tree mirrors
    pub fn class_name(&self) -> &str {
        &self.nodes[self.root].type_name
    }

    /// Root composite node
    pub fn root_node(&self) -> &RecordNode {
        &self.nodes[self.root]
    }

    /// Arena lookup
    pub fn node(&self, id: NodeId) -> &RecordNode {
        &self.nodes[id]
    }

    /// Number of distinct composite types in the memo
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Memoized node for a composite type name, if built
    pub fn memoized(&self, type_name: &str) -> Option<NodeId> {
        self.memo.get(type_name).copied()
    }

    /// Resolution state of a polymorphic sequence slot
    pub(crate) fn poly_state(&self, slot: PolyId) -> PolyState {
        self.poly_states[slot]
    }

    /// Whether every polymorphic sequence in the tree has a fixed
    /// element class.
    pub fn resolved(&self) -> bool {
        self.poly_states
            .iter()
            .all(|s| matches!(s, PolyState::Resolved(_)))
    }

    /// Whether a single walker and all its descendants are resolved.
    pub fn walker_resolved(&self, walker: &Walker) -> bool {
        let mut visited = HashSet::new();
        self.walker_resolved_inner(walker, &mut visited)
    }

    fn walker_resolved_inner(&self, walker: &Walker, visited: &mut HashSet<NodeId>) -> bool {
        match &walker.kind {
            WalkerKind::Pointer { inner }
            | WalkerKind::FixedArray { element: inner, .. }
            | WalkerKind::DynSequence { element: inner } => {
                self.walker_resolved_inner(inner, visited)
            }
            WalkerKind::PolySequence { slot } => match self.poly_state(*slot) {
                PolyState::Unresolved => false,
                PolyState::Resolved(id) => self.node_resolved(id, visited),
            },
            WalkerKind::Record(id) => self.node_resolved(*id, visited),
            _ => true,
        }
    }

    fn node_resolved(&self, id: NodeId, visited: &mut HashSet<NodeId>) -> bool {
        if !visited.insert(id) {
            // Already on the path: a cycle contributes no unresolved state
            return true;
        }
        self.nodes[id]
            .fields
            .iter()
            .all(|f| self.walker_resolved_inner(&f.walker, visited))
    }

    /// Whether a walker carries no data at all and should be pruned from
    /// its owner. Weak references are always empty; a composite is empty
    /// iff it retained zero fields.
    pub fn walker_empty(&self, walker: &Walker) -> bool {
        let mut visited = HashSet::new();
        self.walker_empty_inner(walker, &mut visited)
    }

    fn walker_empty_inner(&self, walker: &Walker, visited: &mut HashSet<NodeId>) -> bool {
        match &walker.kind {
            WalkerKind::WeakRef => true,
            WalkerKind::Pointer { inner }
            | WalkerKind::FixedArray { element: inner, .. }
            | WalkerKind::DynSequence { element: inner } => {
                self.walker_empty_inner(inner, visited)
            }
            WalkerKind::Record(id) => {
                if !visited.insert(*id) {
                    return false;
                }
                self.nodes[*id].fields.is_empty()
            }
            _ => false,
        }
    }

    /// Innermost non-pointer walker, used for text and schema emission of
    /// pointer chains.
    pub(crate) fn innermost<'a>(&self, walker: &'a Walker) -> &'a Walker {
        match &walker.kind {
            WalkerKind::Pointer { inner } => self.innermost(inner),
            _ => walker,
        }
    }
}

impl fmt::Display for WalkerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
