//! Debug representation
//!
//! Human-readable nested description of a walker tree. A composite type
//! is rendered in full the first time it occurs within one call and
//! abbreviated to its bare name afterwards; the visited set is per call,
//! not the tree's type memo, so every call renders a type fully at its
//! first occurrence.

use crate::walker::{NodeId, PolyState, Walker, WalkerKind, WalkerTree};
use rowcast_model::DimSpec;
use std::collections::HashSet;
use std::fmt::Write;

impl WalkerTree {
    /// Render the tree as an indented description. Works on unresolved
    /// trees; pending polymorphic sequences show as `ObjectArray<?>`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let mut seen = HashSet::new();
        seen.insert(self.root_id());
        self.describe_node(self.root_id(), 0, &mut seen, &mut out);
        out
    }

    fn describe_node(
        &self,
        id: NodeId,
        indent: usize,
        seen: &mut HashSet<NodeId>,
        out: &mut String,
    ) {
        let node = self.node(id);
        let _ = writeln!(out, "{} ({} bytes) {{", node.type_name, node.byte_size);
        for field in &node.fields {
            let pad = "  ".repeat(indent + 1);
            let _ = write!(out, "{pad}{}: ", field.walker.field_name);
            self.describe_walker(&field.walker, indent + 1, seen, out);
            out.push('\n');
        }
        let _ = write!(out, "{}}}", "  ".repeat(indent));
    }

    fn describe_walker(
        &self,
        walker: &Walker,
        indent: usize,
        seen: &mut HashSet<NodeId>,
        out: &mut String,
    ) {
        match &walker.kind {
            WalkerKind::Scalar(kind) => out.push_str(kind.name()),
            WalkerKind::CharText { capacity } => {
                let _ = write!(out, "char[{capacity}]");
            }
            WalkerKind::OwnedText => out.push_str("string"),
            WalkerKind::LibText => out.push_str("Text"),
            WalkerKind::Pointer { inner } => {
                self.describe_walker(inner, indent, seen, out);
                out.push('*');
            }
            WalkerKind::WeakRef => out.push_str("WeakRef"),
            WalkerKind::FixedArray { len, element } => {
                self.describe_walker(element, indent, seen, out);
                let _ = write!(out, "[{len}]");
            }
            WalkerKind::DynSequence { element } => {
                out.push_str("vector<");
                self.describe_walker(element, indent, seen, out);
                out.push('>');
            }
            WalkerKind::BitSequence => out.push_str("vector<bool>"),
            WalkerKind::PolySequence { slot } => match self.poly_state(*slot) {
                PolyState::Unresolved => out.push_str("ObjectArray<?>"),
                PolyState::Resolved(id) => {
                    out.push_str("ObjectArray<");
                    self.describe_record_ref(id, indent, seen, out);
                    out.push('>');
                }
            },
            WalkerKind::Record(id) => self.describe_record_ref(*id, indent, seen, out),
            WalkerKind::JaggedLeaf { element, dims } => {
                out.push_str(element.name());
                for dim in dims.dims() {
                    match dim {
                        DimSpec::Const(n) => {
                            let _ = write!(out, "[{n}]");
                        }
                        DimSpec::Counter(name) => {
                            let _ = write!(out, "[{name}]");
                        }
                    }
                }
            }
        }
    }

    /// Full rendering on first occurrence, bare type name on repeats.
    fn describe_record_ref(
        &self,
        id: NodeId,
        indent: usize,
        seen: &mut HashSet<NodeId>,
        out: &mut String,
    ) {
        if seen.insert(id) {
            self.describe_node(id, indent, seen, out);
        } else {
            out.push_str(&self.node(id).type_name);
        }
    }
}
