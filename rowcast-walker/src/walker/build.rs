//! Walker tree construction
//!
//! Builds a [`WalkerTree`] from a type provider by recursively dispatching
//! each field's normalized declared name to a walker kind. Composite types
//! are registered in the memo before their fields are populated, so shared
//! and self-referential type graphs terminate: a repeated occurrence reuses
//! the existing arena index. A cycle that passes through a by-value field
//! has no finite layout and is rejected.

use crate::consts;
use crate::errors::{Result, WalkError};
use crate::walker::{
    DimChain, Field, NodeId, PolyState, RecordNode, Walker, WalkerKind, WalkerTree,
};
use rowcast_model::{
    parse_shape, parse_type_name, FieldDescriptor, ParsedTypeName, ScalarKind, TypeProvider,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

impl WalkerTree {
    /// Build the walker tree for one record class.
    ///
    /// Fails with [`WalkError::UnsupportedType`] when a declared name
    /// matches no known shape and the provider has no descriptor for it,
    /// and with [`WalkError::RecursiveTypeNotSupported`] when a composite
    /// embeds itself by value.
    pub fn build(provider: &dyn TypeProvider, class_name: &str) -> Result<Self> {
        let mut tree = WalkerTree {
            nodes: Vec::new(),
            memo: HashMap::new(),
            poly_states: Vec::new(),
            root: 0,
        };
        let mut in_progress = HashSet::new();
        tree.root = build_composite(&mut tree, provider, class_name, &mut in_progress)?;
        debug!(
            class = class_name,
            nodes = tree.nodes.len(),
            poly_slots = tree.poly_states.len(),
            "built walker tree"
        );
        Ok(tree)
    }
}

/// Build (or reuse) the arena node for a composite type.
///
/// The memo entry is inserted before any field recursion; a recursive
/// reference finds the placeholder index and the arena indirection makes
/// the reuse safe once population completes.
pub(crate) fn build_composite(
    tree: &mut WalkerTree,
    provider: &dyn TypeProvider,
    type_name: &str,
    in_progress: &mut HashSet<String>,
) -> Result<NodeId> {
    if let Some(&id) = tree.memo.get(type_name) {
        return Ok(id);
    }

    let descriptor = provider
        .describe(type_name)
        .ok_or_else(|| WalkError::UnsupportedType {
            name: type_name.to_string(),
        })?;

    let id = tree.nodes.len();
    tree.nodes.push(RecordNode {
        type_name: type_name.to_string(),
        byte_size: descriptor.byte_size,
        fields: Vec::new(),
    });
    tree.memo.insert(type_name.to_string(), id);
    in_progress.insert(type_name.to_string());

    let mut fields = Vec::new();
    for fd in &descriptor.fields {
        if fd.offset <= 0 {
            debug!(field = %fd.name, offset = fd.offset, "dropping synthetic field");
            continue;
        }
        let Some(walker) = build_field(tree, provider, fd, in_progress)? else {
            continue;
        };
        fields.push(Field {
            offset: fd.offset as usize,
            walker,
        });
    }

    in_progress.remove(type_name);
    tree.nodes[id].fields = fields;
    Ok(id)
}

/// Build the walker for one field descriptor, or `None` when the field is
/// pruned (weak reference, or a wrapper around an empty composite).
fn build_field(
    tree: &mut WalkerTree,
    provider: &dyn TypeProvider,
    fd: &FieldDescriptor,
    in_progress: &mut HashSet<String>,
) -> Result<Option<Walker>> {
    let parsed = parse_type_name(&fd.type_name);

    // A shape annotation turns a scalar field into a jagged leaf whose
    // dimensions are evaluated per record.
    if let Some(annotation) = &fd.shape {
        match parse_shape(annotation) {
            Some(dims) => {
                let element = match parsed {
                    ParsedTypeName::Scalar(kind) => kind,
                    ParsedTypeName::Char => ScalarKind::I8,
                    _ => {
                        return Err(WalkError::UnsupportedType {
                            name: format!("{} with shape {annotation}", fd.type_name),
                        })
                    }
                };
                return Ok(Some(Walker {
                    field_name: fd.name.clone(),
                    type_name: element.name().to_string(),
                    byte_size: consts::SEQ_HEADER_SIZE,
                    kind: WalkerKind::JaggedLeaf {
                        element,
                        dims: DimChain::new(dims),
                    },
                }));
            }
            None => {
                warn!(field = %fd.name, annotation = %annotation, "ignoring malformed shape annotation");
            }
        }
    }

    // A char with declared dims is an embedded text buffer; outer dims
    // wrap it in fixed arrays.
    if parsed == ParsedTypeName::Char {
        if let Some((&capacity, outer_dims)) = fd.array_dims.split_last() {
            let mut walker = Walker {
                field_name: fd.name.clone(),
                type_name: format!("char[{capacity}]"),
                byte_size: capacity,
                kind: WalkerKind::CharText { capacity },
            };
            for &dim in outer_dims.iter().rev() {
                walker = wrap_fixed_array(walker, dim);
            }
            return Ok(Some(walker));
        }
    }

    let Some(mut walker) = build_walker(tree, provider, &fd.name, parsed, false, in_progress)?
    else {
        return Ok(None);
    };
    for &dim in fd.array_dims.iter().rev() {
        walker = wrap_fixed_array(walker, dim);
    }
    Ok(Some(walker))
}

fn wrap_fixed_array(element: Walker, len: usize) -> Walker {
    Walker {
        field_name: element.field_name.clone(),
        type_name: format!("{}[{len}]", element.type_name),
        byte_size: len * element.byte_size,
        kind: WalkerKind::FixedArray {
            len,
            element: Box::new(element),
        },
    }
}

/// Dispatch a normalized type name to its walker kind.
///
/// `indirect` records whether the reference passed through a pointer or a
/// dynamic sequence on the way here; only those paths may legally close a
/// recursive type cycle.
fn build_walker(
    tree: &mut WalkerTree,
    provider: &dyn TypeProvider,
    field_name: &str,
    parsed: ParsedTypeName,
    indirect: bool,
    in_progress: &mut HashSet<String>,
) -> Result<Option<Walker>> {
    let walker = match parsed {
        ParsedTypeName::Scalar(kind) => Walker {
            field_name: field_name.to_string(),
            type_name: kind.name().to_string(),
            byte_size: kind.byte_size(),
            kind: WalkerKind::Scalar(kind),
        },
        ParsedTypeName::Char => Walker {
            field_name: field_name.to_string(),
            type_name: "char".to_string(),
            byte_size: 1,
            kind: WalkerKind::Scalar(ScalarKind::I8),
        },
        ParsedTypeName::OwnedText => Walker {
            field_name: field_name.to_string(),
            type_name: "string".to_string(),
            byte_size: consts::OWNED_TEXT_HEADER_SIZE,
            kind: WalkerKind::OwnedText,
        },
        ParsedTypeName::LibText => Walker {
            field_name: field_name.to_string(),
            type_name: "Text".to_string(),
            byte_size: consts::LIB_TEXT_SIZE,
            kind: WalkerKind::LibText,
        },
        ParsedTypeName::Pointer(inner) => {
            let Some(inner_walker) =
                build_walker(tree, provider, field_name, *inner, true, in_progress)?
            else {
                debug!(field = field_name, "pruning pointer to empty type");
                return Ok(None);
            };
            Walker {
                field_name: field_name.to_string(),
                type_name: format!("{}*", inner_walker.type_name),
                byte_size: consts::POINTER_SIZE,
                kind: WalkerKind::Pointer {
                    inner: Box::new(inner_walker),
                },
            }
        }
        ParsedTypeName::DynSequence(inner) => {
            let Some(element) = build_walker(tree, provider, "", *inner, true, in_progress)?
            else {
                debug!(field = field_name, "pruning sequence of empty type");
                return Ok(None);
            };
            Walker {
                field_name: field_name.to_string(),
                type_name: format!("vector<{}>", element.type_name),
                byte_size: consts::SEQ_HEADER_SIZE,
                kind: WalkerKind::DynSequence {
                    element: Box::new(element),
                },
            }
        }
        ParsedTypeName::BitSequence => Walker {
            field_name: field_name.to_string(),
            type_name: "vector<bool>".to_string(),
            byte_size: consts::BIT_SEQ_HEADER_SIZE,
            kind: WalkerKind::BitSequence,
        },
        ParsedTypeName::PolySequence => {
            let slot = tree.poly_states.len();
            tree.poly_states.push(PolyState::Unresolved);
            Walker {
                field_name: field_name.to_string(),
                type_name: "ObjectArray".to_string(),
                byte_size: consts::POLY_HEADER_SIZE,
                kind: WalkerKind::PolySequence { slot },
            }
        }
        ParsedTypeName::WeakRef => {
            debug!(field = field_name, "pruning weak reference");
            return Ok(None);
        }
        ParsedTypeName::Composite(name) => {
            if in_progress.contains(&name) && !indirect {
                return Err(WalkError::RecursiveTypeNotSupported { name });
            }
            let id = build_composite(tree, provider, &name, in_progress)?;
            // Prune fully built composites that retained no fields. A node
            // still under construction is part of a cycle and is kept.
            if !in_progress.contains(&name) && tree.nodes[id].fields.is_empty() {
                debug!(field = field_name, class = %name, "pruning empty composite");
                return Ok(None);
            }
            let byte_size = tree.nodes[id].byte_size;
            Walker {
                field_name: field_name.to_string(),
                type_name: name,
                byte_size,
                kind: WalkerKind::Record(id),
            }
        }
    };
    Ok(Some(walker))
}
