//! Dimension chains for jagged leaves
//!
//! A jagged leaf's shape is an ordered chain of dimensions, each either a
//! constant or the current value of a sibling counter field. The flat
//! element count is the product over the chain, recomputed per record for
//! counter-driven axes.

use crate::errors::{Result, WalkError};
use rowcast_model::DimSpec;

/// Ordered dimension chain of a jagged leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimChain {
    dims: Vec<DimSpec>,
}

impl DimChain {
    pub fn new(dims: Vec<DimSpec>) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> &[DimSpec] {
        &self.dims
    }

    pub fn depth(&self) -> usize {
        self.dims.len()
    }

    /// Names of the counter fields this chain depends on
    pub fn counters(&self) -> impl Iterator<Item = &str> {
        self.dims.iter().filter_map(|d| match d {
            DimSpec::Counter(name) => Some(name.as_str()),
            DimSpec::Const(_) => None,
        })
    }

    /// Per-axis sizes at the current record. `lookup` supplies the
    /// present value of a counter field; a negative counter reads as an
    /// empty axis.
    pub fn sizes(&self, mut lookup: impl FnMut(&str) -> Result<i64>) -> Result<Vec<usize>> {
        self.dims
            .iter()
            .map(|d| match d {
                DimSpec::Const(n) => Ok(*n),
                DimSpec::Counter(name) => {
                    let v = lookup(name)?;
                    Ok(v.max(0) as usize)
                }
            })
            .collect()
    }

    /// Product over the chain of each dimension's current size
    pub fn flat_size(&self, lookup: impl FnMut(&str) -> Result<i64>) -> Result<usize> {
        Ok(self.sizes(lookup)?.iter().product())
    }
}

/// Bound-checked flat element addressing over a jagged leaf's contiguous
/// storage. Refuses indexes past the computed flat size and never reads
/// past the cursor's declared byte length.
pub(crate) fn element_offset(
    index: usize,
    flat_size: usize,
    elem_size: usize,
    avail_bytes: usize,
) -> Result<usize> {
    if index >= flat_size {
        return Err(WalkError::OutOfBounds {
            addr: (index * elem_size) as u64,
            len: elem_size,
            size: flat_size * elem_size,
        });
    }
    let offset = index * elem_size;
    if offset + elem_size > avail_bytes {
        return Err(WalkError::OutOfBounds {
            addr: offset as u64,
            len: elem_size,
            size: avail_bytes,
        });
    }
    Ok(offset)
}
