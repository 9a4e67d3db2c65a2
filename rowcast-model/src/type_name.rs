//! Declared type-name parsing
//!
//! The reflective service hands out C-flavored declared names such as
//! `"unsigned int"`, `"const Track*"`, `"vector<float>"` or `"WeakRef"`.
//! This module normalizes them into the closed set of shapes the walker
//! can build, and parses `[n][4]`-style shape annotations into dimension
//! chains.

use crate::scalar::ScalarKind;
use serde::{Deserialize, Serialize};

/// Normalized shape of a declared type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTypeName {
    /// Fixed-width numeric or boolean leaf
    Scalar(ScalarKind),
    /// Single `char`; becomes an embedded text buffer when array dims apply
    Char,
    /// Owned text object with an inline `{ptr, len}` header
    OwnedText,
    /// Library text object holding a pointer to a length-prefixed block
    LibText,
    /// Nullable reference to the inner shape
    Pointer(Box<ParsedTypeName>),
    /// Dynamic length-carrying sequence of the inner shape
    DynSequence(Box<ParsedTypeName>),
    /// One-bit-per-element boolean sequence
    BitSequence,
    /// Heterogeneous ordered collection; element class discovered at run time
    PolySequence,
    /// Intentionally unsupported cross-record reference
    WeakRef,
    /// Anything else: a composite resolved through the type provider
    Composite(String),
}

/// One axis of a jagged leaf's dimension chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimSpec {
    /// Compile-time constant extent
    Const(usize),
    /// Extent read from the named sibling counter field at record time
    Counter(String),
}

/// Strip `const` and `volatile` qualifier tokens from a declared name.
fn strip_qualifiers(raw: &str) -> String {
    raw.split_whitespace()
        .filter(|tok| *tok != "const" && *tok != "volatile")
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a declared type name into its normalized shape.
///
/// Pointer suffixes nest: `"Track**"` parses as a pointer to a pointer
/// to the `Track` composite. Unrecognized names are returned as
/// [`ParsedTypeName::Composite`] for the provider to resolve.
pub fn parse_type_name(raw: &str) -> ParsedTypeName {
    let cleaned = strip_qualifiers(raw);
    let cleaned = cleaned.trim();

    if let Some(stripped) = cleaned.strip_suffix('*') {
        return ParsedTypeName::Pointer(Box::new(parse_type_name(stripped)));
    }

    if let Some(inner) = container_inner(cleaned, "vector") {
        if matches!(parse_type_name(inner), ParsedTypeName::Scalar(ScalarKind::Bool)) {
            return ParsedTypeName::BitSequence;
        }
        return ParsedTypeName::DynSequence(Box::new(parse_type_name(inner)));
    }

    if cleaned == "BitVec" {
        return ParsedTypeName::BitSequence;
    }
    if cleaned == "ObjectArray" {
        return ParsedTypeName::PolySequence;
    }
    if cleaned == "WeakRef" || container_inner(cleaned, "WeakRef").is_some() {
        return ParsedTypeName::WeakRef;
    }
    if cleaned == "string" {
        return ParsedTypeName::OwnedText;
    }
    if cleaned == "Text" {
        return ParsedTypeName::LibText;
    }

    match cleaned {
        "char" | "signed char" => ParsedTypeName::Char,
        "unsigned char" => ParsedTypeName::Scalar(ScalarKind::U8),
        "bool" => ParsedTypeName::Scalar(ScalarKind::Bool),
        "short" | "short int" | "int16_t" => ParsedTypeName::Scalar(ScalarKind::I16),
        "unsigned short" | "unsigned short int" | "uint16_t" => {
            ParsedTypeName::Scalar(ScalarKind::U16)
        }
        "int" | "int32_t" => ParsedTypeName::Scalar(ScalarKind::I32),
        "unsigned int" | "unsigned" | "uint32_t" => ParsedTypeName::Scalar(ScalarKind::U32),
        "long" | "long int" | "long long" | "long long int" | "int64_t" => {
            ParsedTypeName::Scalar(ScalarKind::I64)
        }
        "unsigned long" | "unsigned long int" | "unsigned long long"
        | "unsigned long long int" | "uint64_t" | "size_t" => {
            ParsedTypeName::Scalar(ScalarKind::U64)
        }
        "int8_t" => ParsedTypeName::Scalar(ScalarKind::I8),
        "uint8_t" => ParsedTypeName::Scalar(ScalarKind::U8),
        "float" | "float32_t" => ParsedTypeName::Scalar(ScalarKind::F32),
        "double" | "float64_t" => ParsedTypeName::Scalar(ScalarKind::F64),
        other => ParsedTypeName::Composite(other.to_string()),
    }
}

/// Return the `T` of `prefix<T>`, or `None` when `name` is not that container.
fn container_inner<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('<')?;
    let rest = rest.strip_suffix('>')?;
    Some(rest.trim())
}

/// Parse a `[n][4]`-style shape annotation into a dimension chain.
///
/// Any text before the first bracket (typically the leaf name itself) is
/// ignored. Digit groups become constant extents, identifier groups name
/// sibling counter fields. Malformed annotations yield `None`.
pub fn parse_shape(annotation: &str) -> Option<Vec<DimSpec>> {
    let start = annotation.find('[')?;
    let mut dims = Vec::new();
    let mut rest = annotation[start..].trim();

    while !rest.is_empty() {
        let inner_end = rest.find(']')?;
        let inner = rest[1..inner_end].trim();
        if inner.is_empty() {
            return None;
        }
        if inner.chars().all(|c| c.is_ascii_digit()) {
            dims.push(DimSpec::Const(inner.parse().ok()?));
        } else if inner.chars().all(|c| c.is_alphanumeric() || c == '_') {
            dims.push(DimSpec::Counter(inner.to_string()));
        } else {
            return None;
        }
        rest = rest[inner_end + 1..].trim();
        if !rest.is_empty() && !rest.starts_with('[') {
            return None;
        }
    }

    if dims.is_empty() {
        None
    } else {
        Some(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_aliases() {
        assert_eq!(parse_type_name("int"), ParsedTypeName::Scalar(ScalarKind::I32));
        assert_eq!(
            parse_type_name("unsigned int"),
            ParsedTypeName::Scalar(ScalarKind::U32)
        );
        assert_eq!(
            parse_type_name("uint64_t"),
            ParsedTypeName::Scalar(ScalarKind::U64)
        );
        assert_eq!(parse_type_name("double"), ParsedTypeName::Scalar(ScalarKind::F64));
        assert_eq!(parse_type_name("char"), ParsedTypeName::Char);
    }

    #[test]
    fn test_qualifiers_stripped() {
        assert_eq!(
            parse_type_name("const unsigned int"),
            ParsedTypeName::Scalar(ScalarKind::U32)
        );
        assert_eq!(
            parse_type_name("volatile const float"),
            ParsedTypeName::Scalar(ScalarKind::F32)
        );
    }

    #[test]
    fn test_pointer_suffixes_nest() {
        let parsed = parse_type_name("Track*");
        assert_eq!(
            parsed,
            ParsedTypeName::Pointer(Box::new(ParsedTypeName::Composite("Track".to_string())))
        );

        let double_ptr = parse_type_name("const Track**");
        match double_ptr {
            ParsedTypeName::Pointer(inner) => {
                assert!(matches!(*inner, ParsedTypeName::Pointer(_)));
            }
            other => panic!("expected nested pointer, got {other:?}"),
        }
    }

    #[test]
    fn test_containers() {
        assert_eq!(
            parse_type_name("vector<float>"),
            ParsedTypeName::DynSequence(Box::new(ParsedTypeName::Scalar(ScalarKind::F32)))
        );
        assert_eq!(parse_type_name("vector<bool>"), ParsedTypeName::BitSequence);
        assert_eq!(parse_type_name("BitVec"), ParsedTypeName::BitSequence);
        assert_eq!(parse_type_name("ObjectArray"), ParsedTypeName::PolySequence);
        assert_eq!(parse_type_name("WeakRef"), ParsedTypeName::WeakRef);
        assert_eq!(parse_type_name("WeakRef<Track>"), ParsedTypeName::WeakRef);
    }

    #[test]
    fn test_text_types() {
        assert_eq!(parse_type_name("string"), ParsedTypeName::OwnedText);
        assert_eq!(parse_type_name("Text"), ParsedTypeName::LibText);
    }

    #[test]
    fn test_unknown_is_composite() {
        assert_eq!(
            parse_type_name("Event"),
            ParsedTypeName::Composite("Event".to_string())
        );
    }

    #[test]
    fn test_shape_annotations() {
        assert_eq!(
            parse_shape("x[n][4]"),
            Some(vec![DimSpec::Counter("n".to_string()), DimSpec::Const(4)])
        );
        assert_eq!(parse_shape("[12]"), Some(vec![DimSpec::Const(12)]));
        assert_eq!(parse_shape("plain title"), None);
        assert_eq!(parse_shape("bad[n"), None);
        assert_eq!(parse_shape("x[]"), None);
    }
}
