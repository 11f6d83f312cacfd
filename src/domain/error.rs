//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of the configuration document's shape.
/// These are independent of store and transport concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required attribute or substructure is absent.
    #[error("{context} does not have {what}")]
    StructuralLookup { what: String, context: String },

    /// A node's tag does not belong to a known task/material/artifact kind.
    #[error("don't know {family} type {tag}")]
    UnknownVariant { family: &'static str, tag: String },

    /// A value outside a closed set was supplied.
    #[error("invalid {field} \"{value}\" - it must be one of {allowed:?}")]
    InvalidEnumeration {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },

    /// The node behind a view was removed from the document.
    #[error("element is no longer part of the document")]
    DetachedNode,

    #[error("malformed configuration document: {0}")]
    MalformedDocument(String),
}

impl DomainError {
    pub fn lookup(what: impl Into<String>, context: impl Into<String>) -> Self {
        Self::StructuralLookup {
            what: what.into(),
            context: context.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
