//! Change detection between two document snapshots.
//!
//! Snapshots are compared by their canonical rendering: attributes sorted,
//! formatting normalized. Callers pass snapshots that went through the
//! reordering pass, so child order differences the server would not care
//! about are gone before the comparison.

use tracing::debug;

use crate::domain::arena::Document;
use crate::domain::error::DomainResult;
use crate::domain::reorder::reorder_document;

/// Canonical rendering of a serialized document.
pub fn canonical_form(xml: &str) -> DomainResult<String> {
    let document = Document::parse(xml)?;
    Ok(document.canonical_xml(document.root()))
}

/// Canonical rendering after running the reordering pass.
pub fn reordered_canonical_form(xml: &str) -> DomainResult<String> {
    let mut document = Document::parse(xml)?;
    reorder_document(&mut document)?;
    Ok(document.canonical_xml(document.root()))
}

/// True if the two snapshots differ in substance.
pub fn has_changes(before: &str, after: &str) -> DomainResult<bool> {
    let changed = canonical_form(before)? != canonical_form(after)?;
    debug!("has_changes: changed={}", changed);
    Ok(changed)
}
