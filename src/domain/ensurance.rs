//! Find-or-create operations on the document tree.
//!
//! Every `ensure_*` call leaves exactly one matching child behind, no matter
//! how often it is repeated. `append` is the only unconditional insert.

use generational_arena::Index;
use tracing::trace;

use crate::domain::arena::{Document, Element, Fragment};
use crate::domain::error::{DomainError, DomainResult};

/// Write cursor positioned on one element.
#[derive(Debug)]
pub struct Ensurance<'d> {
    document: &'d mut Document,
    node: Index,
}

impl<'d> Ensurance<'d> {
    pub fn new(document: &'d mut Document, node: Index) -> DomainResult<Self> {
        if !document.contains(node) {
            return Err(DomainError::DetachedNode);
        }
        Ok(Self { document, node })
    }

    pub fn index(&self) -> Index {
        self.node
    }

    fn first_child_matching(&self, predicate: impl Fn(&Element) -> bool) -> Option<Index> {
        self.document
            .children(self.node)
            .iter()
            .copied()
            .find(|&c| self.document.get(c).map(&predicate).unwrap_or(false))
    }

    /// First child with `tag`, created and appended if there is none.
    pub fn ensure_child(self, tag: &str) -> DomainResult<Ensurance<'d>> {
        let node = match self.first_child_matching(|e| e.tag() == tag) {
            Some(existing) => existing,
            None => {
                trace!("ensure_child: creating <{}>", tag);
                self.document.append_child(self.node, tag)?
            }
        };
        Ok(Ensurance {
            document: self.document,
            node,
        })
    }

    /// First child with `tag` whose `name` attribute equals `value`.
    ///
    /// A child with the same tag but a different value does not match; a new
    /// sibling carrying the attribute is appended instead.
    pub fn ensure_child_with_attribute(
        self,
        tag: &str,
        name: &str,
        value: &str,
    ) -> DomainResult<Ensurance<'d>> {
        let node = match self.first_child_matching(|e| e.tag() == tag && e.has_attribute(name, value)) {
            Some(existing) => existing,
            None => {
                trace!("ensure_child_with_attribute: creating <{} {}=\"{}\">", tag, name, value);
                let created = self.document.append_child(self.node, tag)?;
                self.document.set_attribute(created, name, value)?;
                created
            }
        };
        Ok(Ensurance {
            document: self.document,
            node,
        })
    }

    pub fn set(self, name: &str, value: &str) -> DomainResult<Self> {
        self.document.set_attribute(self.node, name, value)?;
        Ok(self)
    }

    pub fn set_text(self, text: &str) -> DomainResult<Self> {
        self.document.set_text(self.node, Some(text.to_string()))?;
        Ok(self)
    }

    /// Unconditionally append a subtree; the caller owns duplicate checks.
    pub fn append(&mut self, fragment: &Fragment) -> DomainResult<Index> {
        self.document.append_fragment(self.node, fragment)
    }
}
