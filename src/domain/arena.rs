use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};

/// One element of the configuration document.
///
/// Elements live in the [`Document`] arena and reference each other by
/// [`Index`]. A child is owned by exactly one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    /// Ordered attribute list, keys unique
    attributes: Vec<(String, String)>,
    text: Option<String>,
    parent: Option<Index>,
    children: Vec<Index>,
}

impl Element {
    fn new(tag: impl Into<String>, parent: Option<Index>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            text: None,
            parent,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn has_attribute(&self, name: &str, value: &str) -> bool {
        self.attribute(name) == Some(value)
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn parent(&self) -> Option<Index> {
        self.parent
    }

    pub fn children(&self) -> &[Index] {
        &self.children
    }

    /// Returns true if the stored value changed.
    fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) if existing == value => false,
            Some((_, existing)) => {
                *existing = value.to_string();
                true
            }
            None => {
                self.attributes.push((name.to_string(), value.to_string()));
                true
            }
        }
    }

    fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(k, _)| k != name);
        before != self.attributes.len()
    }
}

/// Detached element subtree, built before it is inserted into a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Set an attribute, overwriting an existing value of the same name.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    pub fn attr_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: Fragment) -> Self {
        self.children.push(child);
        self
    }
}

/// Arena-backed configuration document.
///
/// Uses a generational arena so that handles to removed elements are detected
/// as stale instead of silently pointing at a reused slot. Every structural
/// change bumps [`Document::revision`].
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<Element>,
    root: Index,
    revision: u64,
}

impl Document {
    pub fn new(root_tag: impl Into<String>) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(Element::new(root_tag, None));
        Self {
            arena,
            root,
            revision: 0,
        }
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn get(&self, idx: Index) -> Option<&Element> {
        self.arena.get(idx)
    }

    pub fn contains(&self, idx: Index) -> bool {
        self.arena.contains(idx)
    }

    /// Number of elements in the document.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Monotonic counter of structural changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn element_mut(&mut self, idx: Index) -> DomainResult<&mut Element> {
        self.arena.get_mut(idx).ok_or(DomainError::DetachedNode)
    }

    /// Children of `idx`; empty if the element does not exist.
    pub fn children(&self, idx: Index) -> &[Index] {
        self.arena.get(idx).map(|e| e.children()).unwrap_or(&[])
    }

    /// Append an empty element with `tag` as the last child of `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn append_child(&mut self, parent: Index, tag: &str) -> DomainResult<Index> {
        if !self.arena.contains(parent) {
            return Err(DomainError::DetachedNode);
        }
        let idx = self.arena.insert(Element::new(tag, Some(parent)));
        self.element_mut(parent)?.children.push(idx);
        self.touch();
        Ok(idx)
    }

    /// Insert a detached subtree as the last child of `parent`.
    pub fn append_fragment(&mut self, parent: Index, fragment: &Fragment) -> DomainResult<Index> {
        let idx = self.append_child(parent, &fragment.tag)?;
        {
            let element = self.element_mut(idx)?;
            element.attributes = fragment.attributes.clone();
            element.text = fragment.text.clone();
        }
        for child in &fragment.children {
            self.append_fragment(idx, child)?;
        }
        Ok(idx)
    }

    pub fn set_attribute(&mut self, idx: Index, name: &str, value: &str) -> DomainResult<()> {
        if self.element_mut(idx)?.set_attribute(name, value) {
            self.touch();
        }
        Ok(())
    }

    /// Remove an attribute; no-op when the element or attribute is absent.
    pub fn remove_attribute(&mut self, idx: Index, name: &str) -> bool {
        let removed = self
            .arena
            .get_mut(idx)
            .map(|e| e.remove_attribute(name))
            .unwrap_or(false);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_text(&mut self, idx: Index, text: Option<String>) -> DomainResult<()> {
        let element = self.element_mut(idx)?;
        if element.text != text {
            element.text = text;
            self.touch();
        }
        Ok(())
    }

    /// Append to an element's text (used while parsing split text events).
    pub(crate) fn push_text(&mut self, idx: Index, text: &str) -> DomainResult<()> {
        let element = self.element_mut(idx)?;
        match element.text.as_mut() {
            Some(existing) => existing.push_str(text),
            None => element.text = Some(text.to_string()),
        }
        self.touch();
        Ok(())
    }

    /// Remove an element and its whole subtree.
    ///
    /// The root cannot be removed. Returns false if nothing was removed.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, idx: Index) -> bool {
        if idx == self.root {
            return false;
        }
        let Some(parent) = self.arena.get(idx).map(|e| e.parent) else {
            return false;
        };
        if let Some(parent) = parent.and_then(|p| self.arena.get_mut(p)) {
            parent.children.retain(|&c| c != idx);
        }
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            if let Some(element) = self.arena.remove(current) {
                stack.extend(element.children);
            }
        }
        self.touch();
        true
    }

    /// Remove all children, or only those with `tag`. Returns the count removed.
    pub fn remove_children(&mut self, idx: Index, tag: Option<&str>) -> usize {
        let doomed: Vec<Index> = self
            .children(idx)
            .iter()
            .copied()
            .filter(|&c| match tag {
                Some(t) => self.get(c).map(|e| e.tag() == t).unwrap_or(false),
                None => true,
            })
            .collect();
        doomed.into_iter().filter(|&c| self.remove(c)).count()
    }

    /// Stable move of every child tagged `tag` to the end of `idx`'s children.
    ///
    /// Moved children keep their relative order, and so does the remainder.
    /// Returns true if the order changed.
    pub fn move_all_to_end(&mut self, idx: Index, tag: &str) -> bool {
        let arena = &self.arena;
        let Some(element) = arena.get(idx) else {
            return false;
        };
        let (matching, rest): (Vec<Index>, Vec<Index>) = element
            .children
            .iter()
            .partition(|&&c| arena.get(c).map(|e| e.tag() == tag).unwrap_or(false));
        let reordered: Vec<Index> = rest.into_iter().chain(matching).collect();
        if reordered == element.children {
            return false;
        }
        if let Some(element) = self.arena.get_mut(idx) {
            element.children = reordered;
        }
        self.touch();
        true
    }

    /// Replace the child order of `idx` with a permutation of its children.
    pub fn reorder_children(&mut self, idx: Index, order: Vec<Index>) -> DomainResult<()> {
        let element = self.element_mut(idx)?;
        let mut current = element.children.clone();
        let mut proposed = order.clone();
        current.sort_by_key(|i| i.into_raw_parts());
        proposed.sort_by_key(|i| i.into_raw_parts());
        if current != proposed {
            return Err(DomainError::MalformedDocument(
                "reordering must keep the same set of children".to_string(),
            ));
        }
        if element.children != order {
            element.children = order;
            self.touch();
        }
        Ok(())
    }

    /// Copy a subtree out of the document.
    pub fn to_fragment(&self, idx: Index) -> Option<Fragment> {
        let element = self.get(idx)?;
        Some(Fragment {
            tag: element.tag.clone(),
            attributes: element.attributes.clone(),
            text: element.text.clone(),
            children: element
                .children
                .iter()
                .filter_map(|&c| self.to_fragment(c))
                .collect(),
        })
    }

    /// Pre-order iteration over the subtree rooted at `idx`.
    pub fn descendants(&self, idx: Index) -> DescendantIterator<'_> {
        DescendantIterator::new(self, idx)
    }

    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, idx: Index) -> usize {
        match self.get(idx) {
            Some(element) => {
                1 + element
                    .children
                    .iter()
                    .map(|&child| self.calculate_depth(child))
                    .max()
                    .unwrap_or(0)
            }
            None => 0,
        }
    }
}

pub struct DescendantIterator<'a> {
    document: &'a Document,
    stack: Vec<Index>,
}

impl<'a> DescendantIterator<'a> {
    fn new(document: &'a Document, start: Index) -> Self {
        let stack = if document.contains(start) {
            vec![start]
        } else {
            Vec::new()
        };
        Self { document, stack }
    }
}

impl<'a> Iterator for DescendantIterator<'a> {
    type Item = (Index, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let element = self.document.get(current)?;
        // Push children in reverse order for left-to-right traversal
        for &child in element.children.iter().rev() {
            self.stack.push(child);
        }
        Some((current, element))
    }
}
