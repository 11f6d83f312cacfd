//! Read-only traversal that treats absent children as empty.

use generational_arena::Index;

use crate::domain::arena::{Document, Element};

/// Cursor over an element that may not exist.
///
/// Every lookup on a missing element yields another missing cursor, an empty
/// list, or `false`. Nothing here fails and nothing mutates the document.
#[derive(Debug, Clone, Copy)]
pub struct PossiblyMissing<'d> {
    document: &'d Document,
    node: Option<Index>,
}

impl<'d> PossiblyMissing<'d> {
    pub fn new(document: &'d Document, node: Index) -> Self {
        let node = document.contains(node).then_some(node);
        Self { document, node }
    }

    pub fn missing(document: &'d Document) -> Self {
        Self {
            document,
            node: None,
        }
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    pub fn index(&self) -> Option<Index> {
        self.node
    }

    pub fn exists(&self) -> bool {
        self.node.is_some()
    }

    pub fn element(&self) -> Option<&'d Element> {
        self.node.and_then(|n| self.document.get(n))
    }

    /// First child with `tag`.
    pub fn possibly_missing_child(&self, tag: &str) -> PossiblyMissing<'d> {
        let child = self.find_all(tag).into_iter().next();
        Self {
            document: self.document,
            node: child,
        }
    }

    /// All children with `tag`, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<Index> {
        self.iter()
            .into_iter()
            .filter(|&c| {
                self.document
                    .get(c)
                    .map(|e| e.tag() == tag)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// All children regardless of tag.
    pub fn iter(&self) -> Vec<Index> {
        self.node
            .map(|n| self.document.children(n).to_vec())
            .unwrap_or_default()
    }

    pub fn attribute(&self, name: &str) -> Option<&'d str> {
        self.element().and_then(|e| e.attribute(name))
    }

    /// True only if the element exists and `name` equals `value`.
    pub fn has_attribute(&self, name: &str, value: &str) -> bool {
        self.attribute(name) == Some(value)
    }

    pub fn text(&self) -> Option<&'d str> {
        self.element().and_then(|e| e.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::parse(
            r#"<job name="j"><tasks><exec command="a"/><exec command="b"/><rake target="t"/></tasks></job>"#,
        )
        .unwrap()
    }

    #[test]
    fn given_missing_path_when_navigating_then_everything_is_empty() {
        let doc = sample();
        let nav = PossiblyMissing::new(&doc, doc.root());

        let missing = nav.possibly_missing_child("artifacts").possibly_missing_child("artifact");

        assert!(!missing.exists());
        assert!(missing.iter().is_empty());
        assert!(missing.find_all("artifact").is_empty());
        assert!(!missing.has_attribute("src", "x"));
        assert_eq!(missing.text(), None);
    }

    #[test]
    fn given_existing_children_when_find_all_then_returns_in_order() {
        let doc = sample();
        let tasks = PossiblyMissing::new(&doc, doc.root()).possibly_missing_child("tasks");

        let execs = tasks.find_all("exec");

        assert_eq!(execs.len(), 2);
        assert_eq!(tasks.iter().len(), 3);
        assert!(PossiblyMissing::new(&doc, execs[1]).has_attribute("command", "b"));
    }

    #[test]
    fn given_attribute_with_other_value_when_has_attribute_then_false() {
        let doc = sample();
        let job = PossiblyMissing::new(&doc, doc.root());

        assert!(job.has_attribute("name", "j"));
        assert!(!job.has_attribute("name", "k"));
        assert!(!job.has_attribute("timeout", "j"));
    }
}
