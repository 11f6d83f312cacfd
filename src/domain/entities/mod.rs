//! Typed views over the configuration document.
//!
//! A view is a [`TreeRef`] plus an element [`Index`]. Views own no state:
//! reads and writes go straight to the session's single document, so a change
//! made through one view is visible through every other view. Views borrow
//! the session, so none of them can outlive it.

use std::cell::RefCell;
use std::fmt;

use generational_arena::Index;

use crate::domain::arena::Document;
use crate::domain::ensurance::Ensurance;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::navigator::PossiblyMissing;

pub mod agent;
pub mod artifact;
pub mod job;
pub mod material;
pub mod pipeline;
pub mod root;
pub mod stage;
pub mod task;
pub mod variables;

pub use agent::Agent;
pub use artifact::{Artifact, ArtifactKind, FetchArtifactSrc};
pub use job::{Job, Tab};
pub use material::{GitMaterial, Material, PipelineMaterial};
pub use pipeline::{Pipeline, PipelineGroup, PipelineOwner};
pub use root::ConfigRoot;
pub use stage::Stage;
pub use task::{ExecTask, FetchArtifactTask, RakeTask, RunIf, Task};
pub use variables::{HasEnvironmentVariables, HasResources, VariableKind};

/// Label template applied by `Pipeline::set_default_label_template`.
pub const DEFAULT_LABEL_TEMPLATE: &str = "0.${COUNT}";

/// Values the facade needs but the document does not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDefaults {
    pub label_template: String,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            label_template: DEFAULT_LABEL_TEMPLATE.to_string(),
        }
    }
}

/// Shared, non-owning access to a session's document.
#[derive(Clone, Copy)]
pub struct TreeRef<'a> {
    document: &'a RefCell<Document>,
    defaults: &'a ConfigDefaults,
}

impl fmt::Debug for TreeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeRef")
            .field("defaults", self.defaults)
            .finish_non_exhaustive()
    }
}

impl<'a> TreeRef<'a> {
    pub fn new(document: &'a RefCell<Document>, defaults: &'a ConfigDefaults) -> Self {
        Self { document, defaults }
    }

    pub fn defaults(&self) -> &'a ConfigDefaults {
        self.defaults
    }

    pub fn root(&self) -> ConfigRoot<'a> {
        ConfigRoot::new(*self)
    }

    pub(crate) fn root_index(&self) -> Index {
        self.document.borrow().root()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.document.borrow())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.document.borrow_mut())
    }

    pub(crate) fn navigate<R>(&self, node: Index, f: impl FnOnce(PossiblyMissing<'_>) -> R) -> R {
        let document = self.document.borrow();
        f(PossiblyMissing::new(&document, node))
    }

    pub(crate) fn ensure<R>(
        &self,
        node: Index,
        f: impl FnOnce(Ensurance<'_>) -> DomainResult<R>,
    ) -> DomainResult<R> {
        let mut document = self.document.borrow_mut();
        f(Ensurance::new(&mut document, node)?)
    }

    pub(crate) fn attribute(&self, node: Index, name: &str) -> Option<String> {
        self.navigate(node, |nav| nav.attribute(name).map(str::to_string))
    }

    /// Attribute that must be present; absence is a lookup error.
    pub(crate) fn required_attribute(
        &self,
        node: Index,
        name: &str,
        context: impl FnOnce() -> String,
    ) -> DomainResult<String> {
        self.attribute(node, name)
            .ok_or_else(|| DomainError::lookup(format!("attribute \"{name}\""), context()))
    }

    pub(crate) fn set_attribute(&self, node: Index, name: &str, value: &str) -> DomainResult<()> {
        self.write(|doc| doc.set_attribute(node, name, value))
    }

    pub(crate) fn remove_attribute(&self, node: Index, name: &str) {
        self.write(|doc| doc.remove_attribute(node, name));
    }

    pub(crate) fn remove(&self, node: Index) -> bool {
        self.write(|doc| doc.remove(node))
    }

    /// Remove `tag` children of `parent` that have no children left.
    pub(crate) fn prune_empty(&self, parent: Index, tag: &str) {
        for idx in self.children_named(parent, tag) {
            if self.read(|doc| doc.children(idx).is_empty()) {
                self.remove(idx);
            }
        }
    }

    pub(crate) fn children_named(&self, node: Index, tag: &str) -> Vec<Index> {
        self.navigate(node, |nav| nav.find_all(tag))
    }

    pub(crate) fn canonical(&self, node: Index) -> String {
        self.read(|doc| {
            if doc.contains(node) {
                doc.canonical_xml(node)
            } else {
                String::new()
            }
        })
    }
}

/// A view backed by one element of the document.
pub trait EntityNode<'a>: Copy {
    fn tree(&self) -> TreeRef<'a>;

    fn node(&self) -> Index;

    /// False once the element has been removed from the document.
    fn is_attached(&self) -> bool {
        let node = self.node();
        self.tree().read(|doc| doc.contains(node))
    }
}

/// Concrete kind of a node-backed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    PipelineGroup,
    Pipeline,
    Template,
    Stage,
    Job,
    Agent,
}

/// Structural equality for node-backed entities.
///
/// Two entities are equal when they are of the same kind and their subtrees
/// serialize identically. Node identity and parent are not compared.
pub trait StructuralEq {
    fn kind(&self) -> EntityKind;

    fn canonical_form(&self) -> String;

    fn structurally_eq(&self, other: &dyn StructuralEq) -> bool {
        self.kind() == other.kind() && self.canonical_form() == other.canonical_form()
    }
}

macro_rules! structural_partial_eq {
    ($($entity:ident),* $(,)?) => {
        $(
            impl PartialEq for $entity<'_> {
                fn eq(&self, other: &Self) -> bool {
                    self.structurally_eq(other)
                }
            }
        )*
    };
}

structural_partial_eq!(PipelineGroup, Pipeline, Stage, Job, Agent);

macro_rules! entity_node {
    ($($entity:ident),* $(,)?) => {
        $(
            impl<'a> EntityNode<'a> for $entity<'a> {
                fn tree(&self) -> TreeRef<'a> {
                    self.tree
                }

                fn node(&self) -> Index {
                    self.node
                }
            }
        )*
    };
}

entity_node!(PipelineGroup, Pipeline, Stage, Job, Agent);

/// Short description used as the context of lookup errors.
pub(crate) fn describe<'a>(entity: &impl EntityNode<'a>, kind: &str, key: &str) -> String {
    match entity.tree().attribute(entity.node(), key) {
        Some(value) => format!("{kind} \"{value}\""),
        None => kind.to_string(),
    }
}
