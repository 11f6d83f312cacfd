use generational_arena::Index;

use crate::domain::entities::variables::HasResources;
use crate::domain::entities::{describe, EntityKind, StructuralEq, TreeRef};
use crate::domain::error::DomainResult;

/// A build agent registered with the server.
#[derive(Debug, Clone, Copy)]
pub struct Agent<'a> {
    pub(super) tree: TreeRef<'a>,
    pub(super) node: Index,
}

impl<'a> Agent<'a> {
    pub(crate) fn new(tree: TreeRef<'a>, node: Index) -> Self {
        Self { tree, node }
    }

    fn required(&self, name: &str) -> DomainResult<String> {
        self.tree
            .required_attribute(self.node, name, || describe(self, "agent", "hostname"))
    }

    pub fn hostname(&self) -> DomainResult<String> {
        self.required("hostname")
    }

    pub fn ip_address(&self) -> DomainResult<String> {
        self.required("ipaddress")
    }

    pub fn uuid(&self) -> DomainResult<String> {
        self.required("uuid")
    }
}

impl<'a> HasResources<'a> for Agent<'a> {}

impl StructuralEq for Agent<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Agent
    }

    fn canonical_form(&self) -> String {
        self.tree.canonical(self.node)
    }
}
