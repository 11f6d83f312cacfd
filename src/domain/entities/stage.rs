use generational_arena::Index;

use crate::domain::entities::job::Job;
use crate::domain::entities::variables::HasEnvironmentVariables;
use crate::domain::entities::{describe, EntityKind, EntityNode, StructuralEq, TreeRef};
use crate::domain::error::{DomainError, DomainResult};

/// A pipeline stage; its jobs run in parallel.
#[derive(Debug, Clone, Copy)]
pub struct Stage<'a> {
    pub(super) tree: TreeRef<'a>,
    pub(super) node: Index,
}

impl<'a> Stage<'a> {
    pub(crate) fn new(tree: TreeRef<'a>, node: Index) -> Self {
        Self { tree, node }
    }

    fn context(&self) -> String {
        describe(self, "stage", "name")
    }

    pub fn name(&self) -> DomainResult<String> {
        self.tree.required_attribute(self.node, "name", || self.context())
    }

    pub fn jobs(&self) -> Vec<Job<'a>> {
        let tree = self.tree;
        tree.navigate(self.node, |nav| nav.possibly_missing_child("jobs").find_all("job"))
            .into_iter()
            .map(|idx| Job::new(tree, idx))
            .collect()
    }

    pub fn find_job(&self, name: &str) -> DomainResult<Job<'a>> {
        self.jobs()
            .into_iter()
            .find(|j| self.tree.attribute(j.node(), "name").as_deref() == Some(name))
            .ok_or_else(|| DomainError::lookup(format!("job \"{name}\""), self.context()))
    }

    pub fn ensure_job(&self, name: &str) -> DomainResult<Job<'a>> {
        let idx = self.tree.ensure(self.node, |e| {
            Ok(e.ensure_child("jobs")?
                .ensure_child_with_attribute("job", "name", name)?
                .index())
        })?;
        Ok(Job::new(self.tree, idx))
    }

    pub fn ensure_removal_of_job(&self, name: &str) -> Self {
        for job in self.jobs() {
            if self.tree.attribute(job.node(), "name").as_deref() == Some(name) {
                self.tree.remove(job.node());
            }
        }
        self.tree.prune_empty(self.node, "jobs");
        *self
    }

    pub fn clean_working_dir(&self) -> bool {
        self.tree
            .navigate(self.node, |nav| nav.has_attribute("cleanWorkingDir", "true"))
    }

    pub fn set_clean_working_dir(&self) -> DomainResult<Self> {
        self.tree.set_attribute(self.node, "cleanWorkingDir", "true")?;
        Ok(*self)
    }

    pub fn has_manual_approval(&self) -> bool {
        self.tree.navigate(self.node, |nav| {
            nav.possibly_missing_child("approval")
                .has_attribute("type", "manual")
        })
    }

    pub fn set_has_manual_approval(&self) -> DomainResult<Self> {
        self.tree.ensure(self.node, |e| {
            e.ensure_child_with_attribute("approval", "type", "manual")?;
            Ok(())
        })?;
        Ok(*self)
    }

    /// Materials are fetched unless explicitly switched off.
    pub fn fetch_materials(&self) -> bool {
        !self
            .tree
            .navigate(self.node, |nav| nav.has_attribute("fetchMaterials", "false"))
    }

    pub fn set_fetch_materials(&self, fetch: bool) -> DomainResult<Self> {
        if fetch {
            self.tree.remove_attribute(self.node, "fetchMaterials");
        } else {
            self.tree.set_attribute(self.node, "fetchMaterials", "false")?;
        }
        Ok(*self)
    }
}

impl<'a> HasEnvironmentVariables<'a> for Stage<'a> {}

impl StructuralEq for Stage<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Stage
    }

    fn canonical_form(&self) -> String {
        self.tree.canonical(self.node)
    }
}
