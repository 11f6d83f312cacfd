use std::collections::BTreeSet;

use generational_arena::Index;
use tracing::debug;

use crate::domain::arena::{Document, Fragment};
use crate::domain::entities::artifact::Artifact;
use crate::domain::entities::task::Task;
use crate::domain::entities::variables::{HasEnvironmentVariables, HasResources};
use crate::domain::entities::{describe, EntityKind, StructuralEq, TreeRef};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::navigator::PossiblyMissing;

/// A custom tab shown on the job's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tab {
    name: String,
    path: String,
}

impl Tab {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn from_element(document: &Document, idx: Index) -> DomainResult<Self> {
        let nav = PossiblyMissing::new(document, idx);
        let required = |name: &str| {
            nav.attribute(name)
                .map(str::to_string)
                .ok_or_else(|| DomainError::lookup(format!("attribute \"{name}\""), "tab"))
        };
        Ok(Self {
            name: required("name")?,
            path: required("path")?,
        })
    }

    fn to_fragment(&self) -> Fragment {
        Fragment::new("tab")
            .attr("name", self.name.as_str())
            .attr("path", self.path.as_str())
    }
}

/// A unit of work inside a stage.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub(super) tree: TreeRef<'a>,
    pub(super) node: Index,
}

impl<'a> Job<'a> {
    pub(crate) fn new(tree: TreeRef<'a>, node: Index) -> Self {
        Self { tree, node }
    }

    fn context(&self) -> String {
        describe(self, "job", "name")
    }

    fn section(&self, tag: &str) -> Vec<Index> {
        self.tree
            .navigate(self.node, |nav| nav.possibly_missing_child(tag).iter())
    }

    pub fn name(&self) -> DomainResult<String> {
        self.tree.required_attribute(self.node, "name", || self.context())
    }

    /// Minutes without console output before the job is cancelled.
    pub fn timeout(&self) -> DomainResult<String> {
        self.tree.required_attribute(self.node, "timeout", || self.context())
    }

    pub fn set_timeout(&self, timeout: &str) -> DomainResult<Self> {
        self.tree.set_attribute(self.node, "timeout", timeout)?;
        Ok(*self)
    }

    pub fn runs_on_all_agents(&self) -> bool {
        self.tree
            .navigate(self.node, |nav| nav.has_attribute("runOnAllAgents", "true"))
    }

    pub fn set_runs_on_all_agents(&self, run_on_all_agents: bool) -> DomainResult<Self> {
        let value = if run_on_all_agents { "true" } else { "false" };
        self.tree.set_attribute(self.node, "runOnAllAgents", value)?;
        Ok(*self)
    }

    pub fn artifacts(&self) -> DomainResult<BTreeSet<Artifact>> {
        let elements = self.section("artifacts");
        self.tree.read(|doc| {
            elements
                .into_iter()
                .map(|e| Artifact::from_element(doc, e))
                .collect()
        })
    }

    /// Add the artifacts that are not there yet.
    pub fn ensure_artifacts(&self, artifacts: &BTreeSet<Artifact>) -> DomainResult<Self> {
        if artifacts.is_empty() {
            return Ok(*self);
        }
        let existing = self.artifacts()?;
        self.tree.ensure(self.node, |e| {
            let mut section = e.ensure_child("artifacts")?;
            for artifact in artifacts.difference(&existing) {
                section.append(&artifact.to_fragment())?;
            }
            Ok(())
        })?;
        Ok(*self)
    }

    pub fn tabs(&self) -> DomainResult<Vec<Tab>> {
        let elements = self.tree.navigate(self.node, |nav| {
            nav.possibly_missing_child("tabs").find_all("tab")
        });
        self.tree
            .read(|doc| elements.into_iter().map(|e| Tab::from_element(doc, e)).collect())
    }

    pub fn ensure_tab(&self, tab: &Tab) -> DomainResult<Self> {
        let present = self.tabs()?.contains(tab);
        self.tree.ensure(self.node, |e| {
            let mut section = e.ensure_child("tabs")?;
            if !present {
                section.append(&tab.to_fragment())?;
            }
            Ok(())
        })?;
        Ok(*self)
    }

    pub fn tasks(&self) -> DomainResult<Vec<Task>> {
        let elements = self.section("tasks");
        self.tree.read(|doc| {
            elements
                .into_iter()
                .map(|e| Task::from_element(doc, e))
                .collect()
        })
    }

    /// Append `task`, even if an identical one is already there.
    pub fn add_task(&self, task: &Task) -> DomainResult<Self> {
        debug!("add_task: job={}, type={}", self.context(), task.type_name());
        self.tree.ensure(self.node, |e| {
            e.ensure_child("tasks")?.append(&task.to_fragment())?;
            Ok(())
        })?;
        Ok(*self)
    }

    /// Append `task` unless an identical one is already there.
    pub fn ensure_task(&self, task: &Task) -> DomainResult<Self> {
        if self.tasks()?.contains(task) {
            return Ok(*self);
        }
        self.add_task(task)
    }

    pub fn remove_tasks(&self) -> Self {
        let node = self.node;
        self.tree.write(|doc| doc.remove_children(node, Some("tasks")));
        *self
    }
}

impl<'a> HasEnvironmentVariables<'a> for Job<'a> {}

impl<'a> HasResources<'a> for Job<'a> {}

impl StructuralEq for Job<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::Job
    }

    fn canonical_form(&self) -> String {
        self.tree.canonical(self.node)
    }
}
