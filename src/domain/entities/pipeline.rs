use std::collections::BTreeMap;

use generational_arena::Index;
use tracing::debug;

use crate::domain::entities::material::Material;
use crate::domain::entities::root::ConfigRoot;
use crate::domain::entities::stage::Stage;
use crate::domain::entities::variables::HasEnvironmentVariables;
use crate::domain::entities::{describe, EntityKind, EntityNode, StructuralEq, TreeRef};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::navigator::PossiblyMissing;

/// Container a pipeline element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineOwner {
    Group,
    Templates,
}

/// A pipeline, or a template when it lives under `templates`.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline<'a> {
    pub(super) tree: TreeRef<'a>,
    pub(super) node: Index,
    owner: PipelineOwner,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(tree: TreeRef<'a>, node: Index, owner: PipelineOwner) -> Self {
        Self { tree, node, owner }
    }

    fn context(&self) -> String {
        let kind = match self.owner {
            PipelineOwner::Group => "pipeline",
            PipelineOwner::Templates => "template",
        };
        describe(self, kind, "name")
    }

    pub fn name(&self) -> DomainResult<String> {
        self.tree.required_attribute(self.node, "name", || self.context())
    }

    pub fn owner(&self) -> PipelineOwner {
        self.owner
    }

    pub fn is_template(&self) -> bool {
        self.owner == PipelineOwner::Templates
    }

    pub fn has_automatic_pipeline_locking(&self) -> bool {
        self.tree
            .navigate(self.node, |nav| nav.has_attribute("isLocked", "true"))
    }

    pub fn set_automatic_pipeline_locking(&self) -> DomainResult<Self> {
        self.tree.set_attribute(self.node, "isLocked", "true")?;
        Ok(*self)
    }

    pub fn label_template(&self) -> DomainResult<String> {
        self.tree
            .required_attribute(self.node, "labeltemplate", || self.context())
    }

    pub fn set_label_template(&self, label_template: &str) -> DomainResult<Self> {
        self.tree.set_attribute(self.node, "labeltemplate", label_template)?;
        Ok(*self)
    }

    /// Apply the label template configured for the session.
    pub fn set_default_label_template(&self) -> DomainResult<Self> {
        let label_template = self.tree.defaults().label_template.clone();
        self.set_label_template(&label_template)
    }

    pub fn template_name(&self) -> Option<String> {
        self.tree.attribute(self.node, "template")
    }

    pub fn set_template_name(&self, template_name: &str) -> DomainResult<Self> {
        self.tree.set_attribute(self.node, "template", template_name)?;
        Ok(*self)
    }

    pub fn is_based_on_template(&self) -> bool {
        self.template_name().is_some()
    }

    /// The template this pipeline refers to.
    pub fn template(&self) -> DomainResult<Pipeline<'a>> {
        let name = self
            .template_name()
            .ok_or_else(|| DomainError::lookup("a template", self.context()))?;
        ConfigRoot::new(self.tree).find_template(&name)
    }

    pub fn materials(&self) -> DomainResult<Vec<Material>> {
        let elements = self.tree.navigate(self.node, |nav| {
            nav.possibly_missing_child("materials").iter()
        });
        self.tree.read(|doc| {
            elements
                .into_iter()
                .map(|e| Material::from_element(doc, e))
                .collect()
        })
    }

    /// Append `material`, even if an identical one is already there.
    pub fn add_material(&self, material: &Material) -> DomainResult<Self> {
        self.tree.ensure(self.node, |e| {
            e.ensure_child("materials")?.append(&material.to_fragment())?;
            Ok(())
        })?;
        Ok(*self)
    }

    /// Append `material` unless an identical one is already there.
    pub fn ensure_material(&self, material: &Material) -> DomainResult<Self> {
        if self.materials()?.contains(material) {
            return Ok(*self);
        }
        self.add_material(material)
    }

    pub fn remove_materials(&self) -> Self {
        let node = self.node;
        self.tree.write(|doc| doc.remove_children(node, Some("materials")));
        *self
    }

    pub fn parameters(&self) -> BTreeMap<String, String> {
        self.tree.navigate(self.node, |nav| {
            let document = nav.document();
            nav.possibly_missing_child("params")
                .find_all("param")
                .into_iter()
                .filter_map(|p| {
                    let param = PossiblyMissing::new(document, p);
                    let name = param.attribute("name")?;
                    Some((name.to_string(), param.text().unwrap_or_default().to_string()))
                })
                .collect()
        })
    }

    pub fn ensure_parameters(&self, parameters: &BTreeMap<String, String>) -> DomainResult<Self> {
        let tree = self.tree;
        let params = tree.ensure(self.node, |e| Ok(e.ensure_child("params")?.index()))?;
        for (name, value) in parameters {
            tree.ensure(params, |e| {
                e.ensure_child_with_attribute("param", "name", name)?
                    .set_text(value)?;
                Ok(())
            })?;
        }
        Ok(*self)
    }

    pub fn has_timer(&self) -> bool {
        self.tree
            .navigate(self.node, |nav| nav.possibly_missing_child("timer").exists())
    }

    /// Cron expression of the timer trigger.
    pub fn timer(&self) -> DomainResult<String> {
        self.tree
            .navigate(self.node, |nav| {
                let timer = nav.possibly_missing_child("timer");
                timer
                    .exists()
                    .then(|| timer.text().unwrap_or_default().to_string())
            })
            .ok_or_else(|| DomainError::lookup("timer", self.context()))
    }

    pub fn timer_triggers_only_on_changes(&self) -> bool {
        self.tree.navigate(self.node, |nav| {
            nav.possibly_missing_child("timer")
                .has_attribute("onlyOnChanges", "true")
        })
    }

    /// Set the timer, keeping a single `timer` element.
    pub fn set_timer(&self, timer: &str, only_on_changes: bool) -> DomainResult<Self> {
        let tree = self.tree;
        let idx = tree.ensure(self.node, |e| Ok(e.ensure_child("timer")?.set_text(timer)?.index()))?;
        if only_on_changes {
            tree.set_attribute(idx, "onlyOnChanges", "true")?;
        } else {
            tree.remove_attribute(idx, "onlyOnChanges");
        }
        Ok(*self)
    }

    pub fn stages(&self) -> Vec<Stage<'a>> {
        let tree = self.tree;
        tree.children_named(self.node, "stage")
            .into_iter()
            .map(|idx| Stage::new(tree, idx))
            .collect()
    }

    pub fn find_stage(&self, name: &str) -> DomainResult<Stage<'a>> {
        self.stages()
            .into_iter()
            .find(|s| self.tree.attribute(s.node(), "name").as_deref() == Some(name))
            .ok_or_else(|| DomainError::lookup(format!("stage \"{name}\""), self.context()))
    }

    pub fn ensure_stage(&self, name: &str) -> DomainResult<Stage<'a>> {
        let idx = self.tree.ensure(self.node, |e| {
            Ok(e.ensure_child_with_attribute("stage", "name", name)?.index())
        })?;
        Ok(Stage::new(self.tree, idx))
    }

    pub fn ensure_removal_of_stage(&self, name: &str) -> Self {
        for stage in self.stages() {
            if self.tree.attribute(stage.node(), "name").as_deref() == Some(name) {
                self.tree.remove(stage.node());
            }
        }
        *self
    }

    /// Remove every child and the label template, keeping name and owner.
    pub fn make_empty(&self) -> Self {
        let node = self.node;
        debug!("make_empty: {}", self.context());
        self.tree.write(|doc| {
            doc.remove_children(node, None);
            doc.remove_attribute(node, "labeltemplate");
        });
        *self
    }
}

impl<'a> HasEnvironmentVariables<'a> for Pipeline<'a> {}

impl StructuralEq for Pipeline<'_> {
    fn kind(&self) -> EntityKind {
        match self.owner {
            PipelineOwner::Group => EntityKind::Pipeline,
            PipelineOwner::Templates => EntityKind::Template,
        }
    }

    fn canonical_form(&self) -> String {
        self.tree.canonical(self.node)
    }
}

/// A named group of pipelines.
#[derive(Debug, Clone, Copy)]
pub struct PipelineGroup<'a> {
    pub(super) tree: TreeRef<'a>,
    pub(super) node: Index,
}

impl<'a> PipelineGroup<'a> {
    pub(crate) fn new(tree: TreeRef<'a>, node: Index) -> Self {
        Self { tree, node }
    }

    fn context(&self) -> String {
        describe(self, "pipeline group", "group")
    }

    pub fn name(&self) -> DomainResult<String> {
        self.tree.required_attribute(self.node, "group", || self.context())
    }

    /// Templates of the whole configuration, available to every group.
    pub fn templates(&self) -> Vec<Pipeline<'a>> {
        ConfigRoot::new(self.tree).templates()
    }

    pub fn pipelines(&self) -> Vec<Pipeline<'a>> {
        let tree = self.tree;
        tree.children_named(self.node, "pipeline")
            .into_iter()
            .map(|idx| Pipeline::new(tree, idx, PipelineOwner::Group))
            .collect()
    }

    fn matching_pipelines(&self, name: &str) -> Vec<Pipeline<'a>> {
        self.pipelines()
            .into_iter()
            .filter(|p| self.tree.attribute(p.node, "name").as_deref() == Some(name))
            .collect()
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        !self.matching_pipelines(name).is_empty()
    }

    pub fn find_pipeline(&self, name: &str) -> DomainResult<Pipeline<'a>> {
        self.matching_pipelines(name)
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::lookup(format!("pipeline \"{name}\""), self.context()))
    }

    pub fn ensure_pipeline(&self, name: &str) -> DomainResult<Pipeline<'a>> {
        let idx = self.tree.ensure(self.node, |e| {
            Ok(e.ensure_child_with_attribute("pipeline", "name", name)?.index())
        })?;
        Ok(Pipeline::new(self.tree, idx, PipelineOwner::Group))
    }

    pub fn ensure_removal_of_pipeline(&self, name: &str) -> Self {
        for pipeline in self.matching_pipelines(name) {
            self.tree.remove(pipeline.node);
        }
        *self
    }

    /// Ensure the pipeline exists with nothing in it.
    pub fn ensure_replacement_of_pipeline(&self, name: &str) -> DomainResult<Pipeline<'a>> {
        Ok(self.ensure_pipeline(name)?.make_empty())
    }

    pub fn make_empty(&self) -> Self {
        let node = self.node;
        self.tree.write(|doc| doc.remove_children(node, None));
        *self
    }
}

impl StructuralEq for PipelineGroup<'_> {
    fn kind(&self) -> EntityKind {
        EntityKind::PipelineGroup
    }

    fn canonical_form(&self) -> String {
        self.tree.canonical(self.node)
    }
}
