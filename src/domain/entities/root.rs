//! Entry point of the facade: the document's root element.

use termtree::Tree;
use tracing::debug;

use crate::domain::entities::agent::Agent;
use crate::domain::entities::pipeline::{Pipeline, PipelineGroup, PipelineOwner};
use crate::domain::entities::{EntityNode, TreeRef};
use crate::domain::error::{DomainError, DomainResult};

const CONTEXT: &str = "configuration";

#[derive(Debug, Clone, Copy)]
pub struct ConfigRoot<'a> {
    tree: TreeRef<'a>,
}

impl<'a> ConfigRoot<'a> {
    pub fn new(tree: TreeRef<'a>) -> Self {
        Self { tree }
    }

    fn name_of(&self, entity: &impl EntityNode<'a>, key: &str) -> Option<String> {
        self.tree.attribute(entity.node(), key)
    }

    pub fn pipeline_groups(&self) -> Vec<PipelineGroup<'a>> {
        let tree = self.tree;
        tree.children_named(tree.root_index(), "pipelines")
            .into_iter()
            .map(|idx| PipelineGroup::new(tree, idx))
            .collect()
    }

    pub fn find_pipeline_group(&self, name: &str) -> DomainResult<PipelineGroup<'a>> {
        self.pipeline_groups()
            .into_iter()
            .find(|g| self.name_of(g, "group").as_deref() == Some(name))
            .ok_or_else(|| DomainError::lookup(format!("pipeline group \"{name}\""), CONTEXT))
    }

    pub fn ensure_pipeline_group(&self, name: &str) -> DomainResult<PipelineGroup<'a>> {
        let tree = self.tree;
        let idx = tree.ensure(tree.root_index(), |e| {
            Ok(e.ensure_child_with_attribute("pipelines", "group", name)?.index())
        })?;
        Ok(PipelineGroup::new(tree, idx))
    }

    /// Ensure the group exists with no pipelines in it.
    pub fn ensure_replacement_of_pipeline_group(&self, name: &str) -> DomainResult<PipelineGroup<'a>> {
        Ok(self.ensure_pipeline_group(name)?.make_empty())
    }

    pub fn ensure_removal_of_pipeline_group(&self, name: &str) -> Self {
        for group in self.pipeline_groups() {
            if self.name_of(&group, "group").as_deref() == Some(name) {
                debug!("ensure_removal_of_pipeline_group: group={}", name);
                self.tree.remove(group.node());
            }
        }
        *self
    }

    pub fn templates(&self) -> Vec<Pipeline<'a>> {
        let tree = self.tree;
        tree.children_named(tree.root_index(), "templates")
            .into_iter()
            .flat_map(|templates| tree.children_named(templates, "pipeline"))
            .map(|idx| Pipeline::new(tree, idx, PipelineOwner::Templates))
            .collect()
    }

    pub fn find_template(&self, name: &str) -> DomainResult<Pipeline<'a>> {
        self.templates()
            .into_iter()
            .find(|t| self.name_of(t, "name").as_deref() == Some(name))
            .ok_or_else(|| DomainError::lookup(format!("template \"{name}\""), CONTEXT))
    }

    pub fn ensure_template(&self, name: &str) -> DomainResult<Pipeline<'a>> {
        let tree = self.tree;
        let idx = tree.ensure(tree.root_index(), |e| {
            Ok(e.ensure_child("templates")?
                .ensure_child_with_attribute("pipeline", "name", name)?
                .index())
        })?;
        Ok(Pipeline::new(tree, idx, PipelineOwner::Templates))
    }

    /// Ensure the template exists with nothing in it.
    pub fn ensure_replacement_of_template(&self, name: &str) -> DomainResult<Pipeline<'a>> {
        Ok(self.ensure_template(name)?.make_empty())
    }

    /// Remove the template; an emptied `templates` section goes too.
    pub fn ensure_removal_of_template(&self, name: &str) -> Self {
        for template in self.templates() {
            if self.name_of(&template, "name").as_deref() == Some(name) {
                debug!("ensure_removal_of_template: template={}", name);
                self.tree.remove(template.node());
            }
        }
        self.tree.prune_empty(self.tree.root_index(), "templates");
        *self
    }

    pub fn agents(&self) -> Vec<Agent<'a>> {
        let tree = self.tree;
        tree.children_named(tree.root_index(), "agents")
            .into_iter()
            .flat_map(|agents| tree.children_named(agents, "agent"))
            .map(|idx| Agent::new(tree, idx))
            .collect()
    }

    /// Remove the agent; an emptied `agents` section goes too.
    pub fn ensure_removal_of_agent(&self, hostname: &str) -> Self {
        for agent in self.agents() {
            if self.name_of(&agent, "hostname").as_deref() == Some(hostname) {
                debug!("ensure_removal_of_agent: hostname={}", hostname);
                self.tree.remove(agent.node());
            }
        }
        self.tree.prune_empty(self.tree.root_index(), "agents");
        *self
    }

    /// Groups, pipelines, stages and jobs as a printable tree.
    pub fn outline(&self) -> Tree<String> {
        let label = |kind: &str, name: Option<String>| format!("{kind} {}", name.unwrap_or_default());
        let mut outline = Tree::new(CONTEXT.to_string());
        for group in self.pipeline_groups() {
            let mut group_tree = Tree::new(label("group", self.name_of(&group, "group")));
            for pipeline in group.pipelines() {
                let mut pipeline_tree = Tree::new(label("pipeline", self.name_of(&pipeline, "name")));
                for stage in pipeline.stages() {
                    let jobs = stage
                        .jobs()
                        .into_iter()
                        .map(|job| Tree::new(label("job", self.name_of(&job, "name"))));
                    pipeline_tree.push(Tree::new(label("stage", self.name_of(&stage, "name"))).with_leaves(jobs));
                }
                group_tree.push(pipeline_tree);
            }
            outline.push(group_tree);
        }
        let templates: Vec<Tree<String>> = self
            .templates()
            .into_iter()
            .map(|t| Tree::new(label("template", self.name_of(&t, "name"))))
            .collect();
        if !templates.is_empty() {
            outline.push(Tree::new("templates".to_string()).with_leaves(templates));
        }
        outline
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::domain::arena::Document;
    use crate::domain::entities::variables::HasResources;
    use crate::domain::entities::ConfigDefaults;

    fn with_root(xml: &str, f: impl FnOnce(ConfigRoot<'_>, &RefCell<Document>)) {
        let doc = RefCell::new(Document::parse(xml).unwrap());
        let defaults = ConfigDefaults::default();
        f(TreeRef::new(&doc, &defaults).root(), &doc);
    }

    #[test]
    fn given_group_when_ensured_twice_then_same_group() {
        with_root("<cruise/>", |root, doc| {
            let first = root.ensure_pipeline_group("deploy").unwrap();
            let revision = doc.borrow().revision();

            let second = root.ensure_pipeline_group("deploy").unwrap();

            assert_eq!(first.node(), second.node());
            assert_eq!(doc.borrow().revision(), revision);
            assert_eq!(root.pipeline_groups().len(), 1);
        });
    }

    #[test]
    fn given_group_when_replaced_then_pipelines_are_gone() {
        with_root(
            r#"<cruise><pipelines group="g"><pipeline name="a"/><pipeline name="b"/></pipelines></cruise>"#,
            |root, _| {
                let group = root.ensure_replacement_of_pipeline_group("g").unwrap();

                assert!(group.pipelines().is_empty());
                assert_eq!(group.name().unwrap(), "g");
            },
        );
    }

    #[test]
    fn given_last_template_when_removed_then_templates_section_is_pruned() {
        with_root(
            r#"<cruise><templates><pipeline name="a"/><pipeline name="b"/></templates></cruise>"#,
            |root, doc| {
                root.ensure_removal_of_template("a");
                assert_eq!(root.templates().len(), 1);

                root.ensure_removal_of_template("b");

                let d = doc.borrow();
                assert!(d.children(d.root()).is_empty());
            },
        );
    }

    #[test]
    fn given_last_agent_when_removed_then_agents_section_is_pruned() {
        with_root(
            r#"<cruise><agents><agent hostname="h1" ipaddress="10.0.0.1" uuid="u1"><resources><resource>linux</resource></resources></agent></agents></cruise>"#,
            |root, doc| {
                let agent = root.agents()[0];
                assert_eq!(agent.ip_address().unwrap(), "10.0.0.1");
                assert!(agent.resources().contains("linux"));

                root.ensure_removal_of_agent("h1");

                assert!(root.agents().is_empty());
                let d = doc.borrow();
                assert!(d.children(d.root()).is_empty());
            },
        );
    }

    #[test]
    fn given_unknown_group_when_found_then_errors_lookup() {
        with_root("<cruise/>", |root, _| {
            assert_eq!(
                root.find_pipeline_group("nope").unwrap_err().to_string(),
                "configuration does not have pipeline group \"nope\""
            );
        });
    }

    #[test]
    fn given_configuration_when_outlined_then_lists_hierarchy() {
        with_root("<cruise/>", |root, _| {
            let job = root
                .ensure_pipeline_group("deploy")
                .and_then(|g| g.ensure_pipeline("release"))
                .and_then(|p| p.ensure_stage("build"))
                .and_then(|s| s.ensure_job("compile"))
                .unwrap();
            job.set_timeout("20").unwrap();
            root.ensure_template("base").unwrap();

            let rendered = root.outline().to_string();

            for line in ["group deploy", "pipeline release", "stage build", "job compile", "template base"] {
                assert!(rendered.contains(line), "missing {line} in:\n{rendered}");
            }
        });
    }
}
