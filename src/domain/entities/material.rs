//! Pipeline materials: where a pipeline's inputs come from.

use std::collections::BTreeSet;

use generational_arena::Index;

use crate::domain::arena::{Document, Fragment};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::navigator::PossiblyMissing;

const DEFAULT_BRANCH: &str = "master";

/// A git repository watched by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitMaterial {
    url: String,
    /// `None` means the default branch; never stores "master"
    branch: Option<String>,
    material_name: Option<String>,
    polling: bool,
    ignore_patterns: BTreeSet<String>,
    destination_directory: Option<String>,
}

impl GitMaterial {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: None,
            material_name: None,
            polling: true,
            ignore_patterns: BTreeSet::new(),
            destination_directory: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        self.branch = (branch != DEFAULT_BRANCH).then_some(branch);
        self
    }

    pub fn with_material_name(mut self, name: impl Into<String>) -> Self {
        self.material_name = Some(name.into());
        self
    }

    pub fn with_polling(mut self, polling: bool) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_ignore_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_destination_directory(mut self, dest: impl Into<String>) -> Self {
        self.destination_directory = Some(dest.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    pub fn material_name(&self) -> Option<&str> {
        self.material_name.as_deref()
    }

    pub fn polling(&self) -> bool {
        self.polling
    }

    pub fn ignore_patterns(&self) -> &BTreeSet<String> {
        &self.ignore_patterns
    }

    pub fn destination_directory(&self) -> Option<&str> {
        self.destination_directory.as_deref()
    }

    fn to_fragment(&self) -> Fragment {
        let mut fragment = Fragment::new("git")
            .attr("url", self.url.as_str())
            .attr_opt("branch", self.branch.as_deref())
            .attr_opt("materialName", self.material_name.as_deref())
            .attr_opt("autoUpdate", (!self.polling).then_some("false"))
            .attr_opt("dest", self.destination_directory.as_deref());
        if !self.ignore_patterns.is_empty() {
            let filter = self
                .ignore_patterns
                .iter()
                .fold(Fragment::new("filter"), |filter, pattern| {
                    filter.child(Fragment::new("ignore").attr("pattern", pattern.as_str()))
                });
            fragment = fragment.child(filter);
        }
        fragment
    }
}

/// The output of an upstream pipeline's stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineMaterial {
    pipeline_name: String,
    stage_name: String,
    material_name: Option<String>,
}

impl PipelineMaterial {
    pub fn new(pipeline_name: impl Into<String>, stage_name: impl Into<String>) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            stage_name: stage_name.into(),
            material_name: None,
        }
    }

    pub fn with_material_name(mut self, name: impl Into<String>) -> Self {
        self.material_name = Some(name.into());
        self
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn material_name(&self) -> Option<&str> {
        self.material_name.as_deref()
    }

    fn to_fragment(&self) -> Fragment {
        Fragment::new("pipeline")
            .attr("pipelineName", self.pipeline_name.as_str())
            .attr("stageName", self.stage_name.as_str())
            .attr_opt("materialName", self.material_name.as_deref())
    }
}

/// Equality is on the decoded value, so an explicit `master` branch equals
/// an absent one. Node comparisons go through `StructuralEq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Material {
    Git(GitMaterial),
    Pipeline(PipelineMaterial),
}

impl Material {
    pub fn is_git(&self) -> bool {
        matches!(self, Material::Git(_))
    }

    pub fn from_element(document: &Document, idx: Index) -> DomainResult<Self> {
        let nav = PossiblyMissing::new(document, idx);
        let element = nav.element().ok_or(DomainError::DetachedNode)?;
        let required = |name: &str| {
            nav.attribute(name)
                .map(str::to_string)
                .ok_or_else(|| DomainError::lookup(format!("attribute \"{name}\""), element.tag()))
        };
        let optional = |name: &str| nav.attribute(name).map(str::to_string);

        match element.tag() {
            "git" => {
                let ignore_patterns = nav
                    .possibly_missing_child("filter")
                    .find_all("ignore")
                    .into_iter()
                    .filter_map(|i| PossiblyMissing::new(document, i).attribute("pattern"))
                    .map(str::to_string)
                    .collect();
                Ok(Material::Git(GitMaterial {
                    url: required("url")?,
                    branch: optional("branch").filter(|b| b != DEFAULT_BRANCH),
                    material_name: optional("materialName"),
                    polling: nav.attribute("autoUpdate").unwrap_or("true") == "true",
                    ignore_patterns,
                    destination_directory: optional("dest"),
                }))
            }
            "pipeline" => Ok(Material::Pipeline(PipelineMaterial {
                pipeline_name: required("pipelineName")?,
                stage_name: required("stageName")?,
                material_name: optional("materialName"),
            })),
            other => Err(DomainError::UnknownVariant {
                family: "material",
                tag: other.to_string(),
            }),
        }
    }

    pub fn to_fragment(&self) -> Fragment {
        match self {
            Material::Git(git) => git.to_fragment(),
            Material::Pipeline(pipeline) => pipeline.to_fragment(),
        }
    }
}

impl From<GitMaterial> for Material {
    fn from(material: GitMaterial) -> Self {
        Material::Git(material)
    }
}

impl From<PipelineMaterial> for Material {
    fn from(material: PipelineMaterial) -> Self {
        Material::Pipeline(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(material: &Material) -> String {
        let mut doc = Document::new("materials");
        let idx = doc.append_fragment(doc.root(), &material.to_fragment()).unwrap();
        doc.subtree_to_xml(idx)
    }

    #[test]
    fn given_git_material_on_master_when_encoded_then_branch_is_omitted() {
        let material: Material = GitMaterial::new("git@example.com:repo.git")
            .with_branch("master")
            .into();

        assert_eq!(encode(&material), r#"<git url="git@example.com:repo.git"></git>"#);
        assert_eq!(material, Material::from(GitMaterial::new("git@example.com:repo.git")));
    }

    #[test]
    fn given_git_material_with_all_options_when_encoded_then_patterns_are_sorted() {
        let material: Material = GitMaterial::new("u")
            .with_branch("release")
            .with_material_name("src")
            .with_polling(false)
            .with_ignore_patterns(["docs/**", "*.md"])
            .with_destination_directory("checkout")
            .into();

        assert_eq!(
            encode(&material),
            r#"<git url="u" branch="release" materialName="src" autoUpdate="false" dest="checkout"><filter><ignore pattern="*.md"></ignore><ignore pattern="docs/**"></ignore></filter></git>"#
        );
    }

    #[test]
    fn given_git_element_when_decoded_then_reads_polling_and_patterns() {
        let doc = Document::parse(
            r#"<git url="u" branch="master" autoUpdate="false"><filter><ignore pattern="b"/><ignore pattern="a"/></filter></git>"#,
        )
        .unwrap();

        let Material::Git(git) = Material::from_element(&doc, doc.root()).unwrap() else {
            panic!("expected git material");
        };

        assert_eq!(git.branch(), "master");
        assert!(!git.polling());
        assert_eq!(git.ignore_patterns().iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn given_pipeline_element_when_decoded_then_is_pipeline_material() {
        let doc = Document::parse(r#"<pipeline pipelineName="up" stageName="build" materialName="m"/>"#).unwrap();

        let material = Material::from_element(&doc, doc.root()).unwrap();

        assert_eq!(
            material,
            Material::from(PipelineMaterial::new("up", "build").with_material_name("m"))
        );
        assert!(!material.is_git());
    }

    #[test]
    fn given_unknown_material_tag_when_decoded_then_errors() {
        let doc = Document::parse(r#"<svn url="u"/>"#).unwrap();

        assert!(matches!(
            Material::from_element(&doc, doc.root()),
            Err(DomainError::UnknownVariant { family: "material", .. })
        ));
    }
}
