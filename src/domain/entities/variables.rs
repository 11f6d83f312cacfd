//! Environment variables and resources shared by several entity kinds.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::arena::Fragment;
use crate::domain::entities::EntityNode;
use crate::domain::error::DomainResult;
use crate::domain::navigator::PossiblyMissing;

const CONTAINER: &str = "environmentvariables";

/// How a variable's value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// `<variable name><value>`
    Plain,
    /// `<variable name secure="true"><encryptedValue>`
    Encrypted,
    /// `<variable name secure="true"><value>`, encrypted by the server on save
    UnencryptedSecure,
}

impl VariableKind {
    fn is_secure(&self) -> bool {
        !matches!(self, VariableKind::Plain)
    }

    fn value_tag(&self) -> &'static str {
        match self {
            VariableKind::Encrypted => "encryptedValue",
            VariableKind::Plain | VariableKind::UnencryptedSecure => "value",
        }
    }

    fn matches(&self, secure: bool, value_tag: &str) -> bool {
        self.is_secure() == secure && self.value_tag() == value_tag
    }
}

/// Entities with an `environmentvariables` section: pipelines, stages, jobs.
pub trait HasEnvironmentVariables<'a>: EntityNode<'a> {
    fn variables_of_kind(&self, kind: VariableKind) -> BTreeMap<String, String> {
        self.tree().navigate(self.node(), |nav| {
            let document = nav.document();
            let mut result = BTreeMap::new();
            for variable in nav.possibly_missing_child(CONTAINER).find_all("variable") {
                let variable = PossiblyMissing::new(document, variable);
                let Some(name) = variable.attribute("name") else {
                    continue;
                };
                let secure = variable.has_attribute("secure", "true");
                let value_tag = if secure && variable.possibly_missing_child("encryptedValue").exists() {
                    "encryptedValue"
                } else {
                    "value"
                };
                if kind.matches(secure, value_tag) {
                    let value = variable.possibly_missing_child(value_tag).text().unwrap_or_default();
                    result.insert(name.to_string(), value.to_string());
                }
            }
            result
        })
    }

    fn environment_variables(&self) -> BTreeMap<String, String> {
        self.variables_of_kind(VariableKind::Plain)
    }

    fn encrypted_environment_variables(&self) -> BTreeMap<String, String> {
        self.variables_of_kind(VariableKind::Encrypted)
    }

    fn unencrypted_secure_environment_variables(&self) -> BTreeMap<String, String> {
        self.variables_of_kind(VariableKind::UnencryptedSecure)
    }

    /// Set each variable to `kind` and value, creating it if needed.
    ///
    /// Variables not named in `variables` are left alone.
    fn ensure_variables_of_kind(
        &self,
        variables: &BTreeMap<String, String>,
        kind: VariableKind,
    ) -> DomainResult<Self> {
        if variables.is_empty() {
            return Ok(*self);
        }
        let tree = self.tree();
        let container = tree.ensure(self.node(), |e| Ok(e.ensure_child(CONTAINER)?.index()))?;
        for (name, value) in variables {
            let variable = tree.ensure(container, |e| {
                Ok(e.ensure_child_with_attribute("variable", "name", name)?.index())
            })?;
            let up_to_date = tree.navigate(variable, |nav| {
                let children = nav.iter();
                let value_child = nav.possibly_missing_child(kind.value_tag());
                nav.has_attribute("secure", "true") == kind.is_secure()
                    && children.len() == 1
                    && value_child.exists()
                    && value_child.text().unwrap_or_default() == value
            });
            if up_to_date {
                continue;
            }
            tree.write(|doc| -> DomainResult<()> {
                if kind.is_secure() {
                    doc.set_attribute(variable, "secure", "true")?;
                } else {
                    doc.remove_attribute(variable, "secure");
                }
                doc.remove_children(variable, None);
                doc.append_fragment(variable, &Fragment::new(kind.value_tag()).text(value.as_str()))?;
                Ok(())
            })?;
        }
        Ok(*self)
    }

    fn ensure_environment_variables(&self, variables: &BTreeMap<String, String>) -> DomainResult<Self> {
        self.ensure_variables_of_kind(variables, VariableKind::Plain)
    }

    fn ensure_encrypted_environment_variables(
        &self,
        variables: &BTreeMap<String, String>,
    ) -> DomainResult<Self> {
        self.ensure_variables_of_kind(variables, VariableKind::Encrypted)
    }

    fn ensure_unencrypted_secure_environment_variables(
        &self,
        variables: &BTreeMap<String, String>,
    ) -> DomainResult<Self> {
        self.ensure_variables_of_kind(variables, VariableKind::UnencryptedSecure)
    }

    /// Drop the whole `environmentvariables` section.
    fn remove_environment_variables(&self) -> Self {
        let node = self.node();
        self.tree().write(|doc| doc.remove_children(node, Some(CONTAINER)));
        *self
    }
}

/// Entities with a `resources` set: jobs and agents.
pub trait HasResources<'a>: EntityNode<'a> {
    fn resources(&self) -> BTreeSet<String> {
        self.tree().navigate(self.node(), |nav| {
            let document = nav.document();
            nav.possibly_missing_child("resources")
                .find_all("resource")
                .into_iter()
                .filter_map(|r| PossiblyMissing::new(document, r).text())
                .map(|r| r.trim().to_string())
                .collect()
        })
    }

    fn ensure_resource(&self, resource: &str) -> DomainResult<Self> {
        if self.resources().contains(resource) {
            return Ok(*self);
        }
        self.tree().ensure(self.node(), |e| {
            let mut resources = e.ensure_child("resources")?;
            resources.append(&Fragment::new("resource").text(resource))?;
            Ok(())
        })?;
        Ok(*self)
    }
}
