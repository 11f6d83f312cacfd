//! Job artifacts and what a fetchartifact task copies.

use generational_arena::Index;

use crate::domain::arena::{Document, Fragment};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::navigator::PossiblyMissing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Build,
    Test,
}

impl ArtifactKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactKind::Build => "artifact",
            ArtifactKind::Test => "test",
        }
    }
}

/// File or directory a job publishes after it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artifact {
    kind: ArtifactKind,
    src: String,
    dest: Option<String>,
}

impl Artifact {
    pub fn build(src: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Build,
            src: src.into(),
            dest: None,
        }
    }

    pub fn test(src: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Test,
            src: src.into(),
            dest: None,
        }
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn dest(&self) -> Option<&str> {
        self.dest.as_deref()
    }

    pub fn from_element(document: &Document, idx: Index) -> DomainResult<Self> {
        let nav = PossiblyMissing::new(document, idx);
        let element = nav.element().ok_or(DomainError::DetachedNode)?;
        let kind = match element.tag() {
            "artifact" => ArtifactKind::Build,
            "test" => ArtifactKind::Test,
            other => {
                return Err(DomainError::UnknownVariant {
                    family: "artifact",
                    tag: other.to_string(),
                })
            }
        };
        let src = nav
            .attribute("src")
            .ok_or_else(|| DomainError::lookup("attribute \"src\"", element.tag()))?;
        Ok(Self {
            kind,
            src: src.to_string(),
            dest: nav.attribute("dest").map(str::to_string),
        })
    }

    pub fn to_fragment(&self) -> Fragment {
        Fragment::new(self.kind.tag())
            .attr("src", self.src.as_str())
            .attr_opt("dest", self.dest.as_deref())
    }
}

/// What a fetchartifact task copies: a single file or a whole directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchArtifactSrc {
    File(String),
    Dir(String),
}

impl FetchArtifactSrc {
    pub fn value(&self) -> &str {
        match self {
            FetchArtifactSrc::File(v) | FetchArtifactSrc::Dir(v) => v,
        }
    }

    /// Attribute name and value as written on `<fetchartifact>`.
    pub fn as_attribute(&self) -> (&'static str, &str) {
        match self {
            FetchArtifactSrc::File(v) => ("srcfile", v),
            FetchArtifactSrc::Dir(v) => ("srcdir", v),
        }
    }

    pub fn from_element(document: &Document, idx: Index) -> DomainResult<Self> {
        let nav = PossiblyMissing::new(document, idx);
        if let Some(file) = nav.attribute("srcfile") {
            return Ok(FetchArtifactSrc::File(file.to_string()));
        }
        if let Some(dir) = nav.attribute("srcdir") {
            return Ok(FetchArtifactSrc::Dir(dir.to_string()));
        }
        Err(DomainError::lookup("srcfile or srcdir", "fetchartifact"))
    }
}
