//! Job tasks: exec, fetchartifact and rake.

use std::fmt;
use std::str::FromStr;

use generational_arena::Index;

use crate::domain::arena::{Document, Fragment};
use crate::domain::entities::artifact::FetchArtifactSrc;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::navigator::PossiblyMissing;

/// Condition under which a task runs, relative to the outcome of earlier tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunIf {
    #[default]
    Passed,
    Failed,
    Any,
}

impl RunIf {
    pub const ALLOWED: &'static [&'static str] = &["passed", "failed", "any"];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunIf::Passed => "passed",
            RunIf::Failed => "failed",
            RunIf::Any => "any",
        }
    }

    /// Decode the `<runif>` markers of a task element.
    ///
    /// No marker means passed. Separate passed and failed markers together
    /// mean any. Any other combination is rejected.
    fn from_markers(markers: &[&str]) -> DomainResult<Self> {
        match markers {
            [] => Ok(RunIf::Passed),
            [single] => single.parse(),
            [a, b] if (*a == "passed" && *b == "failed") || (*a == "failed" && *b == "passed") => {
                Ok(RunIf::Any)
            }
            _ => Err(DomainError::InvalidEnumeration {
                field: "runif",
                value: markers.join(","),
                allowed: Self::ALLOWED,
            }),
        }
    }

    fn to_fragment(self) -> Fragment {
        Fragment::new("runif").attr("status", self.as_str())
    }
}

impl FromStr for RunIf {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(RunIf::Passed),
            "failed" => Ok(RunIf::Failed),
            "any" => Ok(RunIf::Any),
            other => Err(DomainError::InvalidEnumeration {
                field: "runif",
                value: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl fmt::Display for RunIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs a command with arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecTask {
    command: String,
    args: Vec<String>,
    working_dir: Option<String>,
    runif: RunIf,
}

impl ExecTask {
    pub fn new<S: Into<String>>(command: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            runif: RunIf::Passed,
        }
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<String>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn with_runif(mut self, runif: RunIf) -> Self {
        self.runif = runif;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn command_and_args(&self) -> Vec<&str> {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.working_dir.as_deref()
    }
}

/// Copies an artifact produced by another job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchArtifactTask {
    pipeline: String,
    stage: String,
    job: String,
    src: FetchArtifactSrc,
    dest: Option<String>,
    runif: RunIf,
}

impl FetchArtifactTask {
    pub fn new(
        pipeline: impl Into<String>,
        stage: impl Into<String>,
        job: impl Into<String>,
        src: FetchArtifactSrc,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            stage: stage.into(),
            job: job.into(),
            src,
            dest: None,
            runif: RunIf::Passed,
        }
    }

    pub fn with_dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_runif(mut self, runif: RunIf) -> Self {
        self.runif = runif;
        self
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn src(&self) -> &FetchArtifactSrc {
        &self.src
    }

    pub fn dest(&self) -> Option<&str> {
        self.dest.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RakeTask {
    target: String,
    runif: RunIf,
}

impl RakeTask {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            runif: RunIf::Passed,
        }
    }

    pub fn with_runif(mut self, runif: RunIf) -> Self {
        self.runif = runif;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// A step inside a job.
///
/// Equality is on the decoded value, not the markup: a task read back with
/// both `passed` and `failed` runif markers equals one built with
/// [`RunIf::Any`]. Node identity comparisons go through `StructuralEq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Task {
    Exec(ExecTask),
    FetchArtifact(FetchArtifactTask),
    Rake(RakeTask),
}

impl Task {
    pub fn type_name(&self) -> &'static str {
        match self {
            Task::Exec(_) => "exec",
            Task::FetchArtifact(_) => "fetchartifact",
            Task::Rake(_) => "rake",
        }
    }

    pub fn runif(&self) -> RunIf {
        match self {
            Task::Exec(t) => t.runif,
            Task::FetchArtifact(t) => t.runif,
            Task::Rake(t) => t.runif,
        }
    }

    /// Decode a task element.
    pub fn from_element(document: &Document, idx: Index) -> DomainResult<Self> {
        let nav = PossiblyMissing::new(document, idx);
        let element = nav.element().ok_or(DomainError::DetachedNode)?;
        let required = |name: &str| {
            nav.attribute(name)
                .map(str::to_string)
                .ok_or_else(|| DomainError::lookup(format!("attribute \"{name}\""), element.tag()))
        };
        let markers: Vec<&str> = nav
            .find_all("runif")
            .into_iter()
            .filter_map(|r| PossiblyMissing::new(document, r).attribute("status"))
            .collect();
        let runif = RunIf::from_markers(&markers)?;

        match element.tag() {
            "exec" => {
                let args = nav
                    .find_all("arg")
                    .into_iter()
                    .map(|a| {
                        PossiblyMissing::new(document, a)
                            .text()
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect::<Vec<_>>();
                Ok(Task::Exec(ExecTask {
                    command: required("command")?,
                    args,
                    working_dir: nav.attribute("workingdir").map(str::to_string),
                    runif,
                }))
            }
            "fetchartifact" => Ok(Task::FetchArtifact(FetchArtifactTask {
                pipeline: required("pipeline")?,
                stage: required("stage")?,
                job: required("job")?,
                src: FetchArtifactSrc::from_element(document, idx)?,
                dest: nav.attribute("dest").map(str::to_string),
                runif,
            })),
            "rake" => Ok(Task::Rake(RakeTask {
                target: required("target")?,
                runif,
            })),
            other => Err(DomainError::UnknownVariant {
                family: "task",
                tag: other.to_string(),
            }),
        }
    }

    pub fn to_fragment(&self) -> Fragment {
        match self {
            Task::Exec(t) => {
                let mut fragment = Fragment::new("exec")
                    .attr("command", t.command.as_str())
                    .attr_opt("workingdir", t.working_dir.as_deref());
                for arg in &t.args {
                    fragment = fragment.child(Fragment::new("arg").text(arg.as_str()));
                }
                fragment.child(t.runif.to_fragment())
            }
            Task::FetchArtifact(t) => {
                let (src_attribute, src_value) = t.src.as_attribute();
                Fragment::new("fetchartifact")
                    .attr("pipeline", t.pipeline.as_str())
                    .attr("stage", t.stage.as_str())
                    .attr("job", t.job.as_str())
                    .attr(src_attribute, src_value)
                    .attr_opt("dest", t.dest.as_deref())
                    .child(t.runif.to_fragment())
            }
            Task::Rake(t) => {
                let fragment = Fragment::new("rake").attr("target", t.target.as_str());
                match t.runif {
                    RunIf::Passed => fragment,
                    other => fragment.child(other.to_fragment()),
                }
            }
        }
    }
}

impl From<ExecTask> for Task {
    fn from(task: ExecTask) -> Self {
        Task::Exec(task)
    }
}

impl From<FetchArtifactTask> for Task {
    fn from(task: FetchArtifactTask) -> Self {
        Task::FetchArtifact(task)
    }
}

impl From<RakeTask> for Task {
    fn from(task: RakeTask) -> Self {
        Task::Rake(task)
    }
}
