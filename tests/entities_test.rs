//! Tests for the entity views as seen through a session

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rstest::rstest;

use ciconf::application::ConfigSession;
use ciconf::config::Settings;
use ciconf::domain::{
    Artifact, DomainError, ExecTask, FetchArtifactSrc, FetchArtifactTask, GitMaterial,
    HasEnvironmentVariables, HasResources, Material, PipelineMaterial, RakeTask, RunIf, Tab, Task,
};
use ciconf::infrastructure::traits::RealFileSystem;
use ciconf::infrastructure::MemoryConfigStore;

fn session(document: &str) -> ConfigSession {
    ConfigSession::load(
        Arc::new(MemoryConfigStore::new(document)),
        Arc::new(RealFileSystem),
        Arc::new(Settings::default()),
    )
    .unwrap()
}

fn job_with_task(task_xml: &str) -> String {
    format!(
        r#"<cruise><pipelines group="g"><pipeline name="p"><stage name="s"><jobs><job name="j"><tasks>{task_xml}</tasks></job></jobs></stage></pipeline></pipelines></cruise>"#
    )
}

// ============================================================
// tasks
// ============================================================

#[rstest]
#[case::none(r#"<exec command="ls"/>"#, RunIf::Passed)]
#[case::failed(r#"<exec command="ls"><runif status="failed"/></exec>"#, RunIf::Failed)]
#[case::any(r#"<exec command="ls"><runif status="any"/></exec>"#, RunIf::Any)]
#[case::both(
    r#"<exec command="ls"><runif status="passed"/><runif status="failed"/></exec>"#,
    RunIf::Any
)]
#[case::both_reversed(
    r#"<exec command="ls"><runif status="failed"/><runif status="passed"/></exec>"#,
    RunIf::Any
)]
fn given_runif_markers_when_task_read_then_normalized(#[case] task_xml: &str, #[case] expected: RunIf) {
    // Arrange
    let session = session(&job_with_task(task_xml));

    // Act
    let tasks = session
        .root()
        .find_pipeline_group("g")
        .and_then(|g| g.find_pipeline("p"))
        .and_then(|p| p.find_stage("s"))
        .and_then(|s| s.find_job("j"))
        .and_then(|j| j.tasks())
        .unwrap();

    // Assert
    assert_eq!(tasks[0].runif(), expected);
}

#[test]
fn given_invalid_runif_markers_when_task_read_then_invalid_enumeration() {
    // Arrange
    let session = session(&job_with_task(
        r#"<exec command="ls"><runif status="any"/><runif status="failed"/></exec>"#,
    ));

    // Act
    let err = session
        .root()
        .find_pipeline_group("g")
        .and_then(|g| g.find_pipeline("p"))
        .and_then(|p| p.find_stage("s"))
        .and_then(|s| s.find_job("j"))
        .and_then(|j| j.tasks())
        .unwrap_err();

    // Assert
    assert!(matches!(err, DomainError::InvalidEnumeration { field: "runif", .. }));
}

#[test]
fn given_unknown_task_when_read_then_unknown_variant() {
    // Arrange
    let session = session(&job_with_task(r#"<ant target="build"/>"#));

    // Act
    let err = session
        .root()
        .find_pipeline_group("g")
        .and_then(|g| g.find_pipeline("p"))
        .and_then(|p| p.find_stage("s"))
        .and_then(|s| s.find_job("j"))
        .and_then(|j| j.tasks())
        .unwrap_err();

    // Assert
    assert_eq!(err.to_string(), "don't know task type ant");
}

#[test]
fn given_tasks_when_added_then_read_back_in_order() {
    // Arrange
    let session = session("<cruise/>");
    let job = session
        .root()
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .and_then(|p| p.ensure_stage("s"))
        .and_then(|s| s.ensure_job("j"))
        .unwrap();
    let tasks = vec![
        Task::from(ExecTask::new("make", ["test"]).with_working_dir("src")),
        Task::from(
            FetchArtifactTask::new("up", "build", "compile", FetchArtifactSrc::Dir("target".into()))
                .with_dest("deps")
                .with_runif(RunIf::Any),
        ),
        Task::from(RakeTask::new("deploy").with_runif(RunIf::Failed)),
    ];

    // Act
    for task in &tasks {
        job.ensure_task(task).unwrap();
        job.ensure_task(task).unwrap();
    }

    // Assert
    assert_eq!(job.tasks().unwrap(), tasks);
}

// ============================================================
// materials
// ============================================================

#[test]
fn given_mixed_materials_when_config_rendered_then_git_first_and_others_sorted() {
    // Arrange
    let session = session("<cruise/>");
    let pipeline = session
        .root()
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .unwrap();
    for material in [
        Material::from(GitMaterial::new("https://example.com/z.git")),
        Material::from(PipelineMaterial::new("second", "build")),
        Material::from(GitMaterial::new("https://example.com/a.git").with_branch("dev")),
        Material::from(PipelineMaterial::new("first", "build")),
    ] {
        pipeline.add_material(&material).unwrap();
    }

    // Act
    session.config().unwrap();

    // Assert
    let urls: Vec<String> = pipeline
        .materials()
        .unwrap()
        .into_iter()
        .map(|m| match m {
            Material::Git(git) => git.url().to_string(),
            Material::Pipeline(p) => p.pipeline_name().to_string(),
        })
        .collect();
    assert_eq!(
        urls,
        [
            "https://example.com/a.git",
            "https://example.com/z.git",
            "first",
            "second"
        ]
    );
}

#[test]
fn given_git_material_on_master_when_rendered_then_branch_omitted() {
    // Arrange
    let session = session("<cruise/>");
    let pipeline = session
        .root()
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .unwrap();

    // Act
    pipeline
        .ensure_material(&Material::from(
            GitMaterial::new("https://example.com/a.git").with_branch("master"),
        ))
        .unwrap();

    // Assert
    let config = session.config().unwrap();
    assert!(config.contains(r#"<git url="https://example.com/a.git"></git>"#));
    assert!(!config.contains("branch="));
}

// ============================================================
// jobs, stages, pipelines
// ============================================================

#[test]
fn given_job_when_fully_described_then_all_sections_readable() {
    // Arrange
    let session = session("<cruise/>");
    let stage = session
        .root()
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .and_then(|p| p.ensure_stage("s"))
        .unwrap();
    let artifacts = BTreeSet::from([
        Artifact::build("target/release/app").with_dest("bin"),
        Artifact::test("target/reports"),
    ]);

    // Act
    let job = stage
        .set_clean_working_dir()
        .and_then(|s| s.set_has_manual_approval())
        .and_then(|s| s.ensure_job("j"))
        .and_then(|j| j.ensure_artifacts(&artifacts))
        .and_then(|j| j.ensure_tab(&Tab::new("coverage", "reports/index.html")))
        .and_then(|j| j.ensure_resource("linux"))
        .and_then(|j| j.set_runs_on_all_agents(true))
        .and_then(|j| {
            j.ensure_encrypted_environment_variables(&BTreeMap::from([(
                "TOKEN".to_string(),
                "c2VjcmV0".to_string(),
            )]))
        })
        .unwrap();

    // Assert
    assert!(stage.clean_working_dir());
    assert!(stage.has_manual_approval());
    assert_eq!(job.artifacts().unwrap(), artifacts);
    assert_eq!(job.tabs().unwrap(), vec![Tab::new("coverage", "reports/index.html")]);
    assert_eq!(job.resources(), BTreeSet::from(["linux".to_string()]));
    assert!(job.runs_on_all_agents());
    assert_eq!(
        job.encrypted_environment_variables().get("TOKEN").map(String::as_str),
        Some("c2VjcmV0")
    );
    assert!(job.environment_variables().is_empty());
}

#[test]
fn given_job_without_timeout_when_read_then_lookup_error() {
    // Arrange
    let session = session("<cruise/>");
    let job = session
        .root()
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .and_then(|p| p.ensure_stage("s"))
        .and_then(|s| s.ensure_job("compile"))
        .unwrap();

    // Act
    let err = job.timeout().unwrap_err();

    // Assert
    assert_eq!(err.to_string(), r#"job "compile" does not have attribute "timeout""#);
}

#[test]
fn given_pipeline_based_on_template_when_template_resolved_then_same_stages() {
    // Arrange
    let session = session("<cruise/>");
    let root = session.root();
    root.ensure_template("base")
        .and_then(|t| t.ensure_stage("build"))
        .unwrap();

    // Act
    let pipeline = root
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .and_then(|p| p.set_template_name("base"))
        .unwrap();
    let template = pipeline.template().unwrap();

    // Assert
    assert!(pipeline.is_based_on_template());
    assert!(template.is_template());
    assert_eq!(template.stages()[0].name().unwrap(), "build");
}

#[test]
fn given_equal_jobs_in_different_stages_when_compared_then_structurally_equal() {
    // Arrange
    let session = session("<cruise/>");
    let pipeline = session
        .root()
        .ensure_pipeline_group("g")
        .and_then(|g| g.ensure_pipeline("p"))
        .unwrap();

    // Act
    let first = pipeline
        .ensure_stage("one")
        .and_then(|s| s.ensure_job("j"))
        .and_then(|j| j.set_timeout("5"))
        .unwrap();
    let second = pipeline
        .ensure_stage("two")
        .and_then(|s| s.ensure_job("j"))
        .and_then(|j| j.set_timeout("5"))
        .unwrap();

    // Assert
    assert_eq!(first, second);
    second.set_timeout("6").unwrap();
    assert_ne!(first, second);
}
