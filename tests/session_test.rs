//! Tests for ConfigSession against the in-memory and file stores

use std::sync::Arc;

use rstest::rstest;
use tempfile::TempDir;

use ciconf::application::{ApplicationError, ConfigSession, SaveOptions, SaveOutcome, SessionState};
use ciconf::config::Settings;
use ciconf::domain::{ExecTask, GitMaterial, Material, PipelineMaterial, Task};
use ciconf::infrastructure::di::ServiceContainer;
use ciconf::infrastructure::traits::RealFileSystem;
use ciconf::infrastructure::{empty_config, MemoryConfigStore};

const SHUFFLED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<cruise schemaVersion="72">
  <agents>
    <agent hostname="h1" ipaddress="10.0.0.1" uuid="u1"/>
  </agents>
  <pipelines group="deploy">
    <pipeline name="release">
      <stage name="build"/>
      <materials>
        <git url="https://example.com/z.git"/>
      </materials>
    </pipeline>
  </pipelines>
</cruise>"#;

fn memory_session(document: &str) -> (Arc<MemoryConfigStore>, ConfigSession) {
    let store = Arc::new(MemoryConfigStore::new(document));
    let container = ServiceContainer::with_deps(
        Settings::default(),
        Arc::new(RealFileSystem),
        store.clone(),
    );
    let session = container.open_session().unwrap();
    (store, session)
}

// ============================================================
// save()
// ============================================================

#[test]
fn given_out_of_order_document_when_saved_untouched_then_no_write() {
    // Arrange
    let (store, mut session) = memory_session(SHUFFLED);

    // Act
    let outcome = session.save(SaveOptions::default()).unwrap();

    // Assert
    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(store.write_count(), 0);
}

#[test]
fn given_out_of_order_document_when_config_rendered_then_in_server_order() {
    // Arrange
    let (_, session) = memory_session(SHUFFLED);

    // Act
    let config = session.config().unwrap();

    // Assert
    let pipelines = config.find("<pipelines").unwrap();
    let agents = config.find("<agents").unwrap();
    let materials = config.find("<materials").unwrap();
    let stage = config.find("<stage").unwrap();
    assert!(pipelines < agents);
    assert!(materials < stage);
}

#[rstest]
#[case::plain(SaveOptions::default(), SaveOutcome::Written, 1)]
#[case::dry_run(SaveOptions::dry_run(), SaveOutcome::DryRun, 0)]
fn given_changed_document_when_saved_then_outcome_depends_on_options(
    #[case] options: SaveOptions,
    #[case] expected: SaveOutcome,
    #[case] writes: usize,
) {
    // Arrange
    let (store, mut session) = memory_session(&empty_config());
    session.root().ensure_template("base").unwrap();

    // Act
    let outcome = session.save(options).unwrap();

    // Assert
    assert_eq!(outcome, expected);
    assert_eq!(store.write_count(), writes);
}

fn reopen(store: &Arc<MemoryConfigStore>) -> ConfigSession {
    ConfigSession::load(
        store.clone(),
        Arc::new(RealFileSystem),
        Arc::new(Settings::default()),
    )
    .unwrap()
}

fn replace_release_pipeline(session: &ConfigSession, materials: &[Material]) {
    let pipeline = session
        .root()
        .ensure_pipeline_group("deploy")
        .and_then(|g| g.ensure_replacement_of_pipeline("release"))
        .unwrap();
    for material in materials {
        pipeline.ensure_material(material).unwrap();
    }
    pipeline.ensure_stage("build").and_then(|s| s.ensure_job("compile")).unwrap();
}

#[test]
fn given_materials_added_in_other_order_when_resaved_then_no_write() {
    // Arrange
    let store = Arc::new(MemoryConfigStore::empty());
    let materials = [
        Material::from(PipelineMaterial::new("upstream-b", "build")),
        Material::from(GitMaterial::new("https://example.com/app.git")),
        Material::from(PipelineMaterial::new("upstream-a", "build")),
    ];
    let mut first = reopen(&store);
    replace_release_pipeline(&first, &materials);
    assert_eq!(first.save(SaveOptions::default()).unwrap(), SaveOutcome::Written);

    // Act
    let mut second = reopen(&store);
    let reversed: Vec<Material> = materials.iter().rev().cloned().collect();
    replace_release_pipeline(&second, &reversed);
    let outcome = second.save(SaveOptions::default()).unwrap();

    // Assert
    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(store.write_count(), 1);
}

#[test]
fn given_argument_with_trailing_space_when_resaved_then_task_not_duplicated() {
    // Arrange
    let store = Arc::new(MemoryConfigStore::empty());
    let task = Task::from(ExecTask::new("echo", ["done "]));
    let mut first = reopen(&store);
    let job = first
        .root()
        .ensure_pipeline_group("deploy")
        .and_then(|g| g.ensure_pipeline("release"))
        .and_then(|p| p.ensure_stage("build"))
        .and_then(|s| s.ensure_job("compile"))
        .unwrap();
    job.ensure_task(&task).unwrap();
    first.save(SaveOptions::default()).unwrap();

    // Act
    let mut second = reopen(&store);
    let job = second
        .root()
        .ensure_pipeline_group("deploy")
        .and_then(|g| g.ensure_pipeline("release"))
        .and_then(|p| p.ensure_stage("build"))
        .and_then(|s| s.ensure_job("compile"))
        .unwrap();
    job.ensure_task(&task).unwrap();
    let tasks = job.tasks().unwrap();
    let outcome = second.save(SaveOptions::default()).unwrap();

    // Assert
    assert_eq!(tasks, vec![task]);
    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(store.write_count(), 1);
    assert!(store.document().contains("<arg>done </arg>"));
}

#[test]
fn given_concurrent_write_when_saved_then_conflict_and_server_unchanged() {
    // Arrange
    let (store, mut session) = memory_session(&empty_config());
    let mut other = ConfigSession::load(
        store.clone(),
        Arc::new(RealFileSystem),
        Arc::new(Settings::default()),
    )
    .unwrap();
    other.root().ensure_pipeline_group("theirs").unwrap();
    other.save(SaveOptions::default()).unwrap();

    // Act
    session.root().ensure_pipeline_group("ours").unwrap();
    let err = session.save(SaveOptions::default()).unwrap_err();

    // Assert
    assert!(matches!(err, ApplicationError::Conflict { .. }));
    assert!(store.document().contains("theirs"));
    assert!(!store.document().contains("ours"));
    assert_eq!(session.state(), SessionState::Mutated);
}

#[test]
fn given_conflict_when_reloaded_then_sees_other_changes() {
    // Arrange
    let (store, mut session) = memory_session(&empty_config());
    store.replace_document(SHUFFLED);

    // Act
    session.reload().unwrap();

    // Assert
    assert_eq!(session.state(), SessionState::Loaded);
    assert_eq!(session.root().agents().len(), 1);
    assert_eq!(session.current_config().unwrap(), SHUFFLED);
}

#[test]
fn given_unavailable_store_when_loaded_then_transport_error() {
    // Arrange
    let store = Arc::new(MemoryConfigStore::empty());
    store.set_available(false);

    // Act
    let result = ConfigSession::load(store, Arc::new(RealFileSystem), Arc::new(Settings::default()));

    // Assert
    assert!(matches!(
        result,
        Err(ApplicationError::Transport { status: Some(503), .. })
    ));
}

#[test]
fn given_malformed_document_when_loaded_then_domain_error() {
    // Arrange
    let store = Arc::new(MemoryConfigStore::new("<cruise><pipelines></cruise>"));

    // Act
    let result = ConfigSession::load(store, Arc::new(RealFileSystem), Arc::new(Settings::default()));

    // Assert
    assert!(matches!(result, Err(ApplicationError::Domain(_))));
}

// ============================================================
// file-backed sessions
// ============================================================

#[test]
fn given_config_file_when_session_saved_then_file_updated_and_snapshots_written() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let config_file = temp.path().join("cruise-config.xml");
    std::fs::write(&config_file, empty_config()).unwrap();
    let settings = Settings {
        config_file: Some(config_file.clone()),
        local_save_dir: temp.path().join("snapshots"),
        ..Settings::default()
    };
    let container = ServiceContainer::new(settings).unwrap();
    let mut session = container.open_session().unwrap();

    // Act
    session
        .root()
        .ensure_pipeline_group("deploy")
        .and_then(|g| g.ensure_pipeline("release"))
        .and_then(|p| p.set_default_label_template())
        .unwrap();
    let outcome = session.save(SaveOptions::default().locally()).unwrap();

    // Assert
    assert_eq!(outcome, SaveOutcome::Written);
    let written = std::fs::read_to_string(&config_file).unwrap();
    assert!(written.contains(r#"<pipeline name="release" labeltemplate="0.${COUNT}">"#));
    assert!(temp.path().join("snapshots/config-before.xml").exists());
    assert!(temp.path().join("snapshots/config-after.xml").exists());
}

#[test]
fn given_no_config_file_when_container_created_then_config_error() {
    // Act
    let result = ServiceContainer::new(Settings::default());

    // Assert
    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}
