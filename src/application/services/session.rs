//! Configuration session
//!
//! Loads the document once, hands out entity views over it, and writes it
//! back only when something of substance changed. The token obtained on load
//! guards the write: if the stored document moved on in the meantime the save
//! fails with a conflict and nothing is written.

use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    canonical_form, has_changes, reorder_document, reordered_canonical_form, ConfigDefaults,
    ConfigRoot, Document, DomainResult, TreeRef,
};
use crate::infrastructure::traits::{ConcurrencyToken, ConfigStore, FileSystem};

pub const BEFORE_SNAPSHOT: &str = "config-before.xml";
pub const AFTER_SNAPSHOT: &str = "config-after.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has touched the document since it was fetched.
    Loaded,
    /// The document was edited; `save` decides whether that is a change.
    Mutated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write `config-before.xml` and `config-after.xml` to the local save dir.
    pub save_config_locally: bool,
    /// Never write to the store.
    pub dry_run: bool,
}

impl SaveOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn locally(mut self) -> Self {
        self.save_config_locally = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The edited document is equivalent to the loaded one; no write issued.
    Unchanged,
    /// The store accepted the document; the session now holds the new revision.
    Written,
    /// There were changes but the dry run kept them local.
    DryRun,
}

struct Loaded {
    document: Document,
    initial_config: String,
    baseline: String,
    token: ConcurrencyToken,
}

pub struct ConfigSession {
    store: Arc<dyn ConfigStore>,
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    defaults: ConfigDefaults,
    document: RefCell<Document>,
    initial_config: String,
    /// Reordered compact rendering of the loaded document.
    baseline: String,
    token: ConcurrencyToken,
    loaded_revision: u64,
}

impl ConfigSession {
    /// Fetch the document and open a session on it.
    #[instrument(level = "debug", skip_all)]
    pub fn load(
        store: Arc<dyn ConfigStore>,
        fs: Arc<dyn FileSystem>,
        settings: Arc<Settings>,
    ) -> ApplicationResult<Self> {
        let loaded = Self::fetch(store.as_ref())?;
        let defaults = settings.defaults();
        let loaded_revision = loaded.document.revision();
        Ok(Self {
            store,
            fs,
            settings,
            defaults,
            document: RefCell::new(loaded.document),
            initial_config: loaded.initial_config,
            baseline: loaded.baseline,
            token: loaded.token,
            loaded_revision,
        })
    }

    fn fetch(store: &dyn ConfigStore) -> ApplicationResult<Loaded> {
        let fetched = store.fetch()?;
        let mut document = Document::parse(&fetched.document)?;
        reorder_document(&mut document)?;
        info!(
            "load: token={} bytes={} elements={}",
            fetched.token,
            fetched.document.len(),
            document.len()
        );
        Ok(Loaded {
            baseline: document.to_xml(),
            document,
            initial_config: fetched.document,
            token: fetched.token,
        })
    }

    /// Discard local edits and load the stored document again.
    #[instrument(level = "debug", skip(self))]
    pub fn reload(&mut self) -> ApplicationResult<()> {
        let loaded = Self::fetch(self.store.as_ref())?;
        debug!("reload: old_token={} new_token={}", self.token, loaded.token);
        self.loaded_revision = loaded.document.revision();
        self.document = RefCell::new(loaded.document);
        self.initial_config = loaded.initial_config;
        self.baseline = loaded.baseline;
        self.token = loaded.token;
        Ok(())
    }

    /// Entry point for reading and editing the document.
    pub fn root(&self) -> ConfigRoot<'_> {
        TreeRef::new(&self.document, &self.defaults).root()
    }

    pub fn token(&self) -> &ConcurrencyToken {
        &self.token
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        if self.document.borrow().revision() == self.loaded_revision {
            SessionState::Loaded
        } else {
            SessionState::Mutated
        }
    }

    /// The document text exactly as it was fetched.
    pub fn initial_config(&self) -> &str {
        &self.initial_config
    }

    /// The edited document, reordered, as it would be sent to the store.
    pub fn config(&self) -> ApplicationResult<String> {
        let mut document = self.document.borrow_mut();
        reorder_document(&mut document)?;
        Ok(document.to_xml())
    }

    /// What the store holds right now (a fresh fetch, not the session copy).
    pub fn current_config(&self) -> ApplicationResult<String> {
        Ok(self.store.fetch()?.document)
    }

    /// True if the edited document differs in substance from the loaded one.
    pub fn has_changes(&self) -> ApplicationResult<bool> {
        Ok(has_changes(&self.baseline, &self.config()?)?)
    }

    /// Write the document back if it changed.
    ///
    /// A conflict is returned as an error and leaves the store untouched;
    /// the session keeps its edits so the caller can inspect them.
    ///
    /// Once the store accepts the write the outcome is `Written`, even if
    /// fetching the new revision afterwards fails. In that case the session
    /// keeps the old token, so a further `save` conflicts until `reload`
    /// succeeds.
    #[instrument(level = "debug", skip(self))]
    pub fn save(&mut self, options: SaveOptions) -> ApplicationResult<SaveOutcome> {
        let after = self.config()?;
        if options.save_config_locally {
            self.save_snapshots(&after)?;
        }

        if !has_changes(&self.baseline, &after)? {
            info!("save: unchanged, no write");
            self.loaded_revision = self.document.borrow().revision();
            return Ok(SaveOutcome::Unchanged);
        }
        if options.dry_run {
            info!("save: dry run, changes not written");
            return Ok(SaveOutcome::DryRun);
        }

        if let Err(e) = self.store.write(&after, &self.token) {
            warn!("save: write rejected token={}: {}", self.token, e);
            return Err(e.into());
        }
        info!("save: written bytes={}", after.len());
        if let Err(e) = self.reload() {
            warn!("save: written but reload failed, token is stale: {}", e);
            self.baseline = after;
            self.loaded_revision = self.document.borrow().revision();
        }
        Ok(SaveOutcome::Written)
    }

    fn save_snapshots(&self, after: &str) -> ApplicationResult<()> {
        let dir = &self.settings.local_save_dir;
        self.fs
            .create_dir_all(dir)
            .with_path_context("create snapshot dir", dir)?;

        let before_path: PathBuf = dir.join(BEFORE_SNAPSHOT);
        let after_path: PathBuf = dir.join(AFTER_SNAPSHOT);
        self.fs
            .write(&before_path, &reordered_canonical_form(&self.initial_config)?)
            .with_path_context("write snapshot", &before_path)?;
        self.fs
            .write(&after_path, &canonical_form(after)?)
            .with_path_context("write snapshot", &after_path)?;
        debug!("save_snapshots: dir={}", dir.display());
        Ok(())
    }

    /// Apply `mutation` and save; on conflict reload and apply it again.
    ///
    /// `mutation` must be expressed with ensure-operations so that running it
    /// against a freshly reloaded document is safe. Gives up after
    /// `max_attempts` tries (at least one) and returns the last conflict.
    pub fn apply_with_reload<F>(
        &mut self,
        max_attempts: usize,
        options: SaveOptions,
        mut mutation: F,
    ) -> ApplicationResult<SaveOutcome>
    where
        F: FnMut(ConfigRoot<'_>) -> DomainResult<()>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            mutation(self.root())?;
            match self.save(options) {
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    warn!("apply_with_reload: conflict on attempt {}, reloading", attempt);
                    self.reload()?;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
