//! Reconciliation engine: initial load, full reloads and change batches.
//!
//! ```text
//!   Idle ──initial_load──▶ InitialLoad ──▶ Idle ◀──▶ ProcessingBatch
//! ```
//!
//! A cycle lock serializes initial load, full reloads and batches. Template
//! and data state sits behind a second lock that is only held long enough to
//! mutate it or take a snapshot; template execution, file I/O and hook starts
//! run without it.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use confd_core::{address, config::ConfdConfig, ChangeBatch, ChangeKind, NamespaceContent};
use confd_renderer::{DataSnapshot, DataStore, RenderError, TemplateStore};

use crate::error::SyncError;
use crate::hooks::HookRunner;
use crate::source::{ChangeListener, ConfigSource};
use crate::watch_index::WatchIndex;
use crate::writer;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Counters from one full render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub rendered: usize,
    pub changed: usize,
    pub failed: usize,
}

impl LoadSummary {
    /// `true` if any file's content changed.
    pub fn any_changed(&self) -> bool {
        self.changed > 0
    }
}

/// What one change batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Deduplicated indices of groups whose files changed or were removed.
    pub affected: BTreeSet<usize>,
    pub data_changed: bool,
    pub hooks_started: usize,
}

/// One (address, group) pair rendered in memory, next to what is on disk.
#[derive(Debug)]
pub struct PreviewEntry {
    pub address: String,
    pub path: PathBuf,
    /// `Ok(None)` when the file does not exist.
    pub current: Result<Option<String>, SyncError>,
    pub rendered: Result<String, RenderError>,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    templates: TemplateStore,
    data: DataStore,
}

/// Owns template/data state and turns remote changes into renders and hooks.
pub struct Reconciler {
    source: Arc<dyn ConfigSource>,
    namespaces: Vec<String>,
    index: WatchIndex,
    hooks: Arc<dyn HookRunner>,
    state: Mutex<StoreState>,
    cycle: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        namespaces: Vec<String>,
        index: WatchIndex,
        hooks: Arc<dyn HookRunner>,
    ) -> Self {
        Self {
            source,
            namespaces,
            index,
            hooks,
            state: Mutex::new(StoreState::default()),
            cycle: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &ConfdConfig,
        source: Arc<dyn ConfigSource>,
        hooks: Arc<dyn HookRunner>,
    ) -> Self {
        Self::new(
            source,
            config.apollo.namespaces.clone(),
            WatchIndex::from_config(config),
            hooks,
        )
    }

    pub fn index(&self) -> &WatchIndex {
        &self.index
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn has_template(&self, address: &str) -> bool {
        self.lock_state().templates.contains(address)
    }

    pub fn has_data(&self, name: &str) -> bool {
        self.lock_state().data.contains(name)
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load every configured namespace, then render every watched file.
    ///
    /// A fetch failure for any namespace aborts with an error; bad template
    /// text or bad JSON is logged and skipped.
    pub fn initial_load(&self) -> Result<LoadSummary, SyncError> {
        let _cycle = lock(&self.cycle);
        for namespace in &self.namespaces {
            self.load_namespace(namespace)?;
        }
        let summary = self.load_all_locked();
        tracing::info!(
            rendered = summary.rendered,
            changed = summary.changed,
            failed = summary.failed,
            "initial load complete",
        );
        Ok(summary)
    }

    /// Re-render every (address, group) pair.
    pub fn load_all(&self) -> LoadSummary {
        let _cycle = lock(&self.cycle);
        self.load_all_locked()
    }

    /// Fetch `namespace` and fold it into template or data state.
    pub fn load_namespace(&self, namespace: &str) -> Result<(), SyncError> {
        let content = self.source.fetch_namespace(namespace)?;
        let mut state = self.lock_state();
        match content {
            NamespaceContent::Data { content } => {
                let name = address::data_set_name(namespace);
                if let Err(err) = state.data.upsert(name, &content) {
                    tracing::error!(namespace, error = %err, "failed to load data namespace");
                }
            }
            NamespaceContent::Entries(entries) => {
                for (key, text) in entries {
                    let addr = address::join(namespace, &key);
                    if let Err(err) = state.templates.load(&addr, &text) {
                        tracing::error!(namespace, key = %key, error = %err, "failed to load template");
                    }
                }
            }
        }
        Ok(())
    }

    fn load_all_locked(&self) -> LoadSummary {
        let (templates, data) = self.snapshot();
        let mut summary = LoadSummary::default();
        for (addr, indices) in self.index.entries() {
            for group in indices.iter().filter_map(|i| self.index.group(*i)) {
                let path = writer::target_path(&group.path, addr);
                match writer::render_and_save(&templates, &data, addr, &group.path) {
                    Ok(changed) => {
                        summary.rendered += 1;
                        if changed {
                            summary.changed += 1;
                        }
                        tracing::info!(address = %addr, path = %path.display(), changed, "rendered file");
                    }
                    Err(err) => {
                        summary.failed += 1;
                        tracing::error!(
                            address = %addr,
                            path = %path.display(),
                            error = %err,
                            "failed to render file",
                        );
                    }
                }
            }
        }
        summary
    }

    // -----------------------------------------------------------------------
    // Change batches
    // -----------------------------------------------------------------------

    /// Apply one change batch, then start each affected group's hook once.
    pub fn on_change_batch(&self, batch: &ChangeBatch) -> BatchOutcome {
        let cycle = lock(&self.cycle);
        let mut outcome = BatchOutcome::default();

        if batch.is_empty() {
            tracing::debug!(namespace = %batch.namespace, "ignoring empty change batch");
            return outcome;
        }

        let namespace = batch.namespace.as_str();
        let is_data = address::is_data_namespace(namespace);

        for change in &batch.changes {
            let addr = address::join(namespace, &change.key);
            let groups = self.index.lookup(&addr);
            match (change.kind, is_data) {
                (ChangeKind::Deleted, true) => {
                    tracing::info!(namespace, "removing data namespace on change");
                    self.lock_state()
                        .data
                        .remove(address::data_set_name(namespace));
                    outcome.data_changed = true;
                }
                (ChangeKind::Deleted, false) => {
                    for &i in groups {
                        let Some(group) = self.index.group(i) else { continue };
                        let path = writer::target_path(&group.path, &addr);
                        tracing::info!(path = %path.display(), "removing local file on change");
                        match std::fs::remove_file(&path) {
                            Ok(()) => {}
                            Err(err) if err.kind() == ErrorKind::NotFound => {
                                tracing::debug!(path = %path.display(), "file already absent");
                            }
                            Err(err) => {
                                tracing::error!(path = %path.display(), error = %err, "failed to remove local file");
                            }
                        }
                        outcome.affected.insert(i);
                    }
                }
                (ChangeKind::Added | ChangeKind::Modified, true) => {
                    tracing::info!(namespace, "reloading data namespace on change");
                    if let Err(err) = self.load_namespace(namespace) {
                        tracing::error!(namespace, error = %err, "failed to reload data namespace");
                    }
                    outcome.data_changed = true;
                }
                (ChangeKind::Added | ChangeKind::Modified, false) => {
                    if groups.is_empty() {
                        continue;
                    }
                    let Some(text) = change.new_value.as_deref() else {
                        tracing::warn!(address = %addr, "change carries no value; skipping");
                        continue;
                    };
                    tracing::info!(address = %addr, "loading template on change");
                    if let Err(err) = self.lock_state().templates.load(&addr, text) {
                        tracing::error!(address = %addr, error = %err, "failed to load template on change");
                        continue;
                    }
                    let (templates, data) = self.snapshot();
                    for &i in groups {
                        let Some(group) = self.index.group(i) else { continue };
                        match writer::render_and_save(&templates, &data, &addr, &group.path) {
                            Ok(true) => {
                                outcome.affected.insert(i);
                            }
                            Ok(false) => {
                                tracing::debug!(address = %addr, group = i, "content unchanged");
                            }
                            Err(err) => {
                                tracing::error!(
                                    address = %addr,
                                    path = %group.path.display(),
                                    error = %err,
                                    "failed to render file on change",
                                );
                            }
                        }
                    }
                }
            }
        }

        if outcome.data_changed {
            tracing::info!("data changed, reloading all files");
            if self.load_all_locked().any_changed() {
                outcome.affected.extend(self.index.all_indices());
            }
        }
        drop(cycle);

        outcome.hooks_started = self.fire_hooks(&outcome.affected);
        outcome
    }

    fn fire_hooks(&self, affected: &BTreeSet<usize>) -> usize {
        let mut started = 0;
        for group in affected.iter().filter_map(|i| self.index.group(*i)) {
            if !group.has_hook() {
                continue;
            }
            tracing::info!(command = %group.on_change, "file changed, starting on-change command");
            match self.hooks.start(&group.on_change) {
                Ok(()) => started += 1,
                Err(err) => tracing::error!(error = %err, "failed to start on-change command"),
            }
        }
        started
    }

    // -----------------------------------------------------------------------
    // Preview
    // -----------------------------------------------------------------------

    /// Render every (address, group) pair in memory without touching disk.
    ///
    /// An unreadable target file is recorded on its own entry.
    pub fn preview(&self) -> Vec<PreviewEntry> {
        let _cycle = lock(&self.cycle);
        let (templates, data) = self.snapshot();
        let mut entries = Vec::new();
        for (addr, indices) in self.index.entries() {
            for group in indices.iter().filter_map(|i| self.index.group(*i)) {
                let path = writer::target_path(&group.path, addr);
                let current = match std::fs::read_to_string(&path) {
                    Ok(content) => Ok(Some(content)),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(crate::error::io_err(&path, err)),
                };
                entries.push(PreviewEntry {
                    address: addr.to_string(),
                    path,
                    current,
                    rendered: templates.render(addr, &data),
                });
            }
        }
        entries
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn snapshot(&self) -> (TemplateStore, DataSnapshot) {
        let state = self.lock_state();
        (state.templates.clone(), state.data.snapshot())
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        lock(&self.state)
    }
}

impl ChangeListener for Reconciler {
    fn on_batch(&self, batch: &ChangeBatch) {
        let outcome = self.on_change_batch(batch);
        tracing::info!(
            namespace = %batch.namespace,
            changes = batch.changes.len(),
            affected = outcome.affected.len(),
            data_changed = outcome.data_changed,
            hooks_started = outcome.hooks_started,
            "processed change batch",
        );
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
