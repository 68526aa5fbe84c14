//! Tracked Data Store
//!
//! Cross-session state consulted by the inclusion policy and written back by
//! the navigation hooks. The store is an explicit context object owned by
//! the host; nothing in this crate holds a global instance.
//!
//! Implementations only provide a snapshot read and an in-place update. All
//! field accessors and the bookkeeping helpers are built on those two.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::result::{QuestionResult, StepResult};
use crate::step::Step;
use crate::tracked::{TrackedItem, TrackingType};

/// Error type for store persistence
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store contents: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted tracked-data state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataStoreState {
    /// `None` until the participant has made a first selection
    #[serde(default)]
    pub selected_items: Option<Vec<TrackedItem>>,
    #[serde(default)]
    pub last_tracking_survey_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_completion_date: Option<DateTime<Utc>>,
    /// Cached activity-only steps
    #[serde(default)]
    pub moment_in_day_steps: Option<Vec<Step>>,
    #[serde(default)]
    pub moment_in_day_results: Option<Vec<StepResult>>,
}

impl DataStoreState {
    /// True if any selected item is being tracked.
    pub fn has_tracked_items(&self) -> bool {
        self.selected_items
            .as_deref()
            .is_some_and(crate::tracked::any_tracking)
    }
}

/// Read/write contract for the tracked data store.
pub trait DataStore {
    /// Current state.
    fn snapshot(&self) -> DataStoreState;

    /// Apply an in-place update.
    fn modify(&mut self, update: &mut dyn FnMut(&mut DataStoreState));

    fn selected_items(&self) -> Option<Vec<TrackedItem>> {
        self.snapshot().selected_items
    }

    fn set_selected_items(&mut self, items: Option<Vec<TrackedItem>>) {
        let mut items = items;
        self.modify(&mut |state| state.selected_items = items.take());
    }

    fn last_tracking_survey_date(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_tracking_survey_date
    }

    fn set_last_tracking_survey_date(&mut self, date: Option<DateTime<Utc>>) {
        self.modify(&mut |state| state.last_tracking_survey_date = date);
    }

    fn last_completion_date(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_completion_date
    }

    fn set_last_completion_date(&mut self, date: Option<DateTime<Utc>>) {
        self.modify(&mut |state| state.last_completion_date = date);
    }

    fn moment_in_day_steps(&self) -> Option<Vec<Step>> {
        self.snapshot().moment_in_day_steps
    }

    fn set_moment_in_day_steps(&mut self, steps: Option<Vec<Step>>) {
        let mut steps = steps;
        self.modify(&mut |state| state.moment_in_day_steps = steps.take());
    }

    fn moment_in_day_results(&self) -> Option<Vec<StepResult>> {
        self.snapshot().moment_in_day_results
    }

    fn set_moment_in_day_results(&mut self, results: Option<Vec<StepResult>>) {
        let mut results = results;
        self.modify(&mut |state| state.moment_in_day_results = results.take());
    }

    /// A previously recorded result for `step`, if the store has one.
    ///
    /// Selection steps get the stored selection; activity steps get the last
    /// moment-in-day result recorded for them.
    fn step_result(&self, step: &Step) -> Option<StepResult> {
        let state = self.snapshot();
        match step.tracking_type? {
            TrackingType::Selection => {
                let items = state.selected_items?;
                let identifier = step
                    .tracked_result_identifier
                    .clone()
                    .unwrap_or_else(|| step.identifier.clone());
                Some(StepResult::new(
                    step.identifier.clone(),
                    vec![QuestionResult::selection(identifier, items)],
                ))
            }
            TrackingType::Activity => state
                .moment_in_day_results?
                .into_iter()
                .find(|r| r.step_identifier == step.identifier),
            TrackingType::Changed => None,
        }
    }

    /// Replace the selection with a newly recorded one.
    fn update_tracked_data(&mut self, items: Vec<TrackedItem>, now: DateTime<Utc>) {
        tracing::info!(count = items.len(), "recording tracked item selection");
        let mut items = Some(items);
        self.modify(&mut |state| {
            state.selected_items = items.take();
            state.last_tracking_survey_date = Some(now);
        });
    }

    /// Record a moment-in-day result, replacing any earlier result for the
    /// same step.
    fn update_moment_in_day(&mut self, result: StepResult, now: DateTime<Utc>) {
        tracing::info!(step = %result.step_identifier, "recording moment-in-day result");
        let mut result = Some(result);
        self.modify(&mut |state| {
            let Some(result) = result.take() else {
                return;
            };
            let results = state.moment_in_day_results.get_or_insert_with(Vec::new);
            results.retain(|r| r.step_identifier != result.step_identifier);
            results.push(result);
            state.last_completion_date = Some(now);
        });
    }
}

/// In-memory store (for tests and hosts that persist elsewhere)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: DataStoreState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: DataStoreState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DataStoreState {
        &self.state
    }
}

impl DataStore for MemoryStore {
    fn snapshot(&self) -> DataStoreState {
        self.state.clone()
    }

    fn modify(&mut self, update: &mut dyn FnMut(&mut DataStoreState)) {
        update(&mut self.state);
    }
}

/// Store persisted as a JSON document. Updates are held in memory until
/// [`JsonFileStore::flush`] is called.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: DataStoreState,
    dirty: bool,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&contents)?
        } else {
            tracing::debug!(path = %path.display(), "store file not found, starting empty");
            DataStoreState::default()
        };

        Ok(Self {
            path,
            state,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write pending changes to disk.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.path, contents).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        Ok(())
    }
}

impl DataStore for JsonFileStore {
    fn snapshot(&self) -> DataStoreState {
        self.state.clone()
    }

    fn modify(&mut self, update: &mut dyn FnMut(&mut DataStoreState)) {
        update(&mut self.state);
        self.dirty = true;
    }
}

/// Serializes access to a store shared between several controllers.
pub struct SharedStore<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DataStore> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Lock the underlying store. A poisoned lock still yields the store; the
    /// state is plain data and stays consistent between updates.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: DataStore> DataStore for SharedStore<S> {
    fn snapshot(&self) -> DataStoreState {
        self.lock().snapshot()
    }

    fn modify(&mut self, update: &mut dyn FnMut(&mut DataStoreState)) {
        self.lock().modify(update);
    }
}
