//! Navigation Engine
//!
//! Run-time hooks bound to a task assembled from a tracked collection. The
//! engine never changes the step the host proposes; it decides whether a
//! tracked step should be skipped and writes selections and activity results
//! back to the data store as the participant moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::TaskResult;
use crate::step::Step;
use crate::store::DataStore;
use crate::task::Task;
use crate::tracked::TrackingType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationEngine {
    /// Identifier of the step whose selection payload updates the store.
    /// When unset any selection step does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_step_identifier: Option<String>,
}

impl NavigationEngine {
    pub fn new(selection_step_identifier: Option<String>) -> Self {
        Self {
            selection_step_identifier,
        }
    }

    /// Whether `step` should be skipped given the results so far.
    ///
    /// Only tracked steps are ever skipped. The selection in effect is the
    /// newest selection recorded in `results`, falling back to the store's
    /// when `results` hold none.
    ///
    /// The two sources agree only while the host calls [`Self::after_step`]
    /// (or [`Self::advance`]) on every transition, since that is what writes
    /// a fresh selection to the store. A host that skips the hook keeps a
    /// stale store selection for every later task.
    pub fn should_skip(&self, step: &Step, results: &TaskResult, store: &dyn DataStore) -> bool {
        if !step.is_tracked_navigation_step() {
            return false;
        }

        let skip = match results.latest_selection() {
            Some(items) => step.should_skip_step(items),
            None => {
                let items = store.selected_items().unwrap_or_default();
                step.should_skip_step(&items)
            }
        };

        if skip {
            tracing::debug!(step = %step.identifier, "skipping tracked step");
        }
        skip
    }

    /// Hook run when leaving `previous` for `proposed_next`. Updates the
    /// store from the results of `previous` and returns `proposed_next`
    /// unchanged.
    pub fn after_step<'a>(
        &self,
        previous: Option<&Step>,
        proposed_next: Option<&'a Step>,
        results: &TaskResult,
        store: &mut dyn DataStore,
        now: DateTime<Utc>,
    ) -> Option<&'a Step> {
        let Some(step) = previous else {
            return proposed_next;
        };

        match step.tracking_type {
            Some(TrackingType::Selection) if self.is_selection_step(step) => {
                let payload = results.step_result(&step.identifier).and_then(|r| {
                    r.selection_payload(step.tracked_result_identifier.as_deref())
                });
                if let Some(items) = payload {
                    store.update_tracked_data(items.to_vec(), now);
                }
            }
            Some(TrackingType::Activity) => {
                if let Some(result) = results.step_result(&step.identifier) {
                    store.update_moment_in_day(result.clone(), now);
                }
            }
            _ => {}
        }

        proposed_next
    }

    /// One host-controller transition: run the leave hook for `current`,
    /// pick the next step by rule, then step over tracked steps that should
    /// be skipped. `None` as `current` starts the task; a `None` return ends
    /// it.
    pub fn advance<'a>(
        &self,
        task: &'a Task,
        current: Option<&str>,
        results: &TaskResult,
        store: &mut dyn DataStore,
        now: DateTime<Utc>,
    ) -> Option<&'a Step> {
        let previous = current.and_then(|id| task.step(id));
        let proposed = task.next_step(current, results);
        let mut next = self.after_step(previous, proposed, results, store, now);

        // Skipped steps have no answers, so their rules are not consulted
        let mut remaining = task.steps.len();
        while let Some(step) = next {
            if remaining == 0 || !self.should_skip(step, results, &*store) {
                break;
            }
            remaining -= 1;
            next = task
                .index_of(&step.identifier)
                .and_then(|index| task.steps.get(index + 1));
        }
        next
    }

    fn is_selection_step(&self, step: &Step) -> bool {
        self.selection_step_identifier
            .as_deref()
            .map_or(true, |id| id == step.identifier)
    }
}
