//! Assembled tasks
//!
//! An ordered, navigable sequence of steps. Rules compiled onto a step can
//! jump forward to another step. The null-step sentinel, a target that is not
//! part of the task, or a target at or before the current step all continue
//! with the next step in order, so navigation always terminates.

use serde::{Deserialize, Serialize};

use crate::navigation::NavigationEngine;
use crate::result::{StepResult, TaskResult};
use crate::rule::NULL_STEP_IDENTIFIER;
use crate::step::Step;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub identifier: String,
    pub steps: Vec<Step>,
    /// Tracked-data navigation hooks, when the task came from a tracked
    /// collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationEngine>,
    /// Results known before the task starts (for example an earlier selection)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_results: Vec<StepResult>,
}

impl Task {
    pub fn new(identifier: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            identifier: identifier.into(),
            steps,
            navigation: None,
            initial_results: Vec::new(),
        }
    }

    pub fn step(&self, identifier: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.identifier == identifier)
    }

    pub fn index_of(&self, identifier: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.identifier == identifier)
    }

    pub fn step_identifiers(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.identifier.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// A result set seeded with the task's initial results.
    pub fn initial_task_result(&self) -> TaskResult {
        TaskResult::with_results(self.initial_results.clone())
    }

    /// The step that follows `current` given the results so far. `None` as
    /// `current` starts the task; a `None` return ends it.
    pub fn next_step(&self, current: Option<&str>, results: &TaskResult) -> Option<&Step> {
        let Some(current_id) = current else {
            return self.steps.first();
        };
        let index = self.index_of(current_id)?;
        let current_step = &self.steps[index];

        if let Some(target) =
            current_step.matching_skip_identifier(results.step_result(current_id))
        {
            if target != NULL_STEP_IDENTIFIER {
                match self.index_of(target) {
                    Some(target_index) if target_index > index => {
                        return self.steps.get(target_index);
                    }
                    Some(_) => {
                        tracing::debug!(step = current_id, target, "ignoring backward skip target")
                    }
                    None => tracing::debug!(step = current_id, target, "skip target not in task"),
                }
            }
        }

        self.steps.get(index + 1)
    }
}
