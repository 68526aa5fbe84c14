//! Assembled steps

use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;
use crate::item_type::StepKind;
use crate::result::StepResult;
use crate::rule::CompiledRule;
use crate::task::Task;
use crate::tracked::{any_tracking, TrackedItem, TrackingType};

/// When a tracked step should be skipped, given the participant's current
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedSkipRule {
    /// Skip unless at least one selected item is being tracked
    NoTrackedItems,
}

impl TrackedSkipRule {
    pub fn evaluate(&self, selected_items: &[TrackedItem]) -> bool {
        match self {
            TrackedSkipRule::NoTrackedItems => !any_tracking(selected_items),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub value: AnswerValue,
}

/// A concrete step in an assembled task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub identifier: String,
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_type: Option<TrackingType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<CompiledRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    /// Question result that carries the selection payload of a selection step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_result_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_rule: Option<TrackedSkipRule>,

    // Container steps only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtask: Option<Box<Task>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_identifier: Option<String>,
}

impl Step {
    pub fn new(identifier: impl Into<String>, kind: StepKind) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            title: None,
            text: None,
            tracking_type: None,
            rules: Vec::new(),
            choices: Vec::new(),
            tracked_result_identifier: None,
            skip_rule: None,
            subtask: None,
            task_identifier: None,
            schema_identifier: None,
        }
    }

    /// Container step wrapping a nested task.
    pub fn subtask(task: Task) -> Self {
        let mut step = Step::new(task.identifier.clone(), StepKind::Subtask);
        step.subtask = Some(Box::new(task));
        step
    }

    /// Tracked steps take part in selection-aware navigation.
    pub fn is_tracked_navigation_step(&self) -> bool {
        self.tracking_type.is_some()
    }

    /// Evaluate the tracked skip rule against the given selection.
    pub fn should_skip_step(&self, selected_items: &[TrackedItem]) -> bool {
        self.skip_rule
            .map(|rule| rule.evaluate(selected_items))
            .unwrap_or(false)
    }

    /// Skip target of the first rule satisfied by this step's result.
    pub fn matching_skip_identifier(&self, result: Option<&StepResult>) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.evaluate(result))
            .map(|rule| rule.skip_identifier.as_str())
    }
}
