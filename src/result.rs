//! Recorded results
//!
//! Answers accumulated while a task runs. A step result groups the question
//! results recorded for one step; a question result carries either an answer
//! or a tracked-data selection payload.

use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;
use crate::tracked::TrackedItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ResultData {
    Answer(Option<AnswerValue>),
    Selection(Vec<TrackedItem>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub identifier: String,
    pub data: ResultData,
}

impl QuestionResult {
    pub fn answer(identifier: impl Into<String>, answer: Option<AnswerValue>) -> Self {
        Self {
            identifier: identifier.into(),
            data: ResultData::Answer(answer),
        }
    }

    pub fn selection(identifier: impl Into<String>, items: Vec<TrackedItem>) -> Self {
        Self {
            identifier: identifier.into(),
            data: ResultData::Selection(items),
        }
    }

    /// The recorded answer. Selection payloads have no answer value.
    pub fn answer_value(&self) -> Option<&AnswerValue> {
        match &self.data {
            ResultData::Answer(answer) => answer.as_ref(),
            ResultData::Selection(_) => None,
        }
    }

    pub fn selected_items(&self) -> Option<&[TrackedItem]> {
        match &self.data {
            ResultData::Selection(items) => Some(items),
            ResultData::Answer(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_identifier: String,
    #[serde(default)]
    pub results: Vec<QuestionResult>,
}

impl StepResult {
    pub fn new(step_identifier: impl Into<String>, results: Vec<QuestionResult>) -> Self {
        Self {
            step_identifier: step_identifier.into(),
            results,
        }
    }

    pub fn result(&self, identifier: &str) -> Option<&QuestionResult> {
        self.results.iter().find(|r| r.identifier == identifier)
    }

    /// Selection payload recorded under `identifier`, or the first selection
    /// payload in the step when no identifier is given.
    pub fn selection_payload(&self, identifier: Option<&str>) -> Option<&[TrackedItem]> {
        match identifier {
            Some(id) => self.result(id).and_then(QuestionResult::selected_items),
            None => self.results.iter().find_map(QuestionResult::selected_items),
        }
    }
}

/// All step results recorded so far for a running task, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub step_results: Vec<StepResult>,
}

impl TaskResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(step_results: Vec<StepResult>) -> Self {
        Self { step_results }
    }

    pub fn step_result(&self, step_identifier: &str) -> Option<&StepResult> {
        self.step_results
            .iter()
            .find(|r| r.step_identifier == step_identifier)
    }

    /// Record a step result, replacing any earlier result for the same step.
    pub fn record(&mut self, result: StepResult) {
        self.step_results
            .retain(|r| r.step_identifier != result.step_identifier);
        self.step_results.push(result);
    }

    /// The most recently recorded selection payload, if any.
    pub fn latest_selection(&self) -> Option<&[TrackedItem]> {
        self.step_results
            .iter()
            .rev()
            .find_map(|r| r.selection_payload(None))
    }
}
