//! Task Assembly
//!
//! A tracked collection is a recurring bundle of survey and activity steps.
//! Each run, the inclusion policy picks the slice the participant sees and
//! assembly materializes that slice into a navigable [`Task`].
//!
//! Assembly is deterministic: the same descriptors, decision and store
//! contents always produce the same ordered steps.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::descriptor::{DescriptorEntry, StepDescriptor};
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::factory::StepFactory;
use crate::navigation::NavigationEngine;
use crate::policy::{
    InclusionDecision, InclusionPolicy, NoChangeTarget, DEFAULT_ACTIVITY_REPEAT_SECONDS,
    DEFAULT_SURVEY_REPEAT_SECONDS,
};
use crate::rule::NULL_STEP_IDENTIFIER;
use crate::step::Step;
use crate::store::DataStore;
use crate::task::Task;
use crate::tracked::{TrackedItem, TrackingType};

// ============================================================================
// Collection definition
// ============================================================================

/// Definition of a recurring tracked-data bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedCollection {
    #[serde(default = "default_task_identifier")]
    pub task_identifier: String,
    /// Defaults to the task identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_identifier: Option<String>,
    #[serde(default)]
    pub always_include_activity_steps: bool,
    #[serde(
        default = "default_survey_repeat_interval",
        with = "interval_seconds"
    )]
    pub survey_repeat_interval: Duration,
    #[serde(
        default = "default_activity_repeat_interval",
        with = "interval_seconds"
    )]
    pub activity_repeat_interval: Duration,
    /// Everything the participant can choose to track
    #[serde(default)]
    pub items: Vec<TrackedItem>,
    #[serde(default)]
    pub steps: Vec<DescriptorEntry>,
}

fn default_task_identifier() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_survey_repeat_interval() -> Duration {
    Duration::seconds(DEFAULT_SURVEY_REPEAT_SECONDS)
}

fn default_activity_repeat_interval() -> Duration {
    Duration::seconds(DEFAULT_ACTIVITY_REPEAT_SECONDS)
}

/// Repeat intervals are configured as whole seconds.
mod interval_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Duration::try_seconds(seconds)
            .ok_or_else(|| serde::de::Error::custom(format!("interval out of range: {seconds}s")))
    }
}

/// Output of one assembly run.
#[derive(Debug, Clone)]
pub struct AssembledTask {
    pub task: Task,
    pub decision: InclusionDecision,
    pub first_activity_step_identifier: Option<String>,
    pub diagnostics: Diagnostics,
}

impl AssembledTask {
    /// Wrap the task in a container step. External identifiers are only
    /// attached when the full survey was included; a partial run stays
    /// anonymous.
    pub fn into_container_step(self, task_identifier: &str, schema_identifier: &str) -> Step {
        let include_ids = self.decision.includes_full_survey();
        let mut step = Step::subtask(self.task);
        if include_ids {
            step.task_identifier = Some(task_identifier.to_string());
            step.schema_identifier = Some(schema_identifier.to_string());
        }
        step
    }
}

impl TrackedCollection {
    pub fn new(task_identifier: impl Into<String>, steps: Vec<DescriptorEntry>) -> Self {
        Self {
            task_identifier: task_identifier.into(),
            schema_identifier: None,
            always_include_activity_steps: false,
            survey_repeat_interval: default_survey_repeat_interval(),
            activity_repeat_interval: default_activity_repeat_interval(),
            items: Vec::new(),
            steps,
        }
    }

    pub fn with_items(mut self, items: Vec<TrackedItem>) -> Self {
        self.items = items;
        self
    }

    pub fn schema_identifier(&self) -> &str {
        self.schema_identifier
            .as_deref()
            .unwrap_or(&self.task_identifier)
    }

    pub fn policy(&self) -> InclusionPolicy {
        InclusionPolicy {
            always_include_activity: self.always_include_activity_steps,
            survey_repeat_interval: self.survey_repeat_interval,
            activity_repeat_interval: self.activity_repeat_interval,
        }
    }

    /// Well-formed descriptors, in configured order.
    pub fn descriptors(&self) -> impl Iterator<Item = &StepDescriptor> {
        self.steps.iter().filter_map(|entry| match entry {
            DescriptorEntry::Step(descriptor) => Some(descriptor),
            DescriptorEntry::Unrecognized(_) => None,
        })
    }

    /// First descriptor tagged with `tracking_type`.
    pub fn find_step(&self, tracking_type: TrackingType) -> Option<&StepDescriptor> {
        self.descriptors()
            .find(|d| d.tracking_type == Some(tracking_type))
    }

    pub fn has_tracked_items(&self, store: &dyn DataStore) -> bool {
        store.snapshot().has_tracked_items()
    }

    /// Decide what to include from the current store contents.
    pub fn decide(
        &self,
        is_last_step: bool,
        store: &dyn DataStore,
        now: DateTime<Utc>,
    ) -> InclusionDecision {
        let state = store.snapshot();
        self.policy().decide(
            is_last_step,
            &state,
            self.find_step(TrackingType::Changed).is_some(),
            state.has_tracked_items(),
            now,
        )
    }

    /// Materialize the steps `decision` permits into a task.
    pub fn assemble(
        &self,
        factory: &dyn StepFactory,
        decision: InclusionDecision,
        store: &dyn DataStore,
    ) -> AssembledTask {
        let mut diagnostics = Diagnostics::new();
        let mut steps: Vec<Step> = Vec::new();
        let mut initial_results = Vec::new();
        let mut first_activity_step_identifier: Option<String> = None;
        let mut selection_step_identifier: Option<String> = None;

        for entry in &self.steps {
            let descriptor = match entry {
                DescriptorEntry::Step(descriptor) => descriptor,
                DescriptorEntry::Unrecognized(value) => {
                    diagnostics.push(Diagnostic::warning(
                        DiagnosticCode::MalformedDescriptor,
                        format!("skipping entry that is not a step descriptor: {value}"),
                    ));
                    continue;
                }
            };

            let step = match descriptor.tracking_type {
                Some(tracking_type) => {
                    if !decision.should_include(tracking_type) {
                        continue;
                    }
                    let Some(step) = factory.create_tracked_step(
                        descriptor,
                        tracking_type,
                        &self.items,
                        &mut diagnostics,
                    ) else {
                        continue;
                    };

                    match tracking_type {
                        TrackingType::Activity => {
                            first_activity_step_identifier
                                .get_or_insert_with(|| step.identifier.clone());
                        }
                        TrackingType::Selection => {
                            selection_step_identifier.get_or_insert_with(|| step.identifier.clone());
                            if let Some(result) = store.step_result(&step) {
                                initial_results.push(result);
                            }
                        }
                        TrackingType::Changed => {}
                    }
                    step
                }
                None => {
                    if !decision.includes_untagged() {
                        continue;
                    }
                    let Some(step) = factory.create_step(descriptor, &mut diagnostics) else {
                        continue;
                    };
                    step
                }
            };

            steps.push(step);
        }

        // "No change" on the gate jumps straight into the activity steps
        if decision.next_step_if_no_change() == NoChangeTarget::Activity {
            if let (Some(target), Some(first)) =
                (first_activity_step_identifier.as_ref(), steps.first_mut())
            {
                if let Some(rule) = first.rules.iter_mut().find(|r| r.targets_null_step()) {
                    tracing::debug!(step = %first.identifier, %target, "linking gate to activity");
                    rule.skip_identifier = target.clone();
                }
            }
        }

        self.validate_skip_targets(&mut steps, &mut diagnostics);

        tracing::debug!(
            task = %self.task_identifier,
            %decision,
            steps = steps.len(),
            seeded = initial_results.len(),
            "assembled task"
        );

        let mut task = Task::new(self.schema_identifier().to_string(), steps);
        task.navigation = Some(NavigationEngine::new(selection_step_identifier));
        task.initial_results = initial_results;

        AssembledTask {
            task,
            decision,
            first_activity_step_identifier,
            diagnostics,
        }
    }

    /// Decide, assemble and cache the activity-only steps in the store the
    /// first time through.
    pub fn build_task(
        &self,
        factory: &dyn StepFactory,
        is_last_step: bool,
        store: &mut dyn DataStore,
        now: DateTime<Utc>,
    ) -> AssembledTask {
        let decision = self.decide(is_last_step, &*store, now);
        let assembled = self.assemble(factory, decision, &*store);

        if store.moment_in_day_steps().is_none() {
            let activity_steps = if decision == InclusionDecision::ActivityOnly {
                assembled.task.steps.clone()
            } else {
                self.assemble(factory, InclusionDecision::ActivityOnly, &*store)
                    .task
                    .steps
            };
            store.set_moment_in_day_steps(Some(activity_steps));
        }

        assembled
    }

    /// Build the task and wrap it in a container step for a larger flow.
    pub fn transform_to_step(
        &self,
        factory: &dyn StepFactory,
        is_last_step: bool,
        store: &mut dyn DataStore,
        now: DateTime<Utc>,
    ) -> Step {
        self.build_task(factory, is_last_step, store, now)
            .into_container_step(&self.task_identifier, self.schema_identifier())
    }

    /// Report rules whose target is neither the sentinel nor a known step.
    /// Targets defined in the collection but left out by this run are fine.
    /// A target at or before the owning step would loop, so it is reported and
    /// the rule falls back to the sentinel.
    fn validate_skip_targets(&self, steps: &mut [Step], diagnostics: &mut Diagnostics) {
        let mut positions: HashMap<String, usize> = HashMap::new();
        for (position, descriptor) in self.descriptors().enumerate() {
            positions
                .entry(descriptor.identifier.clone())
                .or_insert(position);
        }

        for step in steps.iter_mut() {
            let owner = positions.get(&step.identifier).copied();
            for rule in step.rules.iter_mut().filter(|r| !r.targets_null_step()) {
                match positions.get(&rule.skip_identifier) {
                    None => diagnostics.push(
                        Diagnostic::warning(
                            DiagnosticCode::UnknownSkipTarget,
                            format!("skip target '{}' is not a step", rule.skip_identifier),
                        )
                        .for_step(step.identifier.clone()),
                    ),
                    Some(&target) if owner.is_some_and(|owner| target <= owner) => {
                        diagnostics.push(
                            Diagnostic::warning(
                                DiagnosticCode::BackwardSkipTarget,
                                format!(
                                    "skip target '{}' does not come after the step",
                                    rule.skip_identifier
                                ),
                            )
                            .for_step(step.identifier.clone()),
                        );
                        rule.skip_identifier = NULL_STEP_IDENTIFIER.to_string();
                    }
                    Some(_) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerValue;
    use crate::factory::DefaultStepFactory;
    use crate::rule::RuleDescriptor;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn collection() -> TrackedCollection {
        let steps = vec![
            StepDescriptor::new("medicationChanged", Some("boolean"))
                .with_tracking(TrackingType::Changed)
                .with_rule(RuleDescriptor {
                    expected_answer: Some(AnswerValue::Bool(false)),
                    ..RuleDescriptor::default()
                }),
            StepDescriptor::new("intro", Some("instruction")),
            StepDescriptor::new("medicationSelection", Some("dataGroups"))
                .with_tracking(TrackingType::Selection),
            StepDescriptor::new("momentInDay", Some("singleChoiceText"))
                .with_tracking(TrackingType::Activity),
            StepDescriptor::new("timing", Some("timingRange"))
                .with_tracking(TrackingType::Activity),
        ];
        TrackedCollection::new("Medication Tracker", steps.into_iter().map(Into::into).collect())
            .with_items(vec![TrackedItem::new("levodopa", false)])
    }

    #[test]
    fn test_decision_none_emits_nothing() {
        let assembled =
            collection().assemble(&DefaultStepFactory, InclusionDecision::None, &MemoryStore::new());
        assert!(assembled.task.is_empty());
        assert!(assembled.first_activity_step_identifier.is_none());
    }

    #[test]
    fn test_changed_only_keeps_gate_target_on_sentinel() {
        let assembled = collection().assemble(
            &DefaultStepFactory,
            InclusionDecision::ChangedOnly,
            &MemoryStore::new(),
        );
        assert_eq!(
            assembled.task.step_identifiers(),
            vec!["medicationChanged", "intro"]
        );
        assert_eq!(assembled.task.steps[0].rules[0].skip_identifier, NULL_STEP_IDENTIFIER);
    }

    #[test]
    fn test_selection_result_is_preseeded() {
        let mut store = MemoryStore::new();
        store.set_selected_items(Some(vec![TrackedItem::new("levodopa", true)]));

        let assembled = collection().assemble(
            &DefaultStepFactory,
            InclusionDecision::SurveyAndActivity,
            &store,
        );

        assert_eq!(assembled.task.initial_results.len(), 1);
        assert_eq!(
            assembled.task.initial_results[0].step_identifier,
            "medicationSelection"
        );
        assert_eq!(
            assembled.task.navigation,
            Some(NavigationEngine::new(Some("medicationSelection".to_string())))
        );
    }

    #[test]
    fn test_malformed_entry_reported_and_skipped() {
        let mut collection = collection();
        collection
            .steps
            .push(DescriptorEntry::Unrecognized(serde_json::json!("not a step")));

        let assembled = collection.assemble(
            &DefaultStepFactory,
            InclusionDecision::StandAloneSurvey,
            &MemoryStore::new(),
        );

        assert_eq!(assembled.task.steps.len(), 5);
        assert_eq!(
            assembled
                .diagnostics
                .with_code(DiagnosticCode::MalformedDescriptor)
                .len(),
            1
        );
    }

    #[test]
    fn test_unknown_skip_target_reported() {
        let steps: Vec<DescriptorEntry> = vec![
            StepDescriptor::new("q1", Some("boolean"))
                .with_rule(RuleDescriptor::skip_when(true, "nowhere"))
                .into(),
            StepDescriptor::new("q2", Some("boolean"))
                .with_rule(RuleDescriptor::skip_when(true, "q3"))
                .into(),
            StepDescriptor::new("q3", Some("boolean")).into(),
        ];
        let assembled = TrackedCollection::new("task", steps).assemble(
            &DefaultStepFactory,
            InclusionDecision::StandAloneSurvey,
            &MemoryStore::new(),
        );

        let unknown = assembled
            .diagnostics
            .with_code(DiagnosticCode::UnknownSkipTarget);
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].step_identifier.as_deref(), Some("q1"));
        assert_eq!(assembled.task.steps[1].rules[0].skip_identifier, "q3");
    }

    #[test]
    fn test_backward_skip_target_falls_back_to_sentinel() {
        let steps: Vec<DescriptorEntry> = vec![
            StepDescriptor::new("q1", Some("boolean")).into(),
            StepDescriptor::new("q2", Some("boolean"))
                .with_rule(RuleDescriptor::skip_when(true, "q1"))
                .with_rule(RuleDescriptor::skip_when(false, "q2"))
                .into(),
            StepDescriptor::new("done", Some("instruction")).into(),
        ];
        let assembled = TrackedCollection::new("task", steps).assemble(
            &DefaultStepFactory,
            InclusionDecision::StandAloneSurvey,
            &MemoryStore::new(),
        );

        let backward = assembled
            .diagnostics
            .with_code(DiagnosticCode::BackwardSkipTarget);
        assert_eq!(backward.len(), 2);
        assert!(backward
            .iter()
            .all(|d| d.step_identifier.as_deref() == Some("q2")));
        assert!(assembled.task.steps[1]
            .rules
            .iter()
            .all(|r| r.skip_identifier == NULL_STEP_IDENTIFIER));
        assert!(assembled
            .diagnostics
            .with_code(DiagnosticCode::UnknownSkipTarget)
            .is_empty());
    }

    #[test]
    fn test_unparseable_rule_keeps_its_step() {
        let yaml = r#"
taskIdentifier: Mood
steps:
  - identifier: mood
    type: scaleInteger
    rules:
      - operator: between
        value: 3
  - identifier: done
    type: instruction
"#;
        let collection: TrackedCollection = serde_yaml::from_str(yaml).unwrap();
        let assembled = collection.assemble(
            &DefaultStepFactory,
            InclusionDecision::StandAloneSurvey,
            &MemoryStore::new(),
        );

        assert_eq!(assembled.task.step_identifiers(), vec!["mood", "done"]);
        assert!(assembled.task.steps[0].rules.is_empty());
        let malformed = assembled.diagnostics.with_code(DiagnosticCode::MalformedRule);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].step_identifier.as_deref(), Some("mood"));
        assert!(assembled
            .diagnostics
            .with_code(DiagnosticCode::MalformedDescriptor)
            .is_empty());
    }

    #[test]
    fn test_task_identifier_comes_from_schema() {
        let mut collection = collection();
        collection.schema_identifier = Some("MedicationTracker".to_string());

        let assembled = collection.assemble(
            &DefaultStepFactory,
            InclusionDecision::ActivityOnly,
            &MemoryStore::new(),
        );
        assert_eq!(assembled.task.identifier, "MedicationTracker");

        let container = assembled
            .into_container_step(&collection.task_identifier, collection.schema_identifier());
        assert_eq!(container.identifier, "MedicationTracker");
    }

    #[test]
    fn test_build_task_caches_activity_steps() {
        let mut store = MemoryStore::new();
        let assembled = collection().build_task(&DefaultStepFactory, false, &mut store, Utc::now());

        assert_eq!(assembled.decision, InclusionDecision::SurveyAndActivity);
        let cached: Vec<String> = store
            .moment_in_day_steps()
            .unwrap()
            .into_iter()
            .map(|s| s.identifier)
            .collect();
        assert_eq!(cached, vec!["momentInDay", "timing"]);
    }

    #[test]
    fn test_container_ids_only_for_full_survey() {
        let collection = collection();
        let full = collection
            .assemble(&DefaultStepFactory, InclusionDecision::SurveyAndActivity, &MemoryStore::new())
            .into_container_step(&collection.task_identifier, collection.schema_identifier());
        assert_eq!(full.task_identifier.as_deref(), Some("Medication Tracker"));
        assert_eq!(full.schema_identifier.as_deref(), Some("Medication Tracker"));

        let partial = collection
            .assemble(&DefaultStepFactory, InclusionDecision::ActivityOnly, &MemoryStore::new())
            .into_container_step(&collection.task_identifier, collection.schema_identifier());
        assert_eq!(partial.identifier, "Medication Tracker");
        assert!(partial.task_identifier.is_none());
        assert!(partial.schema_identifier.is_none());
    }

    #[test]
    fn test_collection_from_yaml_uses_defaults() {
        let yaml = r#"
taskIdentifier: Medication Tracker
activityRepeatInterval: 600
items:
  - identifier: levodopa
    tracking: true
steps:
  - identifier: momentInDay
    type: singleChoiceText
    trackingType: activity
"#;
        let collection: TrackedCollection = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(collection.schema_identifier(), "Medication Tracker");
        assert_eq!(collection.survey_repeat_interval, Duration::days(30));
        assert_eq!(collection.activity_repeat_interval, Duration::minutes(10));
        assert!(collection.find_step(TrackingType::Activity).is_some());
        assert!(collection.find_step(TrackingType::Changed).is_none());
    }
}
