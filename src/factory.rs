//! Step Factory
//!
//! Turns descriptors into concrete steps. Assembly only decides which
//! descriptors to materialize; the factory decides what a step looks like.
//! Hosts with their own presentation layer implement [`StepFactory`]
//! themselves.

use crate::answer::AnswerValue;
use crate::descriptor::StepDescriptor;
use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
use crate::item_type::StepKind;
use crate::rule::{compile_rule_group, RuleGroupDefaults};
use crate::step::{Choice, Step, TrackedSkipRule};
use crate::tracked::{TrackedItem, TrackingType};

pub trait StepFactory {
    /// Build a step for an untagged descriptor. `None` declines it.
    fn create_step(&self, descriptor: &StepDescriptor, diagnostics: &mut Diagnostics)
        -> Option<Step>;

    /// Build a step for a descriptor tagged with `tracking_type`. `items` is
    /// the collection's full list of trackable items.
    fn create_tracked_step(
        &self,
        descriptor: &StepDescriptor,
        tracking_type: TrackingType,
        items: &[TrackedItem],
        diagnostics: &mut Diagnostics,
    ) -> Option<Step>;
}

/// Factory producing plain [`Step`] values with compiled rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStepFactory;

impl DefaultStepFactory {
    pub fn new() -> Self {
        Self
    }
}

impl StepFactory for DefaultStepFactory {
    fn create_step(
        &self,
        descriptor: &StepDescriptor,
        diagnostics: &mut Diagnostics,
    ) -> Option<Step> {
        let kind = descriptor.kind();

        // A subtask needs a nested task, which a flat descriptor cannot carry
        if kind == StepKind::Subtask {
            diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::StepDeclined,
                    "subtask descriptors cannot be built from a step list",
                )
                .for_step(descriptor.identifier.clone()),
            );
            return None;
        }

        let defaults = RuleGroupDefaults {
            result_identifier: Some(descriptor.identifier.clone()),
            skip_identifier: descriptor.skip_identifier.clone(),
        };
        let rules = compile_rule_group(
            &descriptor.rules,
            kind.form_subtype(),
            &defaults,
            diagnostics,
        );

        let mut step = Step::new(descriptor.identifier.clone(), kind);
        step.title = descriptor.title.clone();
        step.text = descriptor.text.clone();
        step.tracking_type = descriptor.tracking_type;
        step.rules = rules;
        step.choices = descriptor
            .items
            .iter()
            .map(|item| Choice {
                text: item.prompt.clone(),
                value: item.value.clone(),
            })
            .collect();
        Some(step)
    }

    fn create_tracked_step(
        &self,
        descriptor: &StepDescriptor,
        tracking_type: TrackingType,
        items: &[TrackedItem],
        diagnostics: &mut Diagnostics,
    ) -> Option<Step> {
        let mut step = self.create_step(descriptor, diagnostics)?;
        step.tracking_type = Some(tracking_type);

        match tracking_type {
            TrackingType::Selection => {
                step.tracked_result_identifier = Some(descriptor.identifier.clone());
                if step.choices.is_empty() {
                    step.choices = items
                        .iter()
                        .map(|item| Choice {
                            text: item.text.clone().unwrap_or_else(|| item.identifier.clone()),
                            value: AnswerValue::Text(item.identifier.clone()),
                        })
                        .collect();
                }
            }
            TrackingType::Activity => step.skip_rule = Some(TrackedSkipRule::NoTrackedItems),
            TrackingType::Changed => {}
        }

        Some(step)
    }
}
