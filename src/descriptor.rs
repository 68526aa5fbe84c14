//! Step descriptors
//!
//! Declarative step configuration as read from YAML or JSON. Descriptors are
//! inert data: classification, rule compilation and step construction happen
//! in the factory.

use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;
use crate::item_type::StepKind;
use crate::rule::{RuleDescriptor, RuleEntry};
use crate::tracked::TrackingType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    pub identifier: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_type: Option<TrackingType>,
    /// Group-level skip target used by rules that don't name their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleEntry>,
    /// Answer choices for choice-type questions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ChoiceDescriptor>,
}

impl StepDescriptor {
    pub fn new(identifier: impl Into<String>, type_token: Option<&str>) -> Self {
        Self {
            identifier: identifier.into(),
            type_token: type_token.map(str::to_string),
            title: None,
            text: None,
            detail_text: None,
            tracking_type: None,
            skip_identifier: None,
            rules: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn with_tracking(mut self, tracking_type: TrackingType) -> Self {
        self.tracking_type = Some(tracking_type);
        self
    }

    pub fn with_rule(mut self, rule: RuleDescriptor) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn kind(&self) -> StepKind {
        StepKind::classify(self.type_token.as_deref())
    }

    pub fn has_navigation_rules(&self) -> bool {
        !self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceDescriptor {
    pub prompt: String,
    pub value: AnswerValue,
}

/// One entry of a configured step list. Entries that do not have the shape of
/// a step descriptor are kept so assembly can report and skip them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescriptorEntry {
    Step(StepDescriptor),
    Unrecognized(serde_json::Value),
}

impl From<StepDescriptor> for DescriptorEntry {
    fn from(descriptor: StepDescriptor) -> Self {
        DescriptorEntry::Step(descriptor)
    }
}
