//! Tracked items and tracking types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Something the participant can select for recurring tracking, such as a
/// medication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Actively monitored. Moment-in-day questions are only asked while at
    /// least one selected item is tracking.
    #[serde(default)]
    pub tracking: bool,
}

impl TrackedItem {
    pub fn new(identifier: impl Into<String>, tracking: bool) -> Self {
        Self {
            identifier: identifier.into(),
            text: None,
            detail: None,
            tracking,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// True if any item in the selection is being tracked.
pub fn any_tracking(items: &[TrackedItem]) -> bool {
    items.iter().any(|item| item.tracking)
}

/// Role of a step within a recurring tracked-data bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingType {
    /// Choose which items are tracked
    Selection,
    /// "Has anything changed?" gate
    Changed,
    /// Moment-in-day activity probe
    Activity,
}

impl TrackingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Changed => "changed",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for TrackingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
