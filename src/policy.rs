//! Inclusion Policy
//!
//! Decides, once per assembly run, which part of a recurring survey and
//! activity bundle the participant should see. The decision depends on
//! whether a selection exists, how long ago the tracking survey was taken,
//! and how long ago the activity probe was last completed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::DataStoreState;
use crate::tracked::TrackingType;

/// Default interval between tracking surveys (30 days)
pub const DEFAULT_SURVEY_REPEAT_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Default interval between moment-in-day activity probes (20 minutes)
pub const DEFAULT_ACTIVITY_REPEAT_SECONDS: i64 = 20 * 60;

/// Which subset of a tracked collection to include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionDecision {
    None,
    StandAloneSurvey,
    SurveyAndActivity,
    ChangedOnly,
    ChangedAndActivity,
    ActivityOnly,
}

/// Where a "nothing changed" answer on the first step should lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoChangeTarget {
    Activity,
    Completion,
}

impl InclusionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::StandAloneSurvey => "stand_alone_survey",
            Self::SurveyAndActivity => "survey_and_activity",
            Self::ChangedOnly => "changed_only",
            Self::ChangedAndActivity => "changed_and_activity",
            Self::ActivityOnly => "activity_only",
        }
    }

    /// Whether a step tagged with `tracking_type` belongs in the task.
    pub fn should_include(&self, tracking_type: TrackingType) -> bool {
        use TrackingType::*;
        match self {
            Self::StandAloneSurvey | Self::SurveyAndActivity => true,
            Self::ChangedOnly => tracking_type == Changed,
            Self::ChangedAndActivity => matches!(tracking_type, Changed | Activity),
            Self::ActivityOnly => tracking_type == Activity,
            Self::None => false,
        }
    }

    /// Whether steps without a tracking tag belong in the task.
    pub fn includes_untagged(&self) -> bool {
        matches!(
            self,
            Self::StandAloneSurvey
                | Self::SurveyAndActivity
                | Self::ChangedOnly
                | Self::ChangedAndActivity
        )
    }

    /// Whether the full survey is taken, which is what makes the task
    /// reportable under its own task and schema identifiers.
    pub fn includes_full_survey(&self) -> bool {
        matches!(self, Self::StandAloneSurvey | Self::SurveyAndActivity)
    }

    pub fn next_step_if_no_change(&self) -> NoChangeTarget {
        match self {
            Self::SurveyAndActivity | Self::ChangedAndActivity => NoChangeTarget::Activity,
            _ => NoChangeTarget::Completion,
        }
    }
}

impl fmt::Display for InclusionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Repeat intervals and the activity override for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionPolicy {
    /// Include the activity steps whenever items are tracked, regardless of
    /// when they were last completed
    pub always_include_activity: bool,
    pub survey_repeat_interval: Duration,
    pub activity_repeat_interval: Duration,
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self {
            always_include_activity: false,
            survey_repeat_interval: Duration::seconds(DEFAULT_SURVEY_REPEAT_SECONDS),
            activity_repeat_interval: Duration::seconds(DEFAULT_ACTIVITY_REPEAT_SECONDS),
        }
    }
}

impl InclusionPolicy {
    /// Compute the inclusion decision. First matching condition wins.
    pub fn decide(
        &self,
        is_last_step: bool,
        state: &DataStoreState,
        has_changed_step: bool,
        has_tracked_items: bool,
        now: DateTime<Utc>,
    ) -> InclusionDecision {
        let decision = if is_last_step {
            InclusionDecision::StandAloneSurvey
        } else if state.selected_items.is_none() {
            InclusionDecision::SurveyAndActivity
        } else if has_changed_step && self.survey_is_due(state, now) {
            if has_tracked_items {
                InclusionDecision::ChangedAndActivity
            } else {
                InclusionDecision::ChangedOnly
            }
        } else if has_tracked_items && self.activity_is_due(state, now) {
            InclusionDecision::ActivityOnly
        } else {
            InclusionDecision::None
        };

        tracing::debug!(
            %decision,
            is_last_step,
            has_changed_step,
            has_tracked_items,
            "inclusion decision"
        );
        decision
    }

    fn survey_is_due(&self, state: &DataStoreState, now: DateTime<Utc>) -> bool {
        if self.survey_repeat_interval <= Duration::zero() {
            return false;
        }
        state
            .last_tracking_survey_date
            .is_some_and(|last| now - last >= self.survey_repeat_interval)
    }

    fn activity_is_due(&self, state: &DataStoreState, now: DateTime<Utc>) -> bool {
        if self.always_include_activity || state.moment_in_day_results.is_none() {
            return true;
        }
        let Some(last) = state.last_completion_date else {
            return true;
        };
        self.activity_repeat_interval > Duration::zero()
            && now - last >= self.activity_repeat_interval
    }
}
