//! survey-flow
//!
//! Assembles recurring survey and activity tasks from declarative step
//! descriptors, and drives navigation through them against a persisted
//! tracked-data store.
//!
//! # Layout
//!
//! - [`item_type`] classifies raw step-type tokens into [`StepKind`]
//! - [`rule`] compiles "skip to" rule descriptors into evaluable rules
//! - [`policy`] decides which slice of a tracked collection to include
//! - [`assemble`] builds a [`Task`] from a [`TrackedCollection`]
//! - [`navigation`] runs the skip and bookkeeping hooks during traversal
//! - [`store`] holds cross-session state ([`DataStore`])
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use survey_flow::{DefaultStepFactory, MemoryStore, StepDescriptor, TrackedCollection, TrackingType};
//!
//! let collection = TrackedCollection::new(
//!     "Medication Tracker",
//!     vec![
//!         StepDescriptor::new("medicationSelection", Some("dataGroups"))
//!             .with_tracking(TrackingType::Selection)
//!             .into(),
//!         StepDescriptor::new("momentInDay", Some("singleChoiceText"))
//!             .with_tracking(TrackingType::Activity)
//!             .into(),
//!     ],
//! );
//!
//! let mut store = MemoryStore::new();
//! let assembled = collection.build_task(&DefaultStepFactory, false, &mut store, Utc::now());
//! assert_eq!(assembled.task.step_identifiers(), vec!["medicationSelection", "momentInDay"]);
//! ```

pub mod answer;
pub mod assemble;
pub mod descriptor;
pub mod diagnostics;
pub mod factory;
pub mod item_type;
pub mod loader;
pub mod navigation;
pub mod policy;
pub mod result;
pub mod rule;
pub mod step;
pub mod store;
pub mod task;
pub mod tracked;

pub use answer::AnswerValue;
pub use assemble::{AssembledTask, TrackedCollection};
pub use descriptor::{ChoiceDescriptor, DescriptorEntry, StepDescriptor};
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use factory::{DefaultStepFactory, StepFactory};
pub use item_type::StepKind;
pub use loader::{DefinitionLoader, LoadError};
pub use navigation::NavigationEngine;
pub use policy::{InclusionDecision, InclusionPolicy};
pub use result::{QuestionResult, StepResult, TaskResult};
pub use rule::{
    CompiledRule, RuleDescriptor, RuleEntry, RuleError, RuleOperator, NULL_STEP_IDENTIFIER,
};
pub use step::Step;
pub use store::{DataStore, DataStoreState, JsonFileStore, MemoryStore, SharedStore, StoreError};
pub use task::Task;
pub use tracked::{TrackedItem, TrackingType};
