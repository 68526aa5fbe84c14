//! Configuration Diagnostics
//!
//! Developer-facing warnings raised while compiling rules and assembling
//! tasks. Diagnostics never alter control flow: the offending rule or step is
//! dropped and assembly carries on. Every diagnostic is also emitted through
//! `tracing` so it shows up in logs without a harness collecting it.

use serde::{Deserialize, Serialize};

/// Diagnostic severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Info,
}

/// Diagnostic codes for categorizing configuration issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // =========================================================================
    // Rule compilation
    // =========================================================================
    MissingExpectedAnswer,
    MissingFormSubtype,
    MissingResultIdentifier,
    UnsupportedOperator,
    MalformedRule,

    // =========================================================================
    // Assembly
    // =========================================================================
    MalformedDescriptor,
    StepDeclined,
    UnknownSkipTarget,
    BackwardSkipTarget,
}

/// A single diagnostic message
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Step the diagnostic concerns, when known
    pub step_identifier: Option<String>,
}

impl Diagnostic {
    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            step_identifier: None,
        }
    }

    /// Create an info diagnostic
    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
            step_identifier: None,
        }
    }

    /// Attach the step identifier
    pub fn for_step(mut self, identifier: impl Into<String>) -> Self {
        self.step_identifier = Some(identifier.into());
        self
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.severity, Severity::Warning)
    }
}

/// Collected diagnostics for one compile or assembly pass.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(
                code = ?diagnostic.code,
                step = diagnostic.step_identifier.as_deref().unwrap_or("-"),
                "{}",
                diagnostic.message
            ),
            Severity::Info => tracing::debug!(
                code = ?diagnostic.code,
                step = diagnostic.step_identifier.as_deref().unwrap_or("-"),
                "{}",
                diagnostic.message
            ),
        }
        self.items.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(Diagnostic::is_warning)
    }

    /// Diagnostics with the given code
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<&Diagnostic> {
        self.items.iter().filter(|d| d.code == code).collect()
    }
}
