//! Diagnostics collected across the translation pipeline
//!
//! Warnings mark something that was dropped or approximated. Errors mark a
//! target-specific gap that needs manual follow-up; they never stop the
//! pipeline, fatal problems are [`crate::TranslateError`]s instead.

use serde::{Deserialize, Serialize};

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Representability warning
    Warning,
    /// Representability error
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Human-readable message naming the affected service or field
    pub message: String,
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    /// Record a non-fatal error
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        tracing::trace!(%severity, %message, "diagnostic recorded");
        self.entries.push(Diagnostic { severity, message });
    }

    /// Append every diagnostic from another collector, keeping order
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    fn messages(&self, severity: Severity) -> Vec<String> {
        self.entries
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.message.clone())
            .collect()
    }

    /// Warning messages in insertion order
    pub fn warnings(&self) -> Vec<String> {
        self.messages(Severity::Warning)
    }

    /// Error messages in insertion order
    pub fn errors(&self) -> Vec<String> {
        self.messages(Severity::Error)
    }

    /// Whether any error was recorded
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
