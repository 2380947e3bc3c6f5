#![forbid(unsafe_code)]

//! Debug-build diagnostics.
//!
//! Diagnostics are a side channel: reporting one never changes control flow
//! or a computed value. Detection code lives behind
//! `cfg(any(debug_assertions, feature = "debug-checks"))`, so release builds
//! without the feature never produce them.

use std::cell::RefCell;
use std::fmt;

/// What was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A tag was dirtied after an open frame had already consumed it.
    MutationAfterConsumption,
    /// A helper mutated the resolved arguments it was handed.
    ArgumentMutation,
}

/// How loudly to report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Tolerated for now; scheduled to become an assertion.
    Deprecation,
    /// A broken invariant of the tracking model.
    Assertion,
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Label of the frame that was open when the problem was detected.
    pub frame: Option<String>,
}

impl Diagnostic {
    /// A tag labeled `tag` was dirtied after frame `frame` consumed it.
    #[must_use]
    pub fn mutation_after_consumption(severity: Severity, tag: Option<&str>, frame: &str) -> Self {
        let subject = tag.map_or_else(|| "a tag".to_string(), |label| format!("`{label}`"));
        Self {
            kind: DiagnosticKind::MutationAfterConsumption,
            severity,
            message: format!(
                "{subject} was updated after it was consumed by `{frame}` in the same computation"
            ),
            frame: Some(frame.to_string()),
        }
    }

    /// Helper `helper` mutated its resolved arguments.
    #[must_use]
    pub fn argument_mutation(helper: &str, frame: Option<&str>) -> Self {
        Self {
            kind: DiagnosticKind::ArgumentMutation,
            severity: Severity::Deprecation,
            message: format!(
                "helper `{helper}` mutated its arguments while computing; arguments are read-only"
            ),
            frame: frame.map(str::to_string),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Deprecation => "deprecation",
            Severity::Assertion => "assertion",
        };
        write!(f, "{level}: {}", self.message)
    }
}

/// Receiver for diagnostics. Delivery and formatting are up to the
/// implementation.
pub trait DiagnosticsSink {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Default sink: emits a `WARN` event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        tracing::warn!(
            message = "diagnostic",
            kind = ?diagnostic.kind,
            severity = ?diagnostic.severity,
            frame = diagnostic.frame.as_deref().unwrap_or("-"),
            detail = %diagnostic.message
        );
    }
}

/// Sink that keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl RecordingSink {
    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.borrow().is_empty()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic.clone());
    }
}
