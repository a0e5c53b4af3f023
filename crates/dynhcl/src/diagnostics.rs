//! diagnostics for decode and evaluation failures
//!
//! Nothing in this crate aborts: a directive that cannot be decoded or
//! evaluated contributes zero (or deferred) blocks and a [Diagnostic]
//! describing why. Diagnostics accumulate in a [Diagnostics] set next to
//! whatever partial result could still be produced.
use std::fmt;

/// Byte range into the source document an element was parsed from
pub type SourceSpan = std::ops::Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A problem in the configuration under analysis
    Error,
    /// A broken internal invariant of the expansion engine itself
    Bug,
}

/// A single reported problem: short summary, longer detail, source location
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            span: None,
        }
    }

    /// An internal-consistency failure. Not a user error: if one of these
    /// surfaces, the engine itself violated an invariant.
    pub fn bug(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Bug,
            summary: summary.into(),
            detail: detail.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Option<SourceSpan>) -> Self {
        if self.span.is_none() {
            self.span = span;
        }
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "{}: {}", self.summary, self.detail),
            Severity::Bug => write!(f, "bug: {}: {}", self.summary, self.detail),
        }
    }
}

/// An ordered set of diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    issues: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::trace!(%diagnostic, "diagnostic reported");
        self.issues.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.issues.iter()
    }

    /// Attach `span` to every diagnostic that does not carry one yet.
    pub fn with_span(mut self, span: Option<SourceSpan>) -> Self {
        for issue in &mut self.issues {
            if issue.span.is_none() {
                issue.span = span.clone();
            }
        }
        self
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(diagnostic);
        diagnostics
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl std::error::Error for Diagnostics {}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}
