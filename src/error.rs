//! Unified translator error type used across all phases.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Parse,
    Classify,
    Materialize,
    Graph,
    Validate,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Parse => write!(f, "Parse"),
            Phase::Classify => write!(f, "Classify"),
            Phase::Materialize => write!(f, "Materialize"),
            Phase::Graph => write!(f, "Graph"),
            Phase::Validate => write!(f, "Validate"),
        }
    }
}

/// Fatal error classes. Corrupt bodies are never fatal and are reported
/// through [`Observer`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Malformed archive, missing required field, bad URL or method.
    InvalidInput,
    /// An output invariant does not hold. Always a translator bug.
    InternalError,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateError {
    pub code: String,
    pub kind: ErrorKind,
    pub phase: Phase,
    pub message: String,
    /// Position of the offending entry in the archive as recorded.
    pub entry_index: Option<usize>,
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.entry_index {
            Some(index) => write!(
                f,
                "[{}:{}] {} (entry {})",
                self.phase, self.code, self.message, index
            ),
            None => write!(f, "[{}:{}] {}", self.phase, self.code, self.message),
        }
    }
}

impl std::error::Error for TranslateError {}

impl TranslateError {
    pub fn parse(code: &str, message: impl Into<String>) -> Self {
        TranslateError {
            code: code.into(),
            kind: ErrorKind::InvalidInput,
            phase: Phase::Parse,
            message: message.into(),
            entry_index: None,
        }
    }

    pub fn classify(code: &str, message: impl Into<String>) -> Self {
        TranslateError {
            code: code.into(),
            kind: ErrorKind::InvalidInput,
            phase: Phase::Classify,
            message: message.into(),
            entry_index: None,
        }
    }

    pub fn internal(phase: Phase, code: &str, message: impl Into<String>) -> Self {
        TranslateError {
            code: code.into(),
            kind: ErrorKind::InternalError,
            phase,
            message: message.into(),
            entry_index: None,
        }
    }

    /// Attach the archive position of the entry being processed.
    pub fn at_entry(mut self, index: usize) -> Self {
        self.entry_index = Some(index);
        self
    }
}

// ---------------------------------------------------------------------------
// Non-fatal diagnostics
// ---------------------------------------------------------------------------

/// A body that claimed to be JSON but could not be used. The body is kept
/// verbatim and translation continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub entry_index: usize,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} (entry {})", self.code, self.message, self.entry_index)
    }
}

/// Receives corrupt-data diagnostics during a translation.
pub trait Observer {
    fn corrupt_data(&mut self, diagnostic: Diagnostic);
}

/// Default observer: logs each diagnostic as a warning.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn corrupt_data(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(
            code = diagnostic.code,
            entry = diagnostic.entry_index,
            "{}",
            diagnostic.message
        );
    }
}

impl<F: FnMut(Diagnostic)> Observer for F {
    fn corrupt_data(&mut self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}

/// Keeps every diagnostic, in the order reported.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    pub diagnostics: Vec<Diagnostic>,
}

impl Observer for CollectingObserver {
    fn corrupt_data(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
