//! Unit faults
//!
//! A fault is the terminal classification of a unit that did not produce
//! a report. Faults are recorded, never retried.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Severity of a build diagnostic
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// Source location attached to a build diagnostic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
    /// Text of the offending line, when the transform stage supplied it
    pub line_text: Option<String>,
}

/// A message emitted by the source-transform stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub text: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
            location: None,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
            location: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
            column,
            line_text: None,
        });
        self
    }

    pub fn with_line_text(mut self, text: impl Into<String>) -> Self {
        if let Some(location) = self.location.as_mut() {
            location.line_text = Some(text.into());
        }
        self
    }
}

/// Terminal failure of a unit
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("transform failed with {} diagnostic(s)", .diagnostics.len())]
    Transform { diagnostics: Vec<Diagnostic> },

    #[error("{message}")]
    Runtime { message: String, stack: String },

    #[error("unit exceeded its time budget of {budget_ms}ms")]
    Timeout { budget_ms: u64 },
}

impl Fault {
    pub fn runtime(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Fault::Runtime {
            message: message.into(),
            stack: stack.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Transform { .. } => "transform",
            Fault::Runtime { .. } => "runtime",
            Fault::Timeout { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display() {
        assert_eq!(
            Fault::Timeout { budget_ms: 50 }.to_string(),
            "unit exceeded its time budget of 50ms"
        );
        assert_eq!(Fault::runtime("boom", "").to_string(), "boom");

        let transform = Fault::Transform {
            diagnostics: vec![Diagnostic::error("a"), Diagnostic::warning("b")],
        };
        assert_eq!(transform.to_string(), "transform failed with 2 diagnostic(s)");
    }

    #[test]
    fn test_fault_serde_tag() {
        let json = serde_json::to_value(Fault::Timeout { budget_ms: 10 }).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["budget_ms"], 10);
    }

    #[test]
    fn test_diagnostic_builder() {
        let diag = Diagnostic::error("Unexpected token")
            .at("/src/a.ts", 4, 7)
            .with_line_text("let x = ;");
        let location = diag.location.unwrap();
        assert_eq!(location.line, 4);
        assert_eq!(location.line_text.as_deref(), Some("let x = ;"));
    }
}
