//! Stack frame parsing
//!
//! Turns one raw stack-trace line into a structured frame. The grammar is
//! pluggable through [`FrameParser`]; [`V8FrameParser`] understands the
//! `at fn (file:line:col)` shape emitted by V8-based runtimes.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref V8_FRAME: Regex =
        Regex::new(r"(?i)^\s*at ?(?:([^(]+) )?\(?([^:]+):(\d+):(\d+)\)?\s*$")
            .expect("Regex compilation error");
}

/// One stack-trace line, parsed as far as the grammar allowed.
///
/// A frame without file, line and column is unparsable and keeps only its
/// raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    pub raw: String,
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl StackFrame {
    pub fn unparsed(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            function: None,
            file: None,
            line: None,
            column: None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.location().is_some()
    }

    /// `(file, line, column)` when the frame was fully parsed
    pub fn location(&self) -> Option<(&str, u32, u32)> {
        match (&self.file, self.line, self.column) {
            (Some(file), Some(line), Some(column)) => Some((file.as_str(), line, column)),
            _ => None,
        }
    }
}

/// Grammar for a runtime's stack-trace lines
pub trait FrameParser: Send + Sync {
    /// Parse a single line. Never fails: unknown shapes come back unparsed.
    fn parse(&self, line: &str) -> StackFrame;
}

/// Parser for V8-style frames: `at name (file:line:col)` or `at file:line:col`
#[derive(Clone, Copy, Debug, Default)]
pub struct V8FrameParser;

impl FrameParser for V8FrameParser {
    fn parse(&self, line: &str) -> StackFrame {
        // Frames inside the sandbox bootstrap carry no user location.
        if line.trim_start().starts_with("at new Script") {
            return StackFrame::unparsed(line);
        }

        let Some(caps) = V8_FRAME.captures(line) else {
            return StackFrame::unparsed(line);
        };

        let line_no = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let column = caps.get(4).and_then(|m| m.as_str().parse().ok());
        if line_no.is_none() || column.is_none() {
            return StackFrame::unparsed(line);
        }

        StackFrame {
            raw: line.to_string(),
            function: caps.get(1).map(|m| m.as_str().trim().to_string()),
            file: caps.get(2).map(|m| m.as_str().to_string()),
            line: line_no,
            column,
        }
    }
}
