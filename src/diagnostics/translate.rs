//! Diagnostic translation
//!
//! Turns a unit fault (or a test error) into a bounded, human-readable block.
//! Translation never fails; it degrades from a source window, to a list of
//! frame pointers, to the raw trace lines.

use super::context::render_window;
use super::frame::{FrameParser, StackFrame, V8FrameParser};
use super::sourcemap::SourceMap;
use crate::models::{Diagnostic, Fault, Severity};
use crate::utils::Style;

/// Default number of source lines shown on each side of the target line
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Marker prefixed to trace lines the frame grammar could not parse
pub const PARSE_FAILURE_MARKER: &str = "Parsing failed:";

const DIVIDER_WIDTH: usize = 60;

/// Formats faults into diagnostic reports
pub struct DiagnosticTranslator {
    parser: Box<dyn FrameParser>,
    max_lines: usize,
    colorize: bool,
}

impl DiagnosticTranslator {
    pub fn new() -> Self {
        Self {
            parser: Box::new(V8FrameParser),
            max_lines: DEFAULT_CONTEXT_LINES,
            colorize: true,
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn FrameParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn style(&self) -> Style {
        Style::new(self.colorize)
    }

    /// Translate a unit fault.
    ///
    /// `file` narrows the choice of primary frame to lines mentioning it.
    pub fn translate(
        &self,
        fault: &Fault,
        file: Option<&str>,
        source_map: Option<&dyn SourceMap>,
    ) -> String {
        match fault {
            Fault::Transform { diagnostics } if !diagnostics.is_empty() => {
                self.enclose(&self.build_output(diagnostics))
            }
            Fault::Runtime { message, stack } => {
                let stack = Some(stack.as_str()).filter(|s| !s.trim().is_empty());
                self.translate_error(message, stack, file, source_map)
            }
            other => self.translate_error(&other.to_string(), None, file, source_map),
        }
    }

    /// Translate an error-shaped value: a message and an optional raw stack
    pub fn translate_error(
        &self,
        message: &str,
        stack: Option<&str>,
        file: Option<&str>,
        source_map: Option<&dyn SourceMap>,
    ) -> String {
        let header = if message.trim().is_empty() {
            "No message available."
        } else {
            message
        };

        let body = match stack {
            Some(stack) => self.stack(stack, file, source_map),
            None => "No stack trace available".to_string(),
        };

        self.enclose(&format!("{header}\n\n{body}"))
    }

    fn enclose(&self, content: &str) -> String {
        let divider = "─".repeat(DIVIDER_WIDTH);
        format!("{divider}\n{content}\n{divider}")
    }

    fn stack(&self, stack: &str, file: Option<&str>, source_map: Option<&dyn SourceMap>) -> String {
        let frames: Vec<StackFrame> = stack
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.parser.parse(line))
            .collect();

        let primary = file
            .and_then(|f| frames.iter().find(|fr| fr.is_parsed() && fr.raw.contains(f)))
            .or_else(|| frames.iter().find(|fr| fr.is_parsed()));

        if let (Some(frame), Some(map)) = (primary, source_map) {
            if let Some(context) = self.context(frame, map) {
                return context;
            }
        }

        frames
            .iter()
            .map(|frame| self.pointer_or_marker(frame, source_map))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pointer line plus a source window; `None` when the map cannot supply
    /// an original position and text for the frame.
    fn context(&self, frame: &StackFrame, map: &dyn SourceMap) -> Option<String> {
        let (file, line, column) = frame.location()?;
        let original = map.original_position(line, column)?;
        let source = map.original_source()?;
        let window = render_window(source, original.line, self.max_lines, self.style())?;

        Some(format!(
            "{}\n{}",
            self.pointer(file, original.line, original.column),
            window
        ))
    }

    fn pointer_or_marker(&self, frame: &StackFrame, source_map: Option<&dyn SourceMap>) -> String {
        let Some((file, line, column)) = frame.location() else {
            return format!("{} {}", PARSE_FAILURE_MARKER, frame.raw.trim());
        };

        match source_map.and_then(|map| map.original_position(line, column)) {
            Some(original) => self.pointer(file, original.line, original.column),
            None => self.pointer(file, line, column),
        }
    }

    fn pointer(&self, file: &str, line: u32, column: u32) -> String {
        let style = self.style();
        format!(
            "→ {} {}:{}",
            file,
            style.bold(line.to_string()),
            style.bold(column.to_string())
        )
    }

    fn build_output(&self, diagnostics: &[Diagnostic]) -> String {
        let errors = self.build_messages(diagnostics, Severity::Error);
        let warnings = self.build_messages(diagnostics, Severity::Warning);

        [errors, warnings]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_messages(&self, diagnostics: &[Diagnostic], severity: Severity) -> String {
        diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| self.build_message(d))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn build_message(&self, diagnostic: &Diagnostic) -> String {
        let style = self.style();
        let title = match diagnostic.severity {
            Severity::Error => style.red(format!("✘ [{}]", diagnostic.severity)),
            Severity::Warning => style.yellow(format!("▲ [{}]", diagnostic.severity)),
        };

        let mut out = format!("{} {}", title, style.bold(&diagnostic.text));

        if let Some(loc) = &diagnostic.location {
            out.push_str(&format!("\n\n    {}:{}:{}:", loc.file, loc.line, loc.column));

            if let Some(text) = &loc.line_text {
                let number = loc.line.to_string();
                let gutter = " ".repeat(number.len());
                let caret_pad = " ".repeat(loc.column.saturating_sub(1) as usize);
                out.push_str(&format!(
                    "\n      {} │ {}\n      {} ╵ {}{}",
                    style.gray(&number),
                    text,
                    gutter,
                    caret_pad,
                    style.green("^")
                ));
            }
        }

        out
    }
}

impl Default for DiagnosticTranslator {
    fn default() -> Self {
        Self::new()
    }
}
