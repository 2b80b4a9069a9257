//! Failure diagnostics
//!
//! Stack-frame parsing, source-map position lookup, source context
//! rendering and the translator that ties them together.

mod context;
mod frame;
mod sourcemap;
mod translate;

pub use context::{render_window, TARGET_MARKER};
pub use frame::{FrameParser, StackFrame, V8FrameParser};
pub use sourcemap::{Position, SourceMap, SourceMapError, SourceMapV3};
pub use translate::{DiagnosticTranslator, DEFAULT_CONTEXT_LINES, PARSE_FAILURE_MARKER};
