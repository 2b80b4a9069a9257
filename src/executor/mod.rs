//! Unit execution
//!
//! The isolation executor contract, the child-process executor, the source
//! transform stage and context providers.

mod context;
mod isolate;
mod process;
mod transform;

pub use context::{merge_contexts, Context, ContextProvider, ProcessEnvContext, StaticContext};
pub use isolate::{ExecOutcome, ExecRequest, Executor};
pub use process::{ProcessExecutor, REPORT_PREFIX};
pub use transform::{FileTransform, SourceTransform, Transformed};
