//! Run results
//!
//! The result store read by reporters and a serializable run summary.

mod store;
mod summary;

pub use store::{ResultStore, StoreError};
pub use summary::RunSummary;
