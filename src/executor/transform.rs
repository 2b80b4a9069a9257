//! Source transform stage
//!
//! Produces the code an executor runs for a unit, plus an optional source
//! map back to the original text.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::diagnostics::{SourceMap, SourceMapV3};
use crate::models::{Diagnostic, Fault, Unit};

/// Output of the transform stage for one unit
#[derive(Clone, Debug)]
pub struct Transformed {
    pub code: String,
    pub source_map: Option<Arc<dyn SourceMap>>,
}

impl Transformed {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            source_map: None,
        }
    }
}

/// Turns a unit into runnable code, or fails with a `Fault::Transform`
#[async_trait]
pub trait SourceTransform: Send + Sync {
    async fn transform(&self, unit: &Unit) -> Result<Transformed, Fault>;
}

/// Reads the unit file as-is and picks up a sidecar `<unit>.map`
#[derive(Clone, Copy, Debug, Default)]
pub struct FileTransform;

impl FileTransform {
    fn map_path(unit: &Unit) -> PathBuf {
        PathBuf::from(format!("{}.map", unit.as_str()))
    }
}

#[async_trait]
impl SourceTransform for FileTransform {
    async fn transform(&self, unit: &Unit) -> Result<Transformed, Fault> {
        let code = tokio::fs::read_to_string(unit.as_str()).await.map_err(|e| {
            Fault::Transform {
                diagnostics: vec![Diagnostic::error(format!("Could not read unit: {e}"))
                    .at(unit.as_str(), 1, 1)],
            }
        })?;

        let map_path = Self::map_path(unit);
        let source_map = match tokio::fs::read_to_string(&map_path).await {
            Ok(json) => match SourceMapV3::from_json(&json) {
                Ok(map) => {
                    debug!("Loaded source map {}", map_path.display());
                    Some(Arc::new(map) as Arc<dyn SourceMap>)
                }
                Err(e) => {
                    warn!("Ignoring source map {}: {}", map_path.display(), e);
                    None
                }
            },
            Err(_) => None,
        };

        Ok(Transformed { code, source_map })
    }
}
