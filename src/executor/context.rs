//! Execution context providers
//!
//! Every executor call receives the same merged, read-only context.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Key/value context handed to each unit
pub type Context = BTreeMap<String, Value>;

/// Source of context entries
pub trait ContextProvider: Send + Sync {
    fn name(&self) -> &str;

    fn provide(&self) -> Context;
}

/// Fixed entries, typically from the configuration file
#[derive(Clone, Debug, Default)]
pub struct StaticContext {
    entries: Context,
}

impl StaticContext {
    pub fn new(entries: Context) -> Self {
        Self { entries }
    }
}

impl ContextProvider for StaticContext {
    fn name(&self) -> &str {
        "static"
    }

    fn provide(&self) -> Context {
        self.entries.clone()
    }
}

/// Environment variables of the runner process
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnvContext;

impl ContextProvider for ProcessEnvContext {
    fn name(&self) -> &str {
        "process-env"
    }

    fn provide(&self) -> Context {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, Value::String(v.into_string().ok()?))))
            .collect()
    }
}

/// Merge providers in order; later providers override earlier keys
pub fn merge_contexts(providers: &[Box<dyn ContextProvider>]) -> Arc<Context> {
    let mut merged = Context::new();
    for provider in providers {
        let entries = provider.provide();
        debug!("Context provider '{}' supplied {} entries", provider.name(), entries.len());
        merged.extend(entries);
    }
    Arc::new(merged)
}

/// Render a context value as an environment variable value
pub fn env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider(pairs: &[(&str, Value)]) -> Box<dyn ContextProvider> {
        Box::new(StaticContext::new(
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ))
    }

    #[test]
    fn test_later_providers_override() {
        let merged = merge_contexts(&[
            provider(&[("A", json!("one")), ("B", json!(1))]),
            provider(&[("B", json!(2)), ("C", json!(true))]),
        ]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged["A"], json!("one"));
        assert_eq!(merged["B"], json!(2));
    }

    #[test]
    fn test_env_value_rendering() {
        assert_eq!(env_value(&json!("plain")), "plain");
        assert_eq!(env_value(&json!(42)), "42");
        assert_eq!(env_value(&json!({"k": [1]})), r#"{"k":[1]}"#);
        assert_eq!(env_value(&Value::Null), "");
    }

    #[test]
    fn test_process_env_context() {
        let ctx = ProcessEnvContext.provide();
        if let Ok(path) = std::env::var("PATH") {
            assert_eq!(ctx["PATH"], json!(path));
        }
    }
}
