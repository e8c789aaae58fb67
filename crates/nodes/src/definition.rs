//! `NodeDefinition` — the static description of a single workflow node.
//!
//! Lives in this crate (rather than in `engine`) because node factories and
//! the `parallel` node need to read nested definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single step in the workflow graph.
///
/// Serialised as `{"id", "type", "config", "isStart", "isEnd"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered node factory.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Arbitrary configuration handed to the node factory.
    #[serde(default)]
    pub config: Value,
    /// Receives the workflow input directly.
    #[serde(default)]
    pub is_start: bool,
    /// Output is surfaced in the workflow result.
    #[serde(default)]
    pub is_end: bool,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: Value::Null,
            is_start: false,
            is_end: false,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn start(mut self) -> Self {
        self.is_start = true;
        self
    }

    pub fn end(mut self) -> Self {
        self.is_end = true;
        self
    }

    /// Look up a top-level config key.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Look up a top-level string config key.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key).and_then(Value::as_str)
    }

    /// Abort the execution when this node fails. Only an explicit
    /// `"stopOnError": false` turns this off.
    pub fn stop_on_error(&self) -> bool {
        !matches!(self.config_value("stopOnError"), Some(Value::Bool(false)))
    }
}
