//! `transform` — a pure function over the node input.

use async_trait::async_trait;
use serde_json::Value;

use crate::transforms::TransformFn;
use crate::{ExecutableNode, ExecutionContext, NodeDefinition, NodeError};

enum Source {
    /// Resolved against the context's transform registry at execution time.
    Named(String),
    Inline(TransformFn),
}

pub struct TransformNode {
    source: Source,
}

impl TransformNode {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            source: Source::Named(name.into()),
        }
    }

    /// Back the node with a closure instead of a registered name.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        Self {
            source: Source::Inline(std::sync::Arc::new(f)),
        }
    }

    /// Reads `config.transformFunction`.
    pub fn from_definition(def: &NodeDefinition) -> Result<Self, NodeError> {
        def.config_str("transformFunction")
            .map(Self::named)
            .ok_or_else(|| {
                NodeError::InvalidConfig(format!(
                    "transform node '{}' needs a `transformFunction` name",
                    def.id
                ))
            })
    }
}

#[async_trait]
impl ExecutableNode for TransformNode {
    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        match &self.source {
            Source::Named(name) => ctx.transforms.apply(name, input),
            Source::Inline(f) => f(input),
        }
    }
}
