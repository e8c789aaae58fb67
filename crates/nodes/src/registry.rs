//! Node-type registry: maps `type` strings to node factories.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{ExecutableNode, NodeDefinition, NodeError, builtin};

/// Builds a node instance from its definition. The registry is handed in so
/// composite nodes can build nested definitions.
pub type NodeFactory = Arc<
    dyn Fn(&NodeDefinition, &NodeRegistry) -> Result<Arc<dyn ExecutableNode>, NodeError>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `transform`, `llm`, `decision`, `parallel` and
    /// `api_call` pre-registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register (or replace) the factory for `node_type`.
    pub fn register<F>(&mut self, node_type: impl Into<String>, factory: F)
    where
        F: Fn(&NodeDefinition, &NodeRegistry) -> Result<Arc<dyn ExecutableNode>, NodeError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(node_type.into(), Arc::new(factory));
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Registered type names, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Instantiate a node from its definition.
    ///
    /// # Errors
    /// [`NodeError::UnknownNodeType`] if the type isn't registered, or the
    /// factory's own configuration error.
    pub fn build(&self, definition: &NodeDefinition) -> Result<Arc<dyn ExecutableNode>, NodeError> {
        let factory = self
            .factories
            .get(&definition.node_type)
            .ok_or_else(|| NodeError::UnknownNodeType(definition.node_type.clone()))?;
        factory(definition, self)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
