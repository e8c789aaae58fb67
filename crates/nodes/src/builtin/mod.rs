//! Built-in node types.

pub mod api_call;
pub mod decision;
pub mod llm;
pub mod parallel;
pub mod transform;

use std::sync::Arc;

use crate::{ExecutableNode, NodeRegistry};

pub use api_call::ApiCallNode;
pub use decision::{Condition, DecisionNode};
pub use llm::LlmNode;
pub use parallel::ParallelNode;
pub use transform::TransformNode;

pub const TRANSFORM: &str = "transform";
pub const LLM: &str = "llm";
pub const DECISION: &str = "decision";
pub const PARALLEL: &str = "parallel";
pub const API_CALL: &str = "api_call";

/// Register every built-in node type.
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(TRANSFORM, |def, _| {
        Ok(Arc::new(TransformNode::from_definition(def)?) as Arc<dyn ExecutableNode>)
    });
    registry.register(LLM, |def, _| {
        Ok(Arc::new(LlmNode::from_definition(def)?) as Arc<dyn ExecutableNode>)
    });
    registry.register(DECISION, |def, _| {
        Ok(Arc::new(DecisionNode::from_definition(def)?) as Arc<dyn ExecutableNode>)
    });
    registry.register(PARALLEL, |def, registry| {
        Ok(Arc::new(ParallelNode::from_definition(def, registry)?) as Arc<dyn ExecutableNode>)
    });
    registry.register(API_CALL, |def, _| {
        Ok(Arc::new(ApiCallNode::from_definition(def)?) as Arc<dyn ExecutableNode>)
    });
}
