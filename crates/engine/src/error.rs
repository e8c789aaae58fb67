//! Engine-level error types.

use nodes::NodeError;
use thiserror::Error;

/// Construction-time failures. Fatal to the `create_workflow` call that
/// raised them; no partial workflow is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A node names a type missing from the node registry.
    #[error("node '{node_id}' has unknown node type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },

    /// The directed graph contains a cycle (including self-loops).
    #[error("workflow graph contains a cycle")]
    CyclicWorkflow,

    /// No node is flagged `isStart`.
    #[error("workflow has no start node")]
    MissingStartNode,

    /// No node is flagged `isEnd`.
    #[error("workflow has no end node")]
    MissingEndNode,

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// An edge condition failed to parse.
    #[error("edge '{from}' -> '{to}' has a malformed condition: {reason}")]
    InvalidEdgeCondition {
        from: String,
        to: String,
        reason: String,
    },

    /// The node factory rejected the node's config.
    #[error("node '{node_id}' has invalid config: {reason}")]
    InvalidNodeConfig { node_id: String, reason: String },
}

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A node failed and did not opt out with `stopOnError: false`; the
    /// remainder of the execution was aborted.
    #[error("node '{node_id}' failed: {cause}")]
    NodeExecution {
        node_id: String,
        #[source]
        cause: NodeError,
    },

    /// `execute_workflow` was called with a name that was never created.
    #[error("no workflow registered under '{0}'")]
    UnknownWorkflow(String),

    /// The orchestration context's cancellation token fired.
    #[error("workflow execution cancelled")]
    Cancelled,
}

impl EngineError {
    /// The failing node, for [`EngineError::NodeExecution`].
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeExecution { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}
