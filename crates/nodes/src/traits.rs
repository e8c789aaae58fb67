//! The `ExecutableNode` trait — the contract every node must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::NodeError;
use crate::context::ExecutionContext;

/// The core node trait.
///
/// All built-in nodes and host-defined node types implement this. Instances
/// are built once per workflow and shared across concurrent executions, so
/// `execute` must not keep per-run state on `self`.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the node against the merged output of its predecessors (or
    /// the workflow input for nodes without incoming edges) and return this
    /// node's JSON output.
    async fn execute(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError>;
}
