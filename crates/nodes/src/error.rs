//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method or by a node factory.
///
/// The workflow executor treats every variant the same way: the failure is
/// recorded against the node and, unless the node opts out with
/// `stopOnError: false`, the execution is aborted.
#[derive(Debug, Error)]
pub enum NodeError {
    /// `transformFunction` names a transform that is not registered.
    #[error("unknown transform: '{0}'")]
    UnknownTransform(String),

    /// An `llm` node was configured without a `prompt`.
    #[error("llm node has no `prompt` configured")]
    MissingPromptConfig,

    /// A `parallel` node was configured without `subNodes`.
    #[error("parallel node has no `subNodes` configured")]
    MissingSubNodesConfig,

    /// An `api_call` node received a non-2xx response.
    #[error("http request failed with status {status}")]
    HttpError { status: u16 },

    /// A node (or nested sub-node) names a type the registry doesn't know.
    #[error("unknown node type: '{0}'")]
    UnknownNodeType(String),

    /// The node's config is structurally unusable.
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    /// The execution context does not carry a collaborator the node needs.
    #[error("no {0} collaborator configured in the orchestration context")]
    MissingCollaborator(&'static str),

    /// A response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The execution was cancelled while the node was in flight.
    #[error("node execution cancelled")]
    Cancelled,

    /// Failure surfaced by an external collaborator (LLM caller, HTTP
    /// fetcher). Rendered verbatim.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),

    /// Free-form failure raised by transforms and host-defined nodes.
    #[error("{0}")]
    Failed(String),
}

impl NodeError {
    /// Convenience constructor for [`NodeError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
