//! `nodes` crate — the `ExecutableNode` trait and built-in node implementations.
//!
//! Every node — built-in and host-defined alike — must implement
//! [`ExecutableNode`]. The engine crate builds nodes through a
//! [`NodeRegistry`] and dispatches execution through this trait object.

pub mod builtin;
pub mod context;
pub mod definition;
pub mod error;
pub mod expr;
pub mod mock;
pub mod registry;
pub mod template;
pub mod traits;
pub mod transforms;

pub use context::{
    ExecutionContext, HttpFetcher, HttpRequest, HttpResponse, LlmCaller, LlmDefaults, LlmRequest,
    LlmResponse, MemoryCache, OrchestrationContext, ResultCache,
};
pub use definition::NodeDefinition;
pub use error::NodeError;
pub use expr::{ExprError, Expression};
pub use registry::{NodeFactory, NodeRegistry};
pub use traits::ExecutableNode;
pub use transforms::{TransformFn, TransformRegistry};
