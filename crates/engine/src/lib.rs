//! `engine` crate — definition models, DAG validation, the workflow
//! executor and the `Engine` registry with its execution history.

pub mod dag;
pub mod error;
pub mod executor;
pub mod history;
pub mod models;
pub mod presets;
pub mod runtime;
pub mod workflow;

pub use dag::validate_dag;
pub use error::{EngineError, ValidationError};
pub use executor::ExecutionState;
pub use history::{ExecutionRecord, ExecutionStatus};
pub use models::{Edge, NodeDefinition, WorkflowDefinition};
pub use runtime::{Engine, EngineConfig, ExecutionResult};
pub use workflow::Workflow;
