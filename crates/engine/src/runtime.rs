//! The `Engine`: named workflows, node-type constructors and history.
//!
//! Hosts construct one `Engine`, register custom node types and transforms,
//! build workflows with [`Engine::create_workflow`] and run them with
//! [`Engine::execute`]. Every execution appends one [`ExecutionRecord`],
//! whatever its outcome.

use std::collections::HashMap;
use std::sync::Arc;

use nodes::{
    ExecutableNode, ExecutionContext, NodeDefinition, NodeError, NodeRegistry,
    OrchestrationContext, TransformRegistry,
};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::executor::ExecutionState;
use crate::history::{ExecutionHistory, ExecutionRecord, ExecutionStatus};
use crate::models::WorkflowDefinition;
use crate::workflow::Workflow;
use crate::{EngineError, ValidationError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Maximum number of history records kept. `None` keeps everything.
    pub history_limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Output of a completed execution
// ---------------------------------------------------------------------------

/// The result of running a full workflow.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// ID of the history record created for this run.
    pub execution_id: Uuid,
    /// End-node outputs keyed by node ID.
    pub output: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    registry: NodeRegistry,
    transforms: Arc<TransformRegistry>,
    workflows: HashMap<String, Arc<Workflow>>,
    history: ExecutionHistory,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the built-in node types and transforms.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_transforms(config, TransformRegistry::with_builtins())
    }

    /// Use a host-supplied transform registry instead of the built-ins.
    pub fn with_transforms(config: EngineConfig, transforms: TransformRegistry) -> Self {
        Self {
            history: ExecutionHistory::new(config.history_limit),
            config,
            registry: NodeRegistry::with_builtins(),
            transforms: Arc::new(transforms),
            workflows: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a node-type constructor. Only workflows created afterwards
    /// can reference it.
    pub fn register_node_type<F>(&mut self, node_type: impl Into<String>, factory: F)
    where
        F: Fn(&NodeDefinition, &NodeRegistry) -> Result<Arc<dyn ExecutableNode>, NodeError>
            + Send
            + Sync
            + 'static,
    {
        self.registry.register(node_type, factory);
    }

    /// Register (or replace) a named transform.
    pub fn register_transform<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Result<Value, NodeError> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.transforms).register(name, f);
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    /// Build, validate and register a workflow under `name`, replacing any
    /// previous workflow of that name.
    ///
    /// # Errors
    /// Any [`ValidationError`]. Nothing is registered on failure.
    pub fn create_workflow(
        &mut self,
        name: impl Into<String>,
        definition: &WorkflowDefinition,
    ) -> Result<Arc<Workflow>, ValidationError> {
        let name = name.into();
        let workflow = Arc::new(Workflow::build(name.clone(), definition, &self.registry)?);
        info!(workflow = %name, nodes = workflow.node_ids().len(), "workflow registered");
        self.workflows.insert(name, workflow.clone());
        Ok(workflow)
    }

    pub fn workflow(&self, name: &str) -> Option<Arc<Workflow>> {
        self.workflows.get(name).cloned()
    }

    /// Registered workflow names, sorted.
    pub fn workflow_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.workflows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the workflow registered under `name`.
    ///
    /// # Errors
    /// [`EngineError::UnknownWorkflow`], [`EngineError::NodeExecution`] or
    /// [`EngineError::Cancelled`]. The failure is recorded in history before
    /// it is returned.
    #[instrument(skip(self, input, services), fields(execution_id = tracing::field::Empty))]
    pub async fn execute(
        &self,
        name: &str,
        input: Value,
        services: OrchestrationContext,
    ) -> Result<ExecutionResult, EngineError> {
        let execution_id = Uuid::new_v4();
        tracing::Span::current().record("execution_id", tracing::field::display(execution_id));

        let running = self.history.start(ExecutionRecord::running(
            execution_id,
            name,
            input.clone(),
            services.metadata.clone(),
        ));

        let Some(workflow) = self.workflow(name) else {
            let err = EngineError::UnknownWorkflow(name.to_string());
            error!(error = %err, "execution failed");
            running.finish(
                ExecutionStatus::Failed,
                ExecutionState::default(),
                Some(err.to_string()),
            );
            return Err(err);
        };

        let mut ctx = ExecutionContext::new(name, services, self.transforms.clone());
        ctx.execution_id = execution_id;

        let mut state = ExecutionState::default();
        match workflow.execute_with_state(input, &ctx, &mut state).await {
            Ok(output) => {
                info!(skipped = state.skipped.len(), "execution completed");
                running.finish(ExecutionStatus::Completed, state, None);
                Ok(ExecutionResult {
                    execution_id,
                    output,
                })
            }
            Err(err) => {
                error!(error = %err, "execution failed");
                running.finish(
                    ExecutionStatus::Failed,
                    state,
                    Some(err.to_string()),
                );
                Err(err)
            }
        }
    }

    /// [`Engine::execute`] without the execution ID.
    pub async fn execute_workflow(
        &self,
        name: &str,
        input: Value,
        services: OrchestrationContext,
    ) -> Result<Map<String, Value>, EngineError> {
        self.execute(name, input, services)
            .await
            .map(|result| result.output)
    }

    /// Every execution record, oldest first.
    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.all()
    }

    pub fn recent(&self, n: usize) -> Vec<ExecutionRecord> {
        self.history.recent(n)
    }

    pub fn execution(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.history.get(id)
    }
}
