//! Workflow execution.
//!
//! `Workflow::execute` is the central orchestration loop:
//! 1. Recomputes a topological ordering (Kahn's algorithm).
//! 2. Builds each node's input: the workflow input for nodes without
//!    incoming edges, otherwise a shallow merge of the predecessors' outputs
//!    in edge-declaration order (later edges win on key collisions).
//! 3. Skips nodes whose incoming edges are all inactive (false condition or
//!    skipped source).
//! 4. Dispatches each node via `ExecutableNode` and records the result or
//!    error in a fresh [`ExecutionState`].
//! 5. Aborts on the first failure unless the node set `stopOnError: false`.

use std::collections::{BTreeMap, HashSet};

use nodes::{ExecutionContext, NodeError};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, instrument, warn};

use crate::EngineError;
use crate::dag::topological_order;
use crate::workflow::{CompiledEdge, Workflow};

/// Per-run mutable state. Created fresh for every execution and never
/// shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionState {
    /// Node outputs, keyed by node ID.
    pub results: Map<String, Value>,
    /// Node failure messages, keyed by node ID.
    pub errors: BTreeMap<String, String>,
    /// Nodes not run because every incoming edge was inactive.
    pub skipped: Vec<String>,
    /// Nodes in the order they were dispatched.
    pub order: Vec<String>,
}

/// Outcome of evaluating a node's incoming edges.
enum Inputs {
    Ready(Value),
    Skip,
}

impl Workflow {
    /// Execute the workflow and return the end-node outputs keyed by node ID.
    /// End nodes that never produced a result are absent from the map.
    ///
    /// # Errors
    /// [`EngineError::NodeExecution`] for an aborting node failure,
    /// [`EngineError::Cancelled`] if the context was cancelled.
    pub async fn execute(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<Map<String, Value>, EngineError> {
        let mut state = ExecutionState::default();
        self.execute_with_state(input, ctx, &mut state).await
    }

    /// Like [`Workflow::execute`], but records into a caller-owned state so
    /// partial results survive a failure.
    #[instrument(skip_all, fields(workflow = %self.name, execution_id = %ctx.execution_id))]
    pub async fn execute_with_state(
        &self,
        input: Value,
        ctx: &ExecutionContext,
        state: &mut ExecutionState,
    ) -> Result<Map<String, Value>, EngineError> {
        let order = self.execution_order()?;
        debug!(?order, "executing {} nodes", order.len());

        let mut skipped: HashSet<String> = HashSet::new();

        for node_id in &order {
            if ctx.is_cancelled() {
                warn!(node = %node_id, "execution cancelled before node");
                return Err(EngineError::Cancelled);
            }

            let workflow_node = &self.nodes[node_id];

            let node_input = match self.node_input(node_id, &input, state, &skipped) {
                Inputs::Ready(value) => value,
                Inputs::Skip => {
                    debug!(node = %node_id, "all incoming edges inactive, skipping");
                    skipped.insert(node_id.clone());
                    state.skipped.push(node_id.clone());
                    continue;
                }
            };

            state.order.push(node_id.clone());

            match workflow_node.node.execute(node_input, ctx).await {
                Ok(output) => {
                    debug!(node = %node_id, "node succeeded");
                    state.results.insert(node_id.clone(), output);
                }
                Err(NodeError::Cancelled) => {
                    state.errors.insert(node_id.clone(), NodeError::Cancelled.to_string());
                    return Err(EngineError::Cancelled);
                }
                Err(cause) => {
                    error!(node = %node_id, error = %cause, "node failed");
                    state.errors.insert(node_id.clone(), cause.to_string());

                    if workflow_node.definition.stop_on_error() {
                        return Err(EngineError::NodeExecution {
                            node_id: node_id.clone(),
                            cause,
                        });
                    }
                    warn!(node = %node_id, "stopOnError is false, continuing");
                }
            }
        }

        let outputs = self
            .end_nodes
            .iter()
            .filter_map(|id| state.results.get(id).map(|v| (id.clone(), v.clone())))
            .collect();
        Ok(outputs)
    }

    /// A valid topological order of the graph.
    ///
    /// # Errors
    /// `CyclicWorkflow`, which construction-time validation already rules out.
    pub fn execution_order(&self) -> Result<Vec<String>, EngineError> {
        let ids: Vec<&str> = self.node_ids.iter().map(String::as_str).collect();
        let pairs: Vec<(&str, &str)> = self
            .edges
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        Ok(topological_order(&ids, &pairs)?)
    }

    fn node_input(
        &self,
        node_id: &str,
        workflow_input: &Value,
        state: &ExecutionState,
        skipped: &HashSet<String>,
    ) -> Inputs {
        let incoming: Vec<&CompiledEdge> = self.incoming(node_id).collect();
        if incoming.is_empty() {
            return Inputs::Ready(workflow_input.clone());
        }

        let mut merged = Map::new();
        let mut any_active = false;

        for edge in incoming {
            if skipped.contains(&edge.from) {
                continue;
            }
            // A failed predecessor (stopOnError: false) has no result; its
            // edge stays active and contributes nothing to the merge.
            let source_output = state.results.get(&edge.from);
            if let Some(condition) = &edge.condition {
                if !condition.is_true(source_output.unwrap_or(&Value::Null)) {
                    continue;
                }
            }
            any_active = true;
            if let Some(output) = source_output {
                merge_into(&mut merged, &edge.from, output);
            }
        }

        if any_active {
            Inputs::Ready(Value::Object(merged))
        } else {
            Inputs::Skip
        }
    }
}

/// Shallow merge. Non-object outputs are keyed by the producing node's ID.
fn merge_into(target: &mut Map<String, Value>, source_id: &str, output: &Value) {
    match output {
        Value::Object(fields) => {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        other => {
            target.insert(source_id.to_string(), other.clone());
        }
    }
}
