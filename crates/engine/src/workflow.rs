//! The built, immutable workflow graph.
//!
//! A [`Workflow`] is created once from a [`WorkflowDefinition`], validated
//! immediately, and then shared read-only by every execution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use nodes::{ExecutableNode, Expression, NodeDefinition, NodeError, NodeRegistry};
use tracing::debug;

use crate::ValidationError;
use crate::dag::validate_dag;
use crate::models::WorkflowDefinition;

/// A node definition paired with its instantiated implementation.
pub struct WorkflowNode {
    pub definition: NodeDefinition,
    pub node: Arc<dyn ExecutableNode>,
}

/// An edge with its condition pre-parsed.
#[derive(Debug, Clone)]
pub struct CompiledEdge {
    pub from: String,
    pub to: String,
    pub condition: Option<Expression>,
}

pub struct Workflow {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) nodes: HashMap<String, WorkflowNode>,
    /// Declaration order; Kahn's algorithm seeds from it.
    pub(crate) node_ids: Vec<String>,
    pub(crate) edges: Vec<CompiledEdge>,
    pub(crate) start_nodes: Vec<String>,
    pub(crate) end_nodes: Vec<String>,
}

impl Workflow {
    /// Validate `definition` and instantiate every node through `registry`.
    ///
    /// # Errors
    /// Any [`ValidationError`]; nothing is constructed on failure.
    pub fn build(
        name: impl Into<String>,
        definition: &WorkflowDefinition,
        registry: &NodeRegistry,
    ) -> Result<Self, ValidationError> {
        let name = name.into();

        // Unknown types are reported before structural problems so a typo
        // in a type name isn't masked by a follow-on error.
        for def in &definition.nodes {
            if !registry.contains(&def.node_type) {
                return Err(ValidationError::UnknownNodeType {
                    node_id: def.id.clone(),
                    node_type: def.node_type.clone(),
                });
            }
        }

        let order = validate_dag(definition)?;

        let edges = definition
            .edges
            .iter()
            .map(|edge| {
                let condition = edge
                    .condition
                    .as_deref()
                    .map(Expression::parse)
                    .transpose()
                    .map_err(|e| ValidationError::InvalidEdgeCondition {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(CompiledEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    condition,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let mut nodes = HashMap::with_capacity(definition.nodes.len());
        for def in &definition.nodes {
            let node = registry.build(def).map_err(|e| match e {
                NodeError::UnknownNodeType(node_type) => ValidationError::UnknownNodeType {
                    node_id: def.id.clone(),
                    node_type,
                },
                other => ValidationError::InvalidNodeConfig {
                    node_id: def.id.clone(),
                    reason: other.to_string(),
                },
            })?;
            nodes.insert(
                def.id.clone(),
                WorkflowNode {
                    definition: def.clone(),
                    node,
                },
            );
        }

        debug!(workflow = %name, ?order, "workflow built");

        Ok(Self {
            name,
            description: definition.description.clone(),
            nodes,
            node_ids: definition.nodes.iter().map(|n| n.id.clone()).collect(),
            edges,
            start_nodes: flagged(definition, |n| n.is_start),
            end_nodes: flagged(definition, |n| n.is_end),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn start_nodes(&self) -> &[String] {
        &self.start_nodes
    }

    pub fn end_nodes(&self) -> &[String] {
        &self.end_nodes
    }

    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    pub fn edges(&self) -> &[CompiledEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    /// Edges pointing at `id`, in declaration order.
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &CompiledEdge> {
        let id = id.to_string();
        self.edges.iter().filter(move |e| e.to == id)
    }
}

fn flagged(definition: &WorkflowDefinition, pred: impl Fn(&NodeDefinition) -> bool) -> Vec<String> {
    definition
        .nodes
        .iter()
        .filter(|n| pred(n))
        .map(|n| n.id.clone())
        .collect()
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("nodes", &self.node_ids)
            .field("edges", &self.edges)
            .field("start_nodes", &self.start_nodes)
            .field("end_nodes", &self.end_nodes)
            .finish()
    }
}
