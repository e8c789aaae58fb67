//! Workflow definition models.
//!
//! These types are the static, serialisable description of a workflow
//! graph. [`crate::Workflow::build`] validates a definition and turns it
//! into an executable, immutable graph.

use serde::{Deserialize, Serialize};

pub use nodes::NodeDefinition;

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
///
/// `condition` is an optional expression evaluated against the *source*
/// node's output (bound as `input`). A false condition deactivates the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition: nodes plus edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowDefinition {
    pub fn new(nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Self {
        Self {
            description: None,
            nodes,
            edges,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_deserializes_from_json() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "nodes": [
                { "id": "a", "type": "transform", "isStart": true,
                  "config": { "transformFunction": "clean-text" } },
                { "id": "b", "type": "llm", "isEnd": true, "config": { "prompt": "{{name}}" } }
            ],
            "edges": [ { "from": "a", "to": "b", "condition": "input.name" } ]
        }))
        .unwrap();

        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.edges[0], Edge::new("a", "b").when("input.name"));
    }
}
