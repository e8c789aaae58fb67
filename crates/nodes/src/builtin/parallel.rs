//! `parallel` — fan the same input out to nested sub-nodes.
//!
//! Sub-nodes run concurrently on the current task and are joined before
//! the node returns. A failing sub-node never aborts its siblings or the
//! parallel node itself: its slot in the output holds `{"error": <message>}`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::{ExecutableNode, ExecutionContext, NodeDefinition, NodeError, NodeRegistry};

pub struct ParallelNode {
    /// `None` when `subNodes` was absent from the config.
    sub_nodes: Option<Vec<(String, Arc<dyn ExecutableNode>)>>,
}

impl ParallelNode {
    pub fn new(sub_nodes: Vec<(String, Arc<dyn ExecutableNode>)>) -> Self {
        Self {
            sub_nodes: Some(sub_nodes),
        }
    }

    /// Build every entry of `config.subNodes` through the registry.
    pub fn from_definition(def: &NodeDefinition, registry: &NodeRegistry) -> Result<Self, NodeError> {
        let raw = match def.config_value("subNodes") {
            None | Some(Value::Null) => return Ok(Self { sub_nodes: None }),
            Some(raw) => raw,
        };

        let definitions: Vec<NodeDefinition> = serde_json::from_value(raw.clone()).map_err(|e| {
            NodeError::InvalidConfig(format!("parallel node '{}': bad `subNodes`: {e}", def.id))
        })?;

        let mut seen = HashSet::new();
        let mut sub_nodes = Vec::with_capacity(definitions.len());
        for sub in &definitions {
            if !seen.insert(sub.id.as_str()) {
                return Err(NodeError::InvalidConfig(format!(
                    "parallel node '{}': duplicate sub-node id '{}'",
                    def.id, sub.id
                )));
            }
            sub_nodes.push((sub.id.clone(), registry.build(sub)?));
        }

        Ok(Self {
            sub_nodes: Some(sub_nodes),
        })
    }
}

#[async_trait]
impl ExecutableNode for ParallelNode {
    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let sub_nodes = self.sub_nodes.as_ref().ok_or(NodeError::MissingSubNodesConfig)?;

        let settled = join_all(
            sub_nodes
                .iter()
                .map(|(_, node)| node.execute(input.clone(), ctx)),
        )
        .await;

        let mut output = Map::new();
        for ((id, _), result) in sub_nodes.iter().zip(settled) {
            let value = match result {
                Ok(value) => value,
                Err(e) => {
                    warn!(sub_node = %id, error = %e, "parallel sub-node failed");
                    json!({ "error": e.to_string() })
                }
            };
            output.insert(id.clone(), value);
        }
        Ok(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrchestrationContext;
    use crate::mock::MockNode;
    use std::time::Duration;

    fn ctx() -> ExecutionContext {
        ExecutionContext::with_builtins("test", OrchestrationContext::new())
    }

    fn shared(node: MockNode) -> Arc<dyn ExecutableNode> {
        Arc::new(node)
    }

    #[tokio::test]
    async fn sibling_failures_are_contained() {
        let node = ParallelNode::new(vec![
            ("first".into(), shared(MockNode::returning("first", json!({ "n": 1 })))),
            ("second".into(), shared(MockNode::failing("second", "rate limited"))),
            ("third".into(), shared(MockNode::returning("third", json!({ "n": 3 })))),
        ]);

        let out = node.execute(json!({}), &ctx()).await.expect("parallel node never throws");
        assert_eq!(
            out,
            json!({
                "first": { "n": 1 },
                "second": { "error": "rate limited" },
                "third": { "n": 3 }
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sub_nodes_run_concurrently() {
        let slow = |name: &str| {
            shared(MockNode::returning(name, json!(name)).with_delay(Duration::from_secs(1)))
        };
        let node = ParallelNode::new(vec![("a".into(), slow("a")), ("b".into(), slow("b"))]);

        let started = tokio::time::Instant::now();
        node.execute(json!({}), &ctx()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn every_sub_node_receives_the_same_input() {
        let a = Arc::new(MockNode::echo("a"));
        let b = Arc::new(MockNode::echo("b"));
        let node = ParallelNode::new(vec![
            ("a".into(), a.clone() as Arc<dyn ExecutableNode>),
            ("b".into(), b.clone() as Arc<dyn ExecutableNode>),
        ]);

        node.execute(json!({ "profile": "x" }), &ctx()).await.unwrap();
        assert_eq!(a.calls(), vec![json!({ "profile": "x" })]);
        assert_eq!(b.calls(), vec![json!({ "profile": "x" })]);
    }

    #[tokio::test]
    async fn builds_sub_nodes_from_config() {
        let registry = NodeRegistry::with_builtins();
        let def = NodeDefinition::new("fan", "parallel").with_config(json!({
            "subNodes": [
                { "id": "clean", "type": "transform", "config": { "transformFunction": "clean-text" } },
                { "id": "ghost", "type": "transform", "config": { "transformFunction": "nope" } }
            ]
        }));
        let node = ParallelNode::from_definition(&def, &registry).unwrap();

        let out = node.execute(json!({ "a": " x " }), &ctx()).await.unwrap();
        assert_eq!(out["clean"], json!({ "a": "x" }));
        assert_eq!(out["ghost"], json!({ "error": "unknown transform: 'nope'" }));
    }

    #[tokio::test]
    async fn missing_sub_nodes_fails() {
        let registry = NodeRegistry::with_builtins();
        let node = ParallelNode::from_definition(&NodeDefinition::new("p", "parallel"), &registry).unwrap();
        let err = node.execute(json!({}), &ctx()).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingSubNodesConfig));
    }

    #[tokio::test]
    async fn null_sub_nodes_count_as_missing() {
        let registry = NodeRegistry::with_builtins();
        let def = NodeDefinition::new("p", "parallel").with_config(json!({ "subNodes": null }));
        let node = ParallelNode::from_definition(&def, &registry).unwrap();
        let err = node.execute(json!({}), &ctx()).await.unwrap_err();
        assert!(matches!(err, NodeError::MissingSubNodesConfig));
    }

    #[test]
    fn unknown_sub_node_type_is_rejected_at_build() {
        let registry = NodeRegistry::with_builtins();
        let def = NodeDefinition::new("p", "parallel")
            .with_config(json!({ "subNodes": [{ "id": "x", "type": "telepathy" }] }));
        assert!(matches!(
            ParallelNode::from_definition(&def, &registry),
            Err(NodeError::UnknownNodeType(t)) if t == "telepathy"
        ));
    }
}
