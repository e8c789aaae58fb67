//! End-to-end runs through `Engine` with built-in node types.

use std::sync::Arc;

use async_trait::async_trait;
use engine::{Edge, Engine, EngineError, ExecutionStatus, NodeDefinition, WorkflowDefinition};
use nodes::{LlmCaller, LlmRequest, LlmResponse, NodeError, OrchestrationContext};
use serde_json::json;

/// Replies with the prompt text so tests can see which branch ran.
struct EchoLlm;

#[async_trait]
impl LlmCaller for EchoLlm {
    async fn call_llm(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
        Ok(LlmResponse::text(request.prompt))
    }
}

fn services() -> OrchestrationContext {
    OrchestrationContext::new().with_llm(Arc::new(EchoLlm))
}

fn transform(id: &str, function: &str) -> NodeDefinition {
    NodeDefinition::new(id, "transform").with_config(json!({ "transformFunction": function }))
}

/// A(transform) → B(decision) → C(llm) | D(llm) → E(transform)
fn routed() -> WorkflowDefinition {
    WorkflowDefinition::new(
        vec![
            transform("a", "passthrough").start(),
            NodeDefinition::new("b", "decision").with_config(json!({ "condition": "input.score > 0.5" })),
            NodeDefinition::new("c", "llm").with_config(json!({ "prompt": "high {{score}}" })),
            NodeDefinition::new("d", "llm").with_config(json!({ "prompt": "low {{score}}" })),
            transform("e", "passthrough").end(),
        ],
        vec![
            Edge::new("a", "b"),
            Edge::new("b", "c").when("input.decision == true"),
            Edge::new("b", "d").when("input.decision == false"),
            Edge::new("c", "e"),
            Edge::new("d", "e"),
        ],
    )
}

#[tokio::test]
async fn decision_routes_to_the_true_branch() {
    let mut engine = Engine::new();
    engine.create_workflow("routed", &routed()).unwrap();

    let result = engine
        .execute("routed", json!({ "score": 0.9 }), services())
        .await
        .unwrap();

    assert_eq!(result.output["e"], json!({ "content": "high 0.9" }));

    let record = engine.execution(result.execution_id).unwrap();
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert_eq!(record.results["c"], json!({ "content": "high 0.9" }));
    assert!(!record.results.contains_key("d"));
    assert_eq!(record.skipped, vec!["d"]);
    assert!(record.errors.is_empty());
}

#[tokio::test]
async fn decision_routes_to_the_false_branch() {
    let mut engine = Engine::new();
    engine.create_workflow("routed", &routed()).unwrap();

    let out = engine
        .execute_workflow("routed", json!({ "score": 0.1 }), services())
        .await
        .unwrap();

    assert_eq!(out["e"], json!({ "content": "low 0.1" }));
    assert_eq!(engine.recent(1)[0].skipped, vec!["c"]);
}

#[tokio::test]
async fn missing_llm_collaborator_fails_the_node() {
    let mut engine = Engine::new();
    engine.create_workflow("routed", &routed()).unwrap();

    let err = engine
        .execute_workflow("routed", json!({ "score": 0.9 }), OrchestrationContext::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::NodeExecution { ref node_id, cause: NodeError::MissingCollaborator("llm") } if node_id == "c"
    ));
    let record = &engine.history()[0];
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.results.contains_key("b"));
}

#[tokio::test]
async fn parallel_failure_is_contained() {
    let mut engine = Engine::new();
    engine.register_transform("explode", |_| Err(NodeError::failed("scraper returned nothing")));

    let def = WorkflowDefinition::new(
        vec![NodeDefinition::new("fan", "parallel")
            .with_config(json!({
                "subNodes": [
                    { "id": "one", "type": "transform", "config": { "transformFunction": "passthrough" } },
                    { "id": "two", "type": "transform", "config": { "transformFunction": "explode" } },
                    { "id": "three", "type": "transform", "config": { "transformFunction": "clean-text" } }
                ]
            }))
            .start()
            .end()],
        vec![],
    );
    engine.create_workflow("fan", &def).unwrap();

    let out = engine
        .execute_workflow("fan", json!({ "text": "  hi  " }), OrchestrationContext::new())
        .await
        .unwrap();

    assert_eq!(
        out["fan"],
        json!({
            "one": { "text": "  hi  " },
            "two": { "error": "scraper returned nothing" },
            "three": { "text": "hi" }
        })
    );
    assert_eq!(engine.history()[0].status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn retry_is_a_new_execution() {
    let mut engine = Engine::new();
    engine.create_workflow("routed", &routed()).unwrap();

    let first = engine.execute_workflow("routed", json!({ "score": 0.9 }), OrchestrationContext::new()).await;
    assert!(first.is_err());
    let second = engine.execute_workflow("routed", json!({ "score": 0.9 }), services()).await;
    assert!(second.is_ok());

    let statuses: Vec<ExecutionStatus> = engine.history().iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![ExecutionStatus::Failed, ExecutionStatus::Completed]);
}

#[test]
fn definitions_load_from_json() {
    let def: WorkflowDefinition = serde_json::from_value(json!({
        "description": "single step",
        "nodes": [
            { "id": "only", "type": "transform", "isStart": true, "isEnd": true,
              "config": { "transformFunction": "clean-text", "unused": 1 } }
        ]
    }))
    .unwrap();

    let mut engine = Engine::new();
    let wf = engine.create_workflow("from-json", &def).unwrap();
    assert_eq!(wf.description(), Some("single step"));
    assert_eq!(wf.start_nodes(), ["only"]);
}
