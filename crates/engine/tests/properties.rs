//! Randomised graph properties: cycles are always rejected and execution
//! order always respects every edge.

use engine::{Edge, Engine, NodeDefinition, ValidationError, Workflow, WorkflowDefinition};
use engine::executor::ExecutionState;
use nodes::{ExecutionContext, NodeRegistry, OrchestrationContext};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

const SEED: u64 = 0x5eed_cafe;
const ROUNDS: usize = 200;

fn passthrough(id: &str) -> NodeDefinition {
    NodeDefinition::new(id, "transform").with_config(json!({ "transformFunction": "passthrough" }))
}

/// A random DAG. Edges only point forward in a hidden ranking, and nodes
/// are declared in shuffled order so declaration order reveals nothing.
fn random_dag(rng: &mut StdRng) -> (WorkflowDefinition, Vec<String>) {
    let n = rng.gen_range(1..=12);
    let ranking: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();

    let mut edges = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if rng.gen_bool(0.3) {
                edges.push(Edge::new(ranking[i].clone(), ranking[j].clone()));
            }
        }
    }
    edges.shuffle(rng);

    let mut nodes: Vec<NodeDefinition> = ranking.iter().map(|id| passthrough(id)).collect();
    nodes[0].is_start = true;
    nodes[n - 1].is_end = true;
    nodes.shuffle(rng);

    (WorkflowDefinition::new(nodes, edges), ranking)
}

#[tokio::test]
async fn execution_order_is_topological_for_random_dags() {
    let mut rng = StdRng::seed_from_u64(SEED);
    let registry = NodeRegistry::with_builtins();

    for _ in 0..ROUNDS {
        let (def, _) = random_dag(&mut rng);
        let wf = Workflow::build("random", &def, &registry).expect("random DAG is valid");

        let order = wf.execution_order().unwrap();
        assert_eq!(order.len(), def.nodes.len());
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        for edge in &def.edges {
            assert!(pos(&edge.from) < pos(&edge.to), "{} placed after {}", edge.from, edge.to);
        }

        // The executor dispatches in a topological order too.
        let ctx = ExecutionContext::with_builtins("random", OrchestrationContext::new());
        let mut state = ExecutionState::default();
        wf.execute_with_state(json!({ "seed": 1 }), &ctx, &mut state)
            .await
            .unwrap();
        let ran = |id: &str| state.order.iter().position(|n| n == id).unwrap();
        for edge in &def.edges {
            assert!(ran(&edge.from) < ran(&edge.to));
        }
    }
}

#[test]
fn any_back_edge_makes_creation_fail() {
    let mut rng = StdRng::seed_from_u64(SEED ^ 1);
    let mut engine = Engine::new();

    for round in 0..ROUNDS {
        let (mut def, ranking) = random_dag(&mut rng);
        // Close a cycle: from a later-ranked node back to an earlier (or the same) one.
        let to = rng.gen_range(0..ranking.len());
        let from = rng.gen_range(to..ranking.len());
        def.edges.push(Edge::new(ranking[from].clone(), ranking[to].clone()));

        if from != to && !reaches(&def, &ranking[to], &ranking[from]) {
            // The new edge only closes a cycle if the path back exists.
            continue;
        }

        let name = format!("cyclic-{round}");
        assert_eq!(
            engine.create_workflow(name.as_str(), &def).unwrap_err(),
            ValidationError::CyclicWorkflow
        );
        assert!(engine.workflow(&name).is_none());
    }
    assert!(engine.workflow_names().is_empty());
}

#[test]
fn fixed_cycles_are_rejected() {
    let cases = [
        vec![("a", "a")],
        vec![("a", "b"), ("b", "a")],
        vec![("a", "b"), ("b", "c"), ("c", "a")],
        vec![("a", "b"), ("c", "d"), ("d", "c")],
    ];
    for edges in cases {
        let mut ids: Vec<&str> = edges.iter().flat_map(|(f, t)| [*f, *t]).collect();
        ids.sort_unstable();
        ids.dedup();
        let mut nodes: Vec<NodeDefinition> = ids.iter().map(|id| passthrough(id)).collect();
        nodes[0].is_start = true;
        nodes[0].is_end = true;
        let def = WorkflowDefinition::new(
            nodes,
            edges.iter().map(|(f, t)| Edge::new(*f, *t)).collect(),
        );

        let mut engine = Engine::new();
        assert_eq!(
            engine.create_workflow("cyclic", &def).unwrap_err(),
            ValidationError::CyclicWorkflow,
            "edges {edges:?}"
        );
        assert!(engine.workflow("cyclic").is_none());
    }
}

/// Whether `to` is reachable from `from` along the definition's edges.
fn reaches(def: &WorkflowDefinition, from: &str, to: &str) -> bool {
    let mut stack = vec![from.to_string()];
    let mut seen = std::collections::HashSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if seen.insert(node.clone()) {
            stack.extend(def.edges.iter().filter(|e| e.from == node).map(|e| e.to.clone()));
        }
    }
    false
}
