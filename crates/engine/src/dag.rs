//! DAG validation — run this before building or executing a workflow.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs (both `from` and `to`).
//! 3. The directed graph must be acyclic (depth-first search with a
//!    recursion stack; self-loops count as cycles).
//! 4. At least one node is flagged `isStart` and at least one `isEnd`.
//!
//! Returns a topologically-sorted list of node IDs on success.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ValidationError;
use crate::models::{Edge, WorkflowDefinition};

/// Validate the workflow's DAG and return nodes in topological execution order.
///
/// # Errors
/// - [`ValidationError::DuplicateNodeId`] if two nodes share an ID.
/// - [`ValidationError::UnknownNodeReference`] if an edge references a missing node.
/// - [`ValidationError::CyclicWorkflow`] if the graph is not acyclic.
/// - [`ValidationError::MissingStartNode`] / [`ValidationError::MissingEndNode`].
pub fn validate_dag(definition: &WorkflowDefinition) -> Result<Vec<String>, ValidationError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &definition.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in &definition.edges {
        if !seen_ids.contains(edge.from.as_str()) {
            return Err(ValidationError::UnknownNodeReference {
                node_id: edge.from.clone(),
                side: "from",
            });
        }
        if !seen_ids.contains(edge.to.as_str()) {
            return Err(ValidationError::UnknownNodeReference {
                node_id: edge.to.clone(),
                side: "to",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Cycle detection
    // -----------------------------------------------------------------------
    let ids: Vec<&str> = definition.nodes.iter().map(|n| n.id.as_str()).collect();
    let pairs = edge_pairs(&definition.edges);
    if has_cycle(&ids, &pairs) {
        return Err(ValidationError::CyclicWorkflow);
    }

    // -----------------------------------------------------------------------
    // 4. Start / end presence
    // -----------------------------------------------------------------------
    if !definition.nodes.iter().any(|n| n.is_start) {
        return Err(ValidationError::MissingStartNode);
    }
    if !definition.nodes.iter().any(|n| n.is_end) {
        return Err(ValidationError::MissingEndNode);
    }

    topological_order(&ids, &pairs)
}

/// `(from, to)` pairs in declaration order.
pub fn edge_pairs(edges: &[Edge]) -> Vec<(&str, &str)> {
    edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect()
}

/// Depth-first search with an explicit recursion stack.
pub fn has_cycle(ids: &[&str], edges: &[(&str, &str)]) -> bool {
    let adjacency = adjacency(ids, edges);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    for &root in ids {
        if visited.contains(root) {
            continue;
        }

        // (node, index of the next successor to visit)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        visited.insert(root);
        on_stack.insert(root);

        while let Some((node, next)) = stack.last_mut() {
            let successors = &adjacency[*node];
            if let Some(&succ) = successors.get(*next) {
                *next += 1;
                if on_stack.contains(succ) {
                    return true;
                }
                if visited.insert(succ) {
                    on_stack.insert(succ);
                    stack.push((succ, 0));
                }
            } else {
                on_stack.remove(*node);
                stack.pop();
            }
        }
    }
    false
}

/// Kahn's algorithm. Nodes become ready in declaration order, but callers
/// must not rely on any particular order among independent nodes.
///
/// # Errors
/// [`ValidationError::CyclicWorkflow`] if some node never reaches in-degree 0.
pub fn topological_order(ids: &[&str], edges: &[(&str, &str)]) -> Result<Vec<String>, ValidationError> {
    let adjacency = adjacency(ids, edges);
    let mut in_degree: HashMap<&str, usize> = ids.iter().map(|&id| (id, 0)).collect();

    for &(_, to) in edges {
        *in_degree.entry(to).or_insert(0) += 1;
    }

    // Seed the queue with nodes that have no incoming edges.
    let mut queue: VecDeque<&str> = ids.iter().copied().filter(|id| in_degree[id] == 0).collect();
    let mut sorted: Vec<String> = Vec::with_capacity(ids.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        for &neighbour in &adjacency[node_id] {
            if let Some(deg) = in_degree.get_mut(neighbour) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if sorted.len() != ids.len() {
        return Err(ValidationError::CyclicWorkflow);
    }

    Ok(sorted)
}

fn adjacency<'a>(ids: &[&'a str], edges: &[(&'a str, &'a str)]) -> HashMap<&'a str, Vec<&'a str>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = ids.iter().map(|&id| (id, Vec::new())).collect();
    for &(from, to) in edges {
        adjacency.entry(from).or_default().push(to);
        adjacency.entry(to).or_default();
    }
    adjacency
}
