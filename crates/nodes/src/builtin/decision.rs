//! `decision` — evaluate a condition and emit one of two outputs.
//!
//! `config.condition` is either a boolean or an expression string in the
//! [`expr`](crate::expr) language. A malformed expression never fails the
//! node; it evaluates to `false` and is logged.
//!
//! `config.trueOutput` / `config.falseOutput` select the output; a branch
//! left unconfigured emits `null`. With neither configured, the input is
//! passed through with `"decision": <bool>` added (non-object inputs are
//! wrapped as `{"value": <input>, "decision": <bool>}`).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::expr::Expression;
use crate::{ExecutableNode, ExecutionContext, NodeDefinition, NodeError};

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

pub enum Condition {
    Constant(bool),
    Expression(Expression),
    Predicate(Predicate),
    /// Kept so the failure is reported at evaluation time rather than
    /// rejected at build time.
    Malformed { source: String, reason: String },
}

impl Condition {
    pub fn parse(source: &str) -> Self {
        match Expression::parse(source) {
            Ok(expr) => Self::Expression(expr),
            Err(e) => Self::Malformed {
                source: source.to_string(),
                reason: e.to_string(),
            },
        }
    }

    pub fn evaluate(&self, input: &Value) -> bool {
        match self {
            Self::Constant(b) => *b,
            Self::Expression(expr) => expr.is_true(input),
            Self::Predicate(p) => p(input),
            Self::Malformed { source, reason } => {
                warn!(condition = %source, %reason, "malformed decision condition, treating as false");
                false
            }
        }
    }
}

pub struct DecisionNode {
    condition: Condition,
    true_output: Option<Value>,
    false_output: Option<Value>,
}

impl DecisionNode {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            true_output: None,
            false_output: None,
        }
    }

    pub fn from_predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::new(Condition::Predicate(Arc::new(predicate)))
    }

    pub fn with_outputs(mut self, true_output: Value, false_output: Value) -> Self {
        self.true_output = Some(true_output);
        self.false_output = Some(false_output);
        self
    }

    pub fn from_definition(def: &NodeDefinition) -> Result<Self, NodeError> {
        let condition = match def.config_value("condition") {
            Some(Value::Bool(b)) => Condition::Constant(*b),
            Some(Value::String(src)) => Condition::parse(src),
            Some(other) => Condition::Malformed {
                source: other.to_string(),
                reason: "condition must be a string or boolean".to_string(),
            },
            None => {
                return Err(NodeError::InvalidConfig(format!(
                    "decision node '{}' needs a `condition`",
                    def.id
                )));
            }
        };

        Ok(Self {
            condition,
            true_output: def.config_value("trueOutput").cloned(),
            false_output: def.config_value("falseOutput").cloned(),
        })
    }
}

fn passthrough(input: Value, decision: bool) -> Value {
    let mut map = match input {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("value".to_string(), other)]),
    };
    map.insert("decision".to_string(), Value::Bool(decision));
    Value::Object(map)
}

#[async_trait]
impl ExecutableNode for DecisionNode {
    async fn execute(&self, input: Value, _ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let decision = self.condition.evaluate(&input);
        debug!(decision, "decision evaluated");

        if self.true_output.is_none() && self.false_output.is_none() {
            return Ok(passthrough(input, decision));
        }
        let chosen = if decision {
            &self.true_output
        } else {
            &self.false_output
        };
        Ok(chosen.clone().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrchestrationContext;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::with_builtins("test", OrchestrationContext::new())
    }

    fn node(config: Value) -> DecisionNode {
        DecisionNode::from_definition(&NodeDefinition::new("d", "decision").with_config(config)).unwrap()
    }

    #[tokio::test]
    async fn routes_to_configured_outputs() {
        let d = node(json!({
            "condition": "input.score > 0.5",
            "trueOutput": { "route": "detailed" },
            "falseOutput": { "route": "basic" }
        }));

        assert_eq!(d.execute(json!({ "score": 0.9 }), &ctx()).await.unwrap(), json!({ "route": "detailed" }));
        assert_eq!(d.execute(json!({ "score": 0.1 }), &ctx()).await.unwrap(), json!({ "route": "basic" }));
    }

    #[tokio::test]
    async fn passes_input_through_without_outputs() {
        let d = node(json!({ "condition": "input.experiences.length > 0" }));
        let out = d.execute(json!({ "experiences": [1] }), &ctx()).await.unwrap();
        assert_eq!(out, json!({ "experiences": [1], "decision": true }));

        let out = d.execute(json!(7), &ctx()).await.unwrap();
        assert_eq!(out, json!({ "value": 7, "decision": false }));
    }

    #[tokio::test]
    async fn unconfigured_branch_emits_null_not_the_input() {
        let d = node(json!({
            "condition": "input.score > 0.5",
            "trueOutput": { "route": "detailed" }
        }));
        let input = json!({ "score": 0.1, "secret": "x" });
        assert_eq!(d.execute(input, &ctx()).await.unwrap(), Value::Null);
        assert_eq!(
            d.execute(json!({ "score": 0.9 }), &ctx()).await.unwrap(),
            json!({ "route": "detailed" })
        );

        let d = node(json!({ "condition": true, "falseOutput": "basic" }));
        assert_eq!(d.execute(json!({ "secret": "x" }), &ctx()).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn malformed_condition_evaluates_to_false() {
        let d = node(json!({
            "condition": "input.score >>> ",
            "trueOutput": "yes",
            "falseOutput": "no"
        }));
        assert_eq!(d.execute(json!({ "score": 1 }), &ctx()).await.unwrap(), json!("no"));
    }

    #[tokio::test]
    async fn predicate_closures_are_supported() {
        let d = DecisionNode::from_predicate(|v| v["connections"].as_u64().unwrap_or(0) >= 500)
            .with_outputs(json!("well-connected"), json!("growing"));
        assert_eq!(
            d.execute(json!({ "connections": 800 }), &ctx()).await.unwrap(),
            json!("well-connected")
        );
    }

    #[test]
    fn missing_condition_is_a_config_error() {
        let def = NodeDefinition::new("d", "decision");
        assert!(matches!(DecisionNode::from_definition(&def), Err(NodeError::InvalidConfig(_))));
    }
}
