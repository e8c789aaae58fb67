//! `llm` — render a prompt template and delegate to the LLM collaborator.
//!
//! Config keys: `prompt` (required at execution), `model`, `temperature`,
//! `maxTokens`. Unset parameters fall back to the context's
//! [`LlmDefaults`](crate::LlmDefaults).

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::template::{RenderStyle, Template};
use crate::{ExecutableNode, ExecutionContext, LlmRequest, NodeDefinition, NodeError};

pub struct LlmNode {
    prompt: Option<Template>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmNode {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: Some(Template::parse(prompt)),
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn from_definition(def: &NodeDefinition) -> Result<Self, NodeError> {
        let number = |key: &str| -> Result<Option<f64>, NodeError> {
            match def.config_value(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                    NodeError::InvalidConfig(format!("llm node '{}': `{key}` must be a number", def.id))
                }),
            }
        };

        Ok(Self {
            prompt: def.config_str("prompt").map(Template::parse),
            model: def.config_str("model").map(str::to_string),
            temperature: number("temperature")?.map(|t| t as f32),
            max_tokens: number("maxTokens")?.map(|t| t as u32),
        })
    }

    fn request(&self, input: &Value, ctx: &ExecutionContext) -> Result<LlmRequest, NodeError> {
        let prompt = self.prompt.as_ref().ok_or(NodeError::MissingPromptConfig)?;
        let defaults = ctx.llm_defaults();
        Ok(LlmRequest {
            prompt: prompt.render(input, RenderStyle::Json),
            model: self.model.clone().unwrap_or_else(|| defaults.model.clone()),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        })
    }
}

/// Parse a completion as JSON, tolerating a surrounding Markdown code
/// fence. Anything unparseable becomes `{"content": <raw text>}`.
pub fn parse_completion(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    if let Some(body) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return value;
        }
    }
    json!({ "content": raw })
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("```")?.strip_suffix("```")?;
    // Drop an optional language tag on the opening line.
    let body = match inner.split_once('\n') {
        Some((tag, rest)) if !tag.trim().starts_with(['{', '[']) => rest,
        _ => inner,
    };
    Some(body.trim())
}

#[async_trait]
impl ExecutableNode for LlmNode {
    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let request = self.request(&input, ctx)?;
        let llm = ctx.llm()?;

        debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "calling llm"
        );

        let response = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(NodeError::Cancelled),
            response = llm.call_llm(request) => response?,
        };

        Ok(parse_completion(&response.content))
    }
}
