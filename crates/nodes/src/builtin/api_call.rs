//! `api_call` — one request through the HTTP collaborator.
//!
//! Config keys: `url` (required), `method` (default `GET`), `headers`
//! (object of string templates), `body` (JSON template). URL and header
//! placeholders render strings raw; body placeholders keep JSON types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::template::{RenderStyle, Template, render_value};
use crate::{ExecutableNode, ExecutionContext, HttpRequest, NodeDefinition, NodeError};

pub struct ApiCallNode {
    method: String,
    url: Template,
    headers: Vec<(String, Template)>,
    body: Option<Value>,
}

impl ApiCallNode {
    pub fn from_definition(def: &NodeDefinition) -> Result<Self, NodeError> {
        let invalid = |msg: &str| NodeError::InvalidConfig(format!("api_call node '{}': {msg}", def.id));

        let url = def.config_str("url").ok_or_else(|| invalid("missing `url`"))?;

        let headers: Vec<(String, Template)> = match def.config_value("headers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| match value {
                    Value::String(v) => Ok((name.clone(), Template::parse(v))),
                    _ => Err(invalid("header values must be strings")),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid("`headers` must be an object")),
        };

        Ok(Self {
            method: def
                .config_str("method")
                .unwrap_or("GET")
                .to_ascii_uppercase(),
            url: Template::parse(url),
            headers,
            body: def.config_value("body").filter(|b| !b.is_null()).cloned(),
        })
    }

    fn request(&self, input: &Value) -> HttpRequest {
        let headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .map(|(name, t)| (name.clone(), t.render(input, RenderStyle::Plain)))
            .collect();

        HttpRequest {
            method: self.method.clone(),
            url: self.url.render(input, RenderStyle::Plain),
            headers,
            body: self.body.as_ref().map(|b| render_value(b, input)),
        }
    }
}

#[async_trait]
impl ExecutableNode for ApiCallNode {
    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let request = self.request(&input);
        let http = ctx.http()?;

        debug!(method = %request.method, url = %request.url, "api call");

        let response = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => return Err(NodeError::Cancelled),
            response = http.fetch(request) => response?,
        };

        if !response.is_success() {
            return Err(NodeError::HttpError {
                status: response.status,
            });
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body)
            .map_err(|e| NodeError::InvalidResponse(format!("body is not JSON: {e}")))
    }
}
