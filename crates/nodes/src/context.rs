//! Execution context and the external collaborators it carries.
//!
//! The engine is agnostic to how LLM calls, HTTP requests, and caching are
//! performed: hosts plug implementations of [`LlmCaller`], [`HttpFetcher`],
//! and [`ResultCache`] into an [`OrchestrationContext`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::NodeError;
use crate::transforms::TransformRegistry;

// ---------------------------------------------------------------------------
// LLM collaborator
// ---------------------------------------------------------------------------

/// A single completion request issued by an `llm` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Raw completion text plus optional provider usage data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl LlmResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Hosted or on-device model backend.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    async fn call_llm(&self, request: LlmRequest) -> anyhow::Result<LlmResponse>;
}

/// Defaults applied to `llm` nodes that leave a parameter unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single request/response exchange for `api_call` nodes.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> anyhow::Result<HttpResponse>;
}

// ---------------------------------------------------------------------------
// Persistence collaborator
// ---------------------------------------------------------------------------

/// Key-lookup store for prior analysis results (e.g. keyed by profile URL).
///
/// Consumed by host applications; the engine never reads it on its own.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()>;
}

/// Process-local [`ResultCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OrchestrationContext
// ---------------------------------------------------------------------------

/// Host-supplied collaborators shared by every node of an execution.
///
/// Cheap to clone; each `Engine::execute_workflow` call takes its own copy.
#[derive(Clone, Default)]
pub struct OrchestrationContext {
    pub llm: Option<Arc<dyn LlmCaller>>,
    pub http: Option<Arc<dyn HttpFetcher>>,
    pub cache: Option<Arc<dyn ResultCache>>,
    pub llm_defaults: LlmDefaults,
    /// Free-form host data recorded alongside each execution.
    pub metadata: Map<String, Value>,
    pub cancellation: CancellationToken,
}

impl OrchestrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmCaller>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpFetcher>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_llm_defaults(mut self, defaults: LlmDefaults) -> Self {
        self.llm_defaults = defaults;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

impl fmt::Debug for OrchestrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationContext")
            .field("llm", &self.llm.is_some())
            .field("http", &self.http.is_some())
            .field("cache", &self.cache.is_some())
            .field("llm_defaults", &self.llm_defaults)
            .field("metadata", &self.metadata)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Context passed to every node during one workflow execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// Name the workflow was registered under.
    pub workflow_name: String,
    /// Transforms resolvable by `transform` nodes.
    pub transforms: Arc<TransformRegistry>,
    pub services: OrchestrationContext,
}

impl ExecutionContext {
    pub fn new(
        workflow_name: impl Into<String>,
        services: OrchestrationContext,
        transforms: Arc<TransformRegistry>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            workflow_name: workflow_name.into(),
            transforms,
            services,
        }
    }

    /// A context with the built-in transforms and the given collaborators.
    pub fn with_builtins(workflow_name: impl Into<String>, services: OrchestrationContext) -> Self {
        Self::new(
            workflow_name,
            services,
            Arc::new(TransformRegistry::with_builtins()),
        )
    }

    pub fn llm(&self) -> Result<&Arc<dyn LlmCaller>, NodeError> {
        self.services
            .llm
            .as_ref()
            .ok_or(NodeError::MissingCollaborator("llm"))
    }

    pub fn http(&self) -> Result<&Arc<dyn HttpFetcher>, NodeError> {
        self.services
            .http
            .as_ref()
            .ok_or(NodeError::MissingCollaborator("http"))
    }

    pub fn llm_defaults(&self) -> &LlmDefaults {
        &self.services.llm_defaults
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.services.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.services.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn llm_defaults_match_documented_values() {
        let defaults = LlmDefaults::default();
        assert_eq!(defaults.temperature, 0.3);
        assert_eq!(defaults.max_tokens, 1000);
    }

    #[test]
    fn partial_defaults_fill_missing_fields() {
        let defaults: LlmDefaults = serde_json::from_value(json!({ "model": "local" })).unwrap();
        assert_eq!(defaults.model, "local");
        assert_eq!(defaults.max_tokens, 1000);
    }

    #[test]
    fn missing_collaborators_are_reported() {
        let ctx = ExecutionContext::with_builtins("wf", OrchestrationContext::new());
        assert!(matches!(ctx.llm(), Err(NodeError::MissingCollaborator("llm"))));
        assert!(matches!(ctx.http(), Err(NodeError::MissingCollaborator("http"))));
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = MemoryCache::new();
        assert!(cache.get("https://example.com/in/jane").await.unwrap().is_none());

        cache
            .put("https://example.com/in/jane", json!({ "icebreakers": [] }))
            .await
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("https://example.com/in/jane").await.unwrap(),
            Some(json!({ "icebreakers": [] }))
        );
    }
}
