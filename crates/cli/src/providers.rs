//! Host-side collaborators handed to the engine through
//! `OrchestrationContext`.

use std::path::PathBuf;

use anyhow::{Context, bail};
use async_trait::async_trait;
use nodes::{HttpFetcher, HttpRequest, HttpResponse, LlmCaller, LlmRequest, LlmResponse, ResultCache};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

/// Works with OpenAI and compatible servers (Ollama, vLLM, Groq, OpenRouter).
pub struct OpenAiCaller {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCaller {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmCaller for OpenAiCaller {
    async fn call_llm(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(%url, model = %request.model, "calling chat completions");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("LLM API error ({status}): {detail}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("LLM response was not a chat completion")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("LLM response had no content")?;

        Ok(LlmResponse {
            content,
            usage: parsed.usage,
        })
    }
}

// ---------------------------------------------------------------------------
// Offline echo
// ---------------------------------------------------------------------------

/// Answers every call with the rendered prompt. Used by `--dry-run`.
pub struct EchoLlm;

#[async_trait]
impl LlmCaller for EchoLlm {
    async fn call_llm(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
        Ok(LlmResponse::text(request.prompt))
    }
}

// ---------------------------------------------------------------------------
// HTTP fetch
// ---------------------------------------------------------------------------

pub struct ReqwestFetcher {
    http: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("invalid HTTP method '{}'", request.method))?;

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", request.url))?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            body: response.text().await?,
        })
    }
}

// ---------------------------------------------------------------------------
// On-disk result cache
// ---------------------------------------------------------------------------

/// One JSON file per key inside `dir`.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Keys are usually URLs; anything outside `[A-Za-z0-9_-]` becomes `_`.
    fn path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl ResultCache for FileCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(
                serde_json::from_slice(&bytes)
                    .with_context(|| format!("corrupt cache entry {}", path.display()))?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("cannot create {}", self.dir.display()))?;
        let path = self.path(key);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&value)?)
            .await
            .with_context(|| format!("cannot write {}", path.display()))
    }
}
