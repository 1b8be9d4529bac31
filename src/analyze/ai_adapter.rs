//! Structured-output model adapter: provider abstraction returning JSON that
//! matches a caller-supplied schema.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ai::AiConfig;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Named JSON schema the model response must follow.
#[derive(Debug, Clone)]
pub struct ResponseShape {
    pub name: &'static str,
    pub schema: Value,
}

#[async_trait]
pub trait StructuredModel: Send + Sync {
    /// One request; returns the parsed JSON object the model produced.
    async fn request(&self, system: &str, user: &str, shape: &ResponseShape) -> Result<Value>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynModel = Arc<dyn StructuredModel>;

/// `request` plus deserialization; a shape mismatch is an error.
pub async fn request_typed<T: DeserializeOwned>(
    model: &dyn StructuredModel,
    system: &str,
    user: &str,
    shape: &ResponseShape,
) -> Result<T> {
    let value = model.request(system, user, shape).await?;
    serde_json::from_value(value)
        .with_context(|| format!("{} response does not match `{}`", model.provider_name(), shape.name))
}

/// Factory used at startup.
///
/// * `AI_TEST_MODE=mock` gives a mock returning an empty article list.
/// * `enabled == false` or an unknown provider gives a disabled model.
pub fn build_model(cfg: &AiConfig) -> Result<DynModel> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockModel::new(json!({ "articles": [] }))));
    }
    if !cfg.enabled {
        return Ok(Arc::new(DisabledModel));
    }
    match cfg.provider.as_str() {
        "openai" => {
            let mut model = OpenAiModel::new(
                &cfg.api_key,
                &cfg.model,
                Duration::from_secs(cfg.timeout_secs),
            )?;
            if let Some(endpoint) = cfg.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
                model = model.with_endpoint(endpoint.trim());
            }
            Ok(Arc::new(model))
        }
        other => {
            tracing::warn!(target: "ai", provider = other, "unsupported provider, model disabled");
            Ok(Arc::new(DisabledModel))
        }
    }
}

// ------------------------------------------------------------
// OpenAI chat completions with `json_schema` response format
// ------------------------------------------------------------

pub struct OpenAiModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiModel {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("OpenAI api key is empty");
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("tax-news-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        })
    }

    /// Point at a compatible endpoint (proxy, local gateway).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: Value,
}

#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[async_trait]
impl StructuredModel for OpenAiModel {
    async fn request(&self, system: &str, user: &str, shape: &ResponseShape) -> Result<Value> {
        let req = ChatReq {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: json!({
                "type": "json_schema",
                "json_schema": { "name": shape.name, "strict": true, "schema": shape.schema },
            }),
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("openai returned {status}: {}", body.chars().take(300).collect::<String>());
        }
        let body: ChatResp = resp.json().await.context("decode openai response")?;
        let msg = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow!("openai response has no choices"))?;
        if let Some(refusal) = msg.refusal.filter(|r| !r.is_empty()) {
            bail!("model refused: {refusal}");
        }
        let content = msg.content.unwrap_or_default();
        serde_json::from_str(&content).context("model content is not JSON")
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled + mock
// ------------------------------------------------------------

/// Always errors; used when AI is turned off.
pub struct DisabledModel;

#[async_trait]
impl StructuredModel for DisabledModel {
    async fn request(&self, _system: &str, _user: &str, _shape: &ResponseShape) -> Result<Value> {
        bail!("model provider is disabled")
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns a fixed value and remembers the user prompts it was given.
pub struct MockModel {
    fixed: Value,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    pub fn new(fixed: Value) -> Self {
        Self {
            fixed,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("poisoned prompts").clone()
    }
}

#[async_trait]
impl StructuredModel for MockModel {
    async fn request(&self, _system: &str, user: &str, _shape: &ResponseShape) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("poisoned prompts")
            .push(user.to_string());
        Ok(self.fixed.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
