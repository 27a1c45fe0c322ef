use crate::error::GenerationError;
use crate::prompts::PromptTemplate;
use crate::traits::TextGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GeneratorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 1_024,
        }
    }
}

/// Generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: Url,
    config: GeneratorConfig,
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: GeneratorConfig) -> Result<Self, GenerationError> {
        if config.api_key.trim().is_empty() {
            return Err(GenerationError::Unavailable("api key is empty".to_string()));
        }

        let endpoint = completions_endpoint(&config.base_url)?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn completions_endpoint(base_url: &str) -> Result<Url, GenerationError> {
    let mut base = Url::parse(base_url.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("v1/chat/completions")?)
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        template: &PromptTemplate,
        values: &[(&str, &str)],
    ) -> Result<String, GenerationError> {
        let prompt = template.render(values);
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        debug!(
            endpoint = %self.endpoint,
            template = template.name,
            prompt_chars = prompt.len(),
            "chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = describe_body(response.text().await);
            return Err(GenerationError::BackendResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Value = response.json().await?;
        extract_content(&parsed)
    }
}

fn describe_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|error| format!("<unreadable response body: {error}>"))
}

fn extract_content(payload: &Value) -> Result<String, GenerationError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}
