use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use researchmind_core::config::GenerationSettings;
use researchmind_core::traits::TextGenerator;
use researchmind_core::{Error, GenerationParams, Result};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Text generation over any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatibleGenerator {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self { client, endpoint, model: model.into(), api_key: api_key.into() })
    }

    /// Stage generator from settings; the key is read from `api_key_env`.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::for_model(settings, &settings.model)
    }

    /// Same endpoint and key, but with the synthesis model.
    pub fn synthesis_from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::for_model(settings, &settings.synthesis_model)
    }

    fn for_model(settings: &GenerationSettings, model: &str) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .map_err(|_| Error::InvalidConfig(format!("API key not found. Set {} environment variable", settings.api_key_env)))?;
        Self::new(&settings.endpoint, model, api_key, Duration::from_secs(settings.timeout_secs))
    }

    pub fn model(&self) -> &str { &self.model }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            warn!(status = status.as_u16(), model = %self.model, "generation request rejected");
            return Err(Error::Generation(format!("API error ({}): {message}", status.as_u16())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("unreadable response: {e}")))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Generation("response contained no choices".into()))?;
        debug!(model = %self.model, chars = text.len(), "generation finished");
        Ok(text.trim().to_string())
    }
}
