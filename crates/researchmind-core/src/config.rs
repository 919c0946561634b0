//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys use a double underscore in the environment
//! (`APP_RETRIEVAL__DENSE_WEIGHT=0.7`). Every setting has a default, so a
//! missing file is a valid configuration.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Builds a configuration from an inline TOML document layered over the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let figment = Figment::new().merge(Toml::string(toml));
        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{key}': {e}")))
    }

    /// Extracts and validates the typed settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub retrieval: RetrievalSettings,
    pub registry: RegistrySettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub web: WebSettings,
    pub pipeline: PipelineSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        if self.registry.capacity == 0 {
            return Err(Error::InvalidConfig("registry.capacity must be at least 1".into()));
        }
        if self.embedding.fake_dimension == 0 || self.embedding.max_len == 0 || self.embedding.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding sizes must be at least 1".into()));
        }
        self.pipeline.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self { Self { data_dir: "~/.researchmind".to_string() } }
}

impl StorageSettings {
    pub fn data_dir_path(&self) -> PathBuf { expand_path(&self.data_dir) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub dense_weight: f32,
    pub lexical_weight: f32,
    /// Candidates taken per signal before fusion; unset means "k".
    pub candidate_window: Option<usize>,
    pub document_top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { dense_weight: 0.6, lexical_weight: 0.4, candidate_window: None, document_top_k: 5 }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        let (d, l) = (self.dense_weight, self.lexical_weight);
        if !d.is_finite() || !l.is_finite() || d < 0.0 || l < 0.0 {
            return Err(Error::InvalidConfig(format!("fusion weights must be non-negative, got {d} / {l}")));
        }
        if d + l > 1.0 + f32::EPSILON {
            return Err(Error::InvalidConfig(format!("fusion weights must sum to at most 1, got {}", d + l)));
        }
        if self.candidate_window == Some(0) {
            return Err(Error::InvalidConfig("retrieval.candidate_window must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub capacity: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self { Self { capacity: 64 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub fake_dimension: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, use_fake: false, fake_dimension: 384, max_len: 256, batch_size: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Base URL of an OpenAI-compatible API (`/chat/completions` is appended).
    pub endpoint: String,
    pub model: String,
    pub synthesis_model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            synthesis_model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub endpoint: String,
    pub api_key_env: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com".to_string(),
            api_key_env: "TAVILY_API_KEY".to_string(),
            max_results: 4,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_sources: usize,
    pub min_content_chars: usize,
    pub max_claims: usize,
    pub workers: usize,
    pub event_delay_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_sources: 7,
            min_content_chars: 50,
            max_claims: 5,
            workers: 4,
            event_delay_ms: 50,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_sources == 0 || self.max_claims == 0 || self.workers == 0 {
            return Err(Error::InvalidConfig("pipeline caps and worker count must be at least 1".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
