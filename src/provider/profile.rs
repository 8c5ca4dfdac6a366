//! Provider profile: which endpoint and model the planner and generator talk to.

use super::{CompletionOptions, ModelProviderClient, OpenAICompatibleClient};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    Ollama,
    LocalCustom,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::Ollama => "ollama",
            ProviderType::LocalCustom => "local_custom",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderType::OpenAI)
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("https://api.openai.com/v1"),
            ProviderType::Ollama => Some("http://localhost:11434/v1"),
            ProviderType::LocalCustom => None,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API (`.../v1`)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub default_options: CompletionOptions,
}

fn default_provider_type() -> ProviderType {
    ProviderType::OpenAI
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            model: default_model(),
            api_key: None,
            endpoint: None,
            default_options: CompletionOptions::default(),
        }
    }
}

impl ProviderConfig {
    /// The API key, when one is set and not blank.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn base_url(&self) -> Option<String> {
        self.endpoint
            .as_deref()
            .or_else(|| self.provider_type.default_endpoint())
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn completions_url(&self) -> Option<String> {
        self.base_url().map(|base| format!("{}/chat/completions", base))
    }

    /// Whether the provider can be called: model set, API key present when
    /// required, endpoint known.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }
        if self.provider_type.requires_api_key() && self.effective_api_key().is_none() {
            return Err(format!(
                "Provider '{}' requires an API key (set OPENAI_API_KEY or provider.api_key)",
                self.provider_type.as_str()
            ));
        }
        match self.base_url() {
            None => Err(format!(
                "Provider '{}' requires an endpoint",
                self.provider_type.as_str()
            )),
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => Err(
                format!("Endpoint must be an http(s) URL, got '{}'", url),
            ),
            Some(_) => Ok(()),
        }
    }

    pub fn create_client(&self) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        self.validate().map_err(ApiError::ProviderNotConfigured)?;
        let url = self
            .completions_url()
            .ok_or_else(|| ApiError::ProviderNotConfigured("missing endpoint".to_string()))?;
        let client = OpenAICompatibleClient::new(
            self.provider_type.as_str(),
            self.model.clone(),
            self.effective_api_key().map(str::to_string),
            url,
        )?;
        Ok(Arc::new(client))
    }
}
