use crate::config::Config;
use anyhow::Context;
use secrecy::SecretString;

/// Shared by every request handler.
pub struct AppState {
    pub http: reqwest::Client,
    pub openai: OpenAiSettings,
    pub eleven_labs: ElevenLabsSettings,
}

pub struct OpenAiSettings {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

pub struct ElevenLabsSettings {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub voice_id: String,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build the upstream HTTP client")?;

        Ok(Self {
            http,
            openai: OpenAiSettings {
                api_key: config.openai_api_key.clone(),
                base_url: config.openai_base_url.trim_end_matches('/').to_string(),
                model: config.chat_model.clone(),
            },
            eleven_labs: ElevenLabsSettings {
                api_key: config.eleven_labs_api_key.clone(),
                base_url: config.eleven_labs_base_url.trim_end_matches('/').to_string(),
                voice_id: config.voice_id.clone(),
            },
        })
    }
}
