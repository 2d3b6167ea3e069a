use secrecy::SecretString;
use std::net::SocketAddr;
use tracing::Level;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ELEVEN_LABS_BASE_URL: &str = "https://api.elevenlabs.io";
/// "Rachel", a stock Eleven Labs voice.
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// Provider keys are optional here: a missing key is reported per request,
/// so the gateway can start and answer `/health` without them.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: String,
    pub chat_model: String,
    pub eleven_labs_api_key: Option<SecretString>,
    pub eleven_labs_base_url: String,
    pub voice_id: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables (and `.env`, if present).
    ///
    /// *   `BIND_ADDRESS`: Defaults to "0.0.0.0:3000".
    /// *   `OPENAI_API_KEY`: Needed by `/api/chat`.
    /// *   `OPENAI_BASE_URL`: (Optional) Defaults to the public OpenAI API.
    /// *   `CHAT_MODEL`: (Optional) Defaults to "gpt-4o".
    /// *   `ELEVEN_LABS_API_KEY`: Needed by `/api/tts`.
    /// *   `ELEVEN_LABS_BASE_URL`: (Optional) Defaults to the public Eleven Labs API.
    /// *   `ELEVEN_LABS_VOICE_ID`: (Optional) Defaults to "Rachel".
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key: secret_var("OPENAI_API_KEY"),
            openai_base_url: var_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            chat_model: var_or("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            eleven_labs_api_key: secret_var("ELEVEN_LABS_API_KEY"),
            eleven_labs_base_url: var_or("ELEVEN_LABS_BASE_URL", DEFAULT_ELEVEN_LABS_BASE_URL),
            voice_id: var_or("ELEVEN_LABS_VOICE_ID", DEFAULT_VOICE_ID),
            log_level,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank variables both count as missing.
fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}
