//! Configuration for the terminal tutor, loaded from the environment.

use std::env;
use std::time::Duration;
use tracing::Level;

/// Plays a file given as the last argument and exits when done.
pub const DEFAULT_PLAYER_COMMAND: &str = "ffplay -nodisp -autoexit -loglevel quiet";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of a `lingo-gateway`; requests fail as unconfigured without it.
    pub api_base_url: Option<String>,
    pub request_timeout: Option<Duration>,
    pub player_command: Vec<String>,
    pub log_level: Level,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `LINGO_API_BASE_URL`: Where `/api/chat` and `/api/tts` are served.
    // *   `REQUEST_TIMEOUT_SECS`: (Optional) Per-request timeout for both clients.
    // *   `PLAYER_COMMAND`: (Optional) Audio player invocation. Defaults to ffplay.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "WARN" so logs stay out of the conversation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_base_url = env::var(lingo_client::consts::API_BASE_URL)
            .ok()
            .filter(|url| !url.trim().is_empty());

        let request_timeout = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(secs) => Some(Duration::from_secs(secs.trim().parse().map_err(|_| {
                ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), secs.clone())
            })?)),
            Err(_) => None,
        };

        let player_command_str =
            env::var("PLAYER_COMMAND").unwrap_or_else(|_| DEFAULT_PLAYER_COMMAND.to_string());
        let player_command: Vec<String> = player_command_str
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if player_command.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PLAYER_COMMAND".to_string(),
                "must name a program".to_string(),
            ));
        }

        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_base_url,
            request_timeout,
            player_command,
            log_level,
        })
    }

    pub fn client_config(&self, tutor_id: &str) -> lingo_client::Config {
        let mut builder = lingo_client::Config::builder().with_tutor_id(tutor_id);
        if let Some(url) = &self.api_base_url {
            builder = builder.with_base_url(url);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.with_timeout(timeout);
        }
        builder.build()
    }
}
