use anyhow::{Context, Result};
use lingo_gateway::AppState;
use lingo_gateway::config::Config;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load gateway configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; /api/chat will answer with a configuration error");
    }
    if config.eleven_labs_api_key.is_none() {
        tracing::warn!("ELEVEN_LABS_API_KEY is not set; /api/tts will answer with a configuration error");
    }

    let app = lingo_gateway::app(AppState::from_config(&config)?);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!("Gateway listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
