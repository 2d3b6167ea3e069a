use std::time::Duration;

/// Where the clients send their requests.
///
/// A missing base URL is not an error at construction time: the clients report
/// it as a missing credential on first use, the same way an unset provider
/// key is reported by the gateway.
#[derive(Debug, Clone, Default)]
pub struct Config {
    base_url: Option<String>,
    timeout: Option<Duration>,
    tutor_id: Option<String>,
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        self.config.base_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Sent along with reply requests so the gateway can log which tutor asked.
    pub fn with_tutor_id(mut self, tutor_id: &str) -> Self {
        self.config.tutor_id = Some(tutor_id.to_string());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn tutor_id(&self) -> Option<&str> {
        self.tutor_id.as_deref()
    }

    pub(crate) fn endpoint(&self, path: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{base}{path}"))
    }

    pub(crate) fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
