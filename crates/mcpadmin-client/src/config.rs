//! Client configuration

use anyhow::{anyhow, Context as _, Result};
use mcpadmin_core::Secret;
use std::time::Duration;
use url::Url;

/// Environment variable holding the admin API base URL
pub const ENV_BASE_URL: &str = "MCPADMIN_BASE_URL";
/// Environment variable holding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "MCPADMIN_TIMEOUT_SECS";
/// Environment variable holding the bearer token for the admin API
pub const ENV_API_TOKEN: &str = "MCPADMIN_API_TOKEN";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the remote admin service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL the endpoint paths are appended to, e.g. `https://chat.example/api/admin/mcp`
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
    pub bearer_token: Option<Secret>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("McpAdmin/{}", env!("CARGO_PKG_VERSION")),
            bearer_token: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(Secret::new(token));
        self
    }

    /// Load from the environment, reading a `.env` file first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base_url = std::env::var(ENV_BASE_URL)
            .with_context(|| format!("{} is not set", ENV_BASE_URL))?;
        let mut config = Self::new(&base_url)?;

        if let Ok(raw) = std::env::var(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.trim().is_empty() {
                config.bearer_token = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Join a relative endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid endpoint path '{}'", path))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("Invalid base URL '{}'", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("Base URL must use http or https: {}", raw));
    }
    // Url::join replaces the last segment unless the path ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
