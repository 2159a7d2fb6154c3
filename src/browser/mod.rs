//! Browser automation module
//!
//! The [`BrowserExecutor`] trait plus the local and hosted backends.

mod agent_browser;
mod executor;
mod hosted;

use std::sync::Arc;
use url::Url;

use crate::core::{BuaError, Config, ProviderKind, Result};

pub use agent_browser::AgentBrowser;
pub use executor::BrowserExecutor;
pub use hosted::HostedBrowser;

/// Start the backend the configuration selects and open the start URL
pub async fn connect(config: &Config) -> Result<Arc<dyn BrowserExecutor>> {
    let executor: Arc<dyn BrowserExecutor> = match config.browser.provider {
        ProviderKind::Local => {
            let browser = AgentBrowser::from_config(config);
            browser.start().await?;
            Arc::new(browser)
        }
        ProviderKind::Browserbase | ProviderKind::Notte => {
            Arc::new(HostedBrowser::start(config).await?)
        }
    };

    if !config.browser.start_url.trim().is_empty() {
        let url = normalize_url(&config.browser.start_url)?;
        tracing::info!(backend = executor.name(), url = %url, "opening start URL");
        executor.goto(&url).await?;
    }

    Ok(executor)
}

/// Parse a navigation target, prepending `https://` when no scheme is given
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BuaError::browser("URL is empty"));
    }

    let candidate = if trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("about:")
        || trimmed.starts_with("file://")
    {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&candidate)
        .map_err(|e| BuaError::browser(format!("Invalid URL '{}': {}", trimmed, e)))?;
    Ok(parsed.to_string())
}

/// Host part of a URL, lowercased
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}
