//! Hosted browser providers
//!
//! Browserbase and Notte both hand out remote Chromium sessions reachable over
//! CDP. We create the session over HTTP, then drive it with the local
//! agent-browser backend pointed at the remote endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::browser::agent_browser::AgentBrowser;
use crate::browser::executor::BrowserExecutor;
use crate::core::{BuaError, Config, MouseButton, Point, ProviderKind, Result, Screenshot};

const BROWSERBASE_API: &str = "https://api.browserbase.com/v1";
const NOTTE_API: &str = "https://api.notte.cc";

/// Credentials and endpoint for one provider
#[derive(Debug, Clone)]
enum ProviderAccount {
    Browserbase { api_key: String, project_id: String },
    Notte { api_key: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowserbaseSession {
    id: String,
    connect_url: String,
}

#[derive(Debug, Deserialize)]
struct NotteSession {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct NotteDebugInfo {
    ws_url: String,
}

/// A remote browser session driven over CDP
pub struct HostedBrowser {
    inner: AgentBrowser,
    account: ProviderAccount,
    api_base: String,
    session_id: String,
    client: Client,
}

impl HostedBrowser {
    /// Start a remote session for the configured provider
    pub async fn start(config: &Config) -> Result<Self> {
        let account = match config.browser.provider {
            ProviderKind::Browserbase => ProviderAccount::Browserbase {
                api_key: required(&config.browser.browserbase_api_key, "BROWSERBASE_API_KEY")?,
                project_id: required(
                    &config.browser.browserbase_project_id,
                    "BROWSERBASE_PROJECT_ID",
                )?,
            },
            ProviderKind::Notte => ProviderAccount::Notte {
                api_key: required(&config.browser.notte_api_key, "NOTTE_API_KEY")?,
            },
            ProviderKind::Local => {
                return Err(BuaError::config("Local provider is not a hosted browser"))
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_millis(config.browser.action_timeout_ms.max(60_000)))
            .build()
            .map_err(|e| BuaError::config(format!("Failed to create HTTP client: {}", e)))?;

        let dimensions = (config.browser.display_width, config.browser.display_height);
        let (api_base, session_id, endpoint) = match &account {
            ProviderAccount::Browserbase { api_key, project_id } => {
                let (id, endpoint) = create_browserbase_session(
                    &client,
                    BROWSERBASE_API,
                    api_key,
                    project_id,
                    dimensions,
                )
                .await?;
                (BROWSERBASE_API, id, endpoint)
            }
            ProviderAccount::Notte { api_key } => {
                let (id, endpoint) = create_notte_session(&client, NOTTE_API, api_key).await?;
                (NOTTE_API, id, endpoint)
            }
        };
        tracing::info!(provider = %config.browser.provider, session = %session_id, "remote browser session started");

        let inner = AgentBrowser::new(format!("bua-{}", session_id), dimensions)
            .with_cdp_endpoint(endpoint);

        Ok(Self {
            inner,
            account,
            api_base: api_base.to_string(),
            session_id,
            client,
        })
    }

    /// Ask the provider to release the session
    async fn release(&self) -> Result<()> {
        let response = match &self.account {
            ProviderAccount::Browserbase { api_key, project_id } => {
                self.client
                    .post(format!("{}/sessions/{}", self.api_base, self.session_id))
                    .header("X-BB-API-Key", api_key)
                    .json(&json!({ "projectId": project_id, "status": "REQUEST_RELEASE" }))
                    .send()
                    .await?
            }
            ProviderAccount::Notte { api_key } => {
                stop_notte_session(&self.client, &self.api_base, api_key, &self.session_id).await?
            }
        };

        if !response.status().is_success() {
            return Err(BuaError::browser(format!(
                "Failed to release session {}: {}",
                self.session_id,
                response.status()
            )));
        }

        if matches!(self.account, ProviderAccount::Notte { .. }) {
            tracing::info!(
                "Session completed. View replay at https://notte.com/sessions/{}",
                self.session_id
            );
        }
        Ok(())
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BuaError::config(format!("{} is not set", name)))
}

async fn create_browserbase_session(
    client: &Client,
    api_base: &str,
    api_key: &str,
    project_id: &str,
    (width, height): (u32, u32),
) -> Result<(String, String)> {
    let response = client
        .post(format!("{}/sessions", api_base))
        .header("X-BB-API-Key", api_key)
        .json(&json!({
            "projectId": project_id,
            "browserSettings": { "viewport": { "width": width, "height": height } }
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(BuaError::browser(format!(
            "Browserbase session creation failed ({}): {}",
            status, text
        )));
    }

    let session: BrowserbaseSession = response.json().await?;
    Ok((session.id, session.connect_url))
}

async fn create_notte_session(
    client: &Client,
    api_base: &str,
    api_key: &str,
) -> Result<(String, String)> {
    let response = client
        .post(format!("{}/sessions/start", api_base))
        .bearer_auth(api_key)
        .json(&json!({ "proxies": false }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(BuaError::browser(format!(
            "Notte session creation failed ({}): {}",
            status, text
        )));
    }

    let session: NotteSession = response.json().await?;
    match notte_debug_url(client, api_base, api_key, &session.session_id).await {
        Ok(ws_url) => Ok((session.session_id, ws_url)),
        Err(e) => {
            // The session is already running remotely; stop it before giving up.
            match stop_notte_session(client, api_base, api_key, &session.session_id).await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::warn!(session = %session.session_id, status = %response.status(), "failed to stop Notte session")
                }
                Err(stop_err) => {
                    tracing::warn!(session = %session.session_id, error = %stop_err, "failed to stop Notte session")
                }
            }
            Err(e)
        }
    }
}

async fn notte_debug_url(
    client: &Client,
    api_base: &str,
    api_key: &str,
    session_id: &str,
) -> Result<String> {
    let debug: NotteDebugInfo = client
        .get(format!("{}/sessions/{}/debug", api_base, session_id))
        .bearer_auth(api_key)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(debug.ws_url)
}

async fn stop_notte_session(
    client: &Client,
    api_base: &str,
    api_key: &str,
    session_id: &str,
) -> Result<reqwest::Response> {
    Ok(client
        .delete(format!("{}/sessions/{}/stop", api_base, session_id))
        .bearer_auth(api_key)
        .send()
        .await?)
}

#[async_trait]
impl BrowserExecutor for HostedBrowser {
    fn name(&self) -> &str {
        match self.account {
            ProviderAccount::Browserbase { .. } => "browserbase",
            ProviderAccount::Notte { .. } => "notte",
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    async fn screenshot(&self) -> Result<Screenshot> {
        self.inner.screenshot().await
    }

    async fn current_url(&self) -> Result<String> {
        self.inner.current_url().await
    }

    async fn click(&self, at: Point, button: MouseButton) -> Result<()> {
        self.inner.click(at, button).await
    }

    async fn double_click(&self, at: Point) -> Result<()> {
        self.inner.double_click(at).await
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.inner.type_text(text).await
    }

    async fn press(&self, keys: &[String]) -> Result<()> {
        self.inner.press(keys).await
    }

    async fn scroll(&self, at: Option<Point>, dx: i64, dy: i64) -> Result<()> {
        self.inner.scroll(at, dx, dy).await
    }

    async fn drag(&self, path: &[Point]) -> Result<()> {
        self.inner.drag(path).await
    }

    async fn move_to(&self, at: Point) -> Result<()> {
        self.inner.move_to(at).await
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.inner.goto(url).await
    }

    async fn back(&self) -> Result<()> {
        self.inner.back().await
    }

    async fn forward(&self) -> Result<()> {
        self.inner.forward().await
    }

    async fn reload(&self) -> Result<()> {
        self.inner.reload().await
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.inner.close().await {
            tracing::warn!(error = %e, "failed to detach from remote browser");
        }
        self.release().await
    }
}
