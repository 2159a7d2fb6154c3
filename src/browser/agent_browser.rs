//! Local browser backend - wraps the agent-browser CLI
//!
//! Each primitive is one or more agent-browser invocations against a named
//! session. Hosted providers reuse this backend by pointing it at a remote
//! CDP endpoint.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;

use crate::browser::executor::BrowserExecutor;
use crate::core::{BuaError, Config, MouseButton, Point, Result, Screenshot};

/// Executor for browser automation via agent-browser CLI
pub struct AgentBrowser {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
    /// Remote CDP endpoint, when driving a hosted browser
    cdp_endpoint: Option<String>,
    /// Viewport size
    dimensions: (u32, u32),
    /// Counter for screenshot file names
    captures: AtomicU64,
}

impl AgentBrowser {
    /// Create a new local executor
    pub fn new(session_name: impl Into<String>, dimensions: (u32, u32)) -> Self {
        Self {
            session_name: session_name.into(),
            headed: false,
            cdp_endpoint: None,
            dimensions,
            captures: AtomicU64::new(0),
        }
    }

    /// Create an executor from the browser section of the configuration
    pub fn from_config(config: &Config) -> Self {
        let mut browser = Self::new(
            config.browser.session_name.clone(),
            (config.browser.display_width, config.browser.display_height),
        );
        browser.set_headed(config.browser.headed);
        browser
    }

    /// Set headed mode
    pub fn set_headed(&mut self, headed: bool) {
        self.headed = headed;
    }

    /// Drive a remote browser over CDP instead of launching one
    pub fn with_cdp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.cdp_endpoint = Some(endpoint.into());
        self
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Prepare the session: size the viewport
    pub async fn start(&self) -> Result<()> {
        if !Self::is_available().await {
            return Err(BuaError::AgentBrowserNotFound);
        }
        let (width, height) = self.dimensions;
        self.run_command(&["set", "viewport", &width.to_string(), &height.to_string()])
            .await?;
        tracing::debug!(session = %self.session_name, width, height, "agent-browser session ready");
        Ok(())
    }

    /// Build the argument list for one invocation
    fn command_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = vec!["--session", self.session_name.as_str()];
        if let Some(endpoint) = &self.cdp_endpoint {
            full.push("--cdp");
            full.push(endpoint.as_str());
        } else if self.headed {
            full.push("--headed");
        }
        full.extend_from_slice(args);
        full
    }

    /// Run an agent-browser command
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("agent-browser");
        cmd.args(self.command_args(args));
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BuaError::AgentBrowserNotFound
            } else {
                BuaError::browser(format!("Failed to run agent-browser: {}", e))
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BuaError::browser(format!(
                "agent-browser {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )))
        }
    }

    async fn mouse_move(&self, at: Point) -> Result<()> {
        self.run_command(&["mouse", "move", &at.x.to_string(), &at.y.to_string()])
            .await
            .map(|_| ())
    }

    async fn mouse_button(&self, action: &str, button: MouseButton) -> Result<()> {
        self.run_command(&["mouse", action, button.as_str()])
            .await
            .map(|_| ())
    }

    fn capture_path(&self) -> PathBuf {
        let n = self.captures.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("bua-{}-{}.png", self.session_name, n))
    }
}

#[async_trait]
impl BrowserExecutor for AgentBrowser {
    fn name(&self) -> &str {
        if self.cdp_endpoint.is_some() {
            "agent-browser (cdp)"
        } else {
            "agent-browser"
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    async fn screenshot(&self) -> Result<Screenshot> {
        let path = self.capture_path();
        let path_str = path.to_string_lossy().into_owned();
        self.run_command(&["screenshot", &path_str]).await?;

        let bytes = tokio::fs::read(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;
        Ok(Screenshot::from_png(&bytes))
    }

    async fn current_url(&self) -> Result<String> {
        self.run_command(&["get", "url"])
            .await
            .map(|s| s.trim().to_string())
    }

    async fn click(&self, at: Point, button: MouseButton) -> Result<()> {
        self.mouse_move(at).await?;
        self.mouse_button("down", button).await?;
        self.mouse_button("up", button).await
    }

    async fn double_click(&self, at: Point) -> Result<()> {
        self.mouse_move(at).await?;
        for _ in 0..2 {
            self.mouse_button("down", MouseButton::Left).await?;
            self.mouse_button("up", MouseButton::Left).await?;
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.run_command(&["keyboard", "type", text]).await.map(|_| ())
    }

    async fn press(&self, keys: &[String]) -> Result<()> {
        let chord = keys.join("+");
        self.run_command(&["press", &chord]).await.map(|_| ())
    }

    async fn scroll(&self, at: Option<Point>, dx: i64, dy: i64) -> Result<()> {
        if let Some(at) = at {
            self.mouse_move(at).await?;
        }
        self.run_command(&["mouse", "wheel", &dy.to_string(), &dx.to_string()])
            .await
            .map(|_| ())
    }

    async fn drag(&self, path: &[Point]) -> Result<()> {
        let Some((first, rest)) = path.split_first() else {
            return Err(BuaError::browser("Drag path is empty"));
        };
        self.mouse_move(*first).await?;
        self.mouse_button("down", MouseButton::Left).await?;
        for point in rest {
            self.mouse_move(*point).await?;
        }
        self.mouse_button("up", MouseButton::Left).await
    }

    async fn move_to(&self, at: Point) -> Result<()> {
        self.mouse_move(at).await
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url]).await.map(|_| ())
    }

    async fn back(&self) -> Result<()> {
        self.run_command(&["back"]).await.map(|_| ())
    }

    async fn forward(&self) -> Result<()> {
        self.run_command(&["forward"]).await.map(|_| ())
    }

    async fn reload(&self) -> Result<()> {
        self.run_command(&["reload"]).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        self.run_command(&["close"]).await.map(|_| ())
    }
}
