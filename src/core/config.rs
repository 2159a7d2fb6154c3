//! Configuration management for bua
//!
//! Supports environment variables, config files, and runtime overrides.
//! The struct is built once at startup and passed by reference to whatever
//! needs it; nothing below the CLI reads the environment.
//!
//! Config file location: ~/.config/bua/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::{BuaError, Result};
use crate::core::types::ActionKind;

/// Main configuration for bua
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Decision service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Browser backend configuration
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Safety policy configuration
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Decision service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the Responses-style API
    pub base_url: String,
    /// API key (never written back to disk when empty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds, doubled per attempt
    pub retry_backoff_ms: u64,
}

/// Which browser backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Local agent-browser session
    #[default]
    Local,
    /// Remote Browserbase session
    Browserbase,
    /// Remote Notte session
    Notte,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Browserbase => "browserbase",
            ProviderKind::Notte => "notte",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = BuaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "local-playwright" | "agent-browser" => Ok(ProviderKind::Local),
            "browserbase" => Ok(ProviderKind::Browserbase),
            "notte" => Ok(ProviderKind::Notte),
            other => Err(BuaError::config(format!("Unknown browser provider: {}", other))),
        }
    }
}

/// Browser backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Backend selection
    pub provider: ProviderKind,
    /// URL opened before the first turn (empty to skip)
    pub start_url: String,
    /// Session name for agent-browser
    pub session_name: String,
    /// Whether to run in headed mode (visible browser)
    pub headed: bool,
    /// Viewport width reported to the decision service
    pub display_width: u32,
    /// Viewport height reported to the decision service
    pub display_height: u32,
    /// Deadline for a single browser primitive in ms
    pub action_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browserbase_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browserbase_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notte_api_key: Option<String>,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on service calls per run; unbounded when unset
    pub max_iterations: Option<usize>,
    /// Whether to show debug output
    pub debug: bool,
    /// Whether to display screenshots as they arrive
    pub show_images: bool,
    /// Pause used by `wait` when the service gives no duration
    pub default_wait_ms: u64,
    /// Longest pause a `wait` may request
    pub max_wait_ms: u64,
}

/// Safety policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Safety check codes accepted without asking
    pub auto_accept_codes: Vec<String>,
    /// Action kinds whose checks are accepted without asking
    pub auto_accept_actions: Vec<ActionKind>,
    /// Domains the browser must never navigate to or land on
    pub blocked_domains: Vec<String>,
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| v == "true" || v == "1")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: env::var("BUA_MODEL").unwrap_or_else(|_| "computer-use-preview".to_string()),
            timeout_secs: 120,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            provider: env::var("BUA_COMPUTER")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),
            start_url: env::var("BUA_START_URL").unwrap_or_else(|_| "https://bing.com".to_string()),
            session_name: env::var("BUA_BROWSER_SESSION").unwrap_or_else(|_| "bua".to_string()),
            headed: env_flag("BUA_BROWSER_HEADED").unwrap_or(false),
            display_width: 1024,
            display_height: 768,
            action_timeout_ms: 30000,
            browserbase_api_key: env::var("BROWSERBASE_API_KEY").ok(),
            browserbase_project_id: env::var("BROWSERBASE_PROJECT_ID").ok(),
            notte_api_key: env::var("NOTTE_API_KEY").ok(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            debug: env_flag("BUA_DEBUG").unwrap_or(false),
            show_images: env_flag("BUA_SHOW_IMAGES").unwrap_or(false),
            default_wait_ms: 1000,
            max_wait_ms: 10000,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            auto_accept_codes: Vec::new(),
            auto_accept_actions: vec![
                ActionKind::Scroll,
                ActionKind::Screenshot,
                ActionKind::Wait,
                ActionKind::Move,
            ],
            blocked_domains: Vec::new(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bua")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(BuaError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| BuaError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text; missing sections take defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BuaError::config(format!("Failed to parse config: {}", e)))
    }

    /// Check the settings a run cannot start without
    pub fn validate(&self) -> Result<()> {
        if self.service.api_key.is_none() {
            return Err(BuaError::config(
                "No decision service API key. Set OPENAI_API_KEY or service.api_key",
            ));
        }
        match self.browser.provider {
            ProviderKind::Browserbase => {
                if self.browser.browserbase_api_key.is_none()
                    || self.browser.browserbase_project_id.is_none()
                {
                    return Err(BuaError::config(
                        "Browserbase needs BROWSERBASE_API_KEY and BROWSERBASE_PROJECT_ID",
                    ));
                }
            }
            ProviderKind::Notte => {
                if self.browser.notte_api_key.is_none() {
                    return Err(BuaError::config("Notte needs NOTTE_API_KEY"));
                }
            }
            ProviderKind::Local => {}
        }
        if self.agent.max_iterations == Some(0) {
            return Err(BuaError::config("agent.max_iterations must be at least 1"));
        }
        Ok(())
    }
}
