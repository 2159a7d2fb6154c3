//! Action dispatcher
//!
//! Turns an [`ActionItem`] into a validated [`BrowserCommand`], runs it
//! against a [`BrowserExecutor`], and re-observes the page. Failures never
//! escape as errors: they come back as [`ExecutionOutcome::Failed`] so the
//! decision service can adapt.

use std::future::Future;
use std::time::Duration;

use crate::browser::{normalize_url, BrowserExecutor};
use crate::core::{
    ActionItem, ActionKind, BrowserCommand, Config, ExecutionOutcome, MouseButton, Observation,
    Point, Result,
};

/// Timing limits applied while dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Deadline for a single browser primitive
    pub action_timeout: Duration,
    /// Pause used by `wait` without an explicit duration
    pub default_wait: Duration,
    /// Upper bound for any `wait`
    pub max_wait: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
            default_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            action_timeout: Duration::from_millis(config.browser.action_timeout_ms),
            default_wait: Duration::from_millis(config.agent.default_wait_ms),
            max_wait: Duration::from_millis(config.agent.max_wait_ms),
        }
    }
}

/// Stateless mapper from actions to browser primitives
#[derive(Debug, Clone, Default)]
pub struct ActionDispatcher {
    settings: DispatchSettings,
}

impl ActionDispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self { settings }
    }

    /// Check required parameters and build the typed command
    pub fn validate(&self, action: &ActionItem) -> std::result::Result<BrowserCommand, String> {
        let command = match action.kind {
            ActionKind::Click => {
                let button = match action.arguments.get("button") {
                    None | Some(serde_json::Value::Null) => MouseButton::default(),
                    Some(value) => value
                        .as_str()
                        .and_then(MouseButton::parse)
                        .ok_or_else(|| format!("click has an unknown button: {}", value))?,
                };
                BrowserCommand::Click {
                    at: required_point(action, "click")?,
                    button,
                }
            }
            ActionKind::DoubleClick => BrowserCommand::DoubleClick {
                at: required_point(action, "double_click")?,
            },
            ActionKind::Drag => BrowserCommand::Drag {
                path: drag_path(action)?,
            },
            ActionKind::KeyPress => BrowserCommand::KeyPress {
                keys: key_sequence(action)?,
            },
            ActionKind::Move => BrowserCommand::Move {
                to: required_point(action, "move")?,
            },
            ActionKind::Screenshot => BrowserCommand::Screenshot,
            ActionKind::Scroll => {
                let dx = optional_i64(action, "scroll_x")?;
                let dy = optional_i64(action, "scroll_y")?;
                if dx.is_none() && dy.is_none() {
                    return Err("scroll requires scroll_x or scroll_y".to_string());
                }
                let at = match (optional_i64(action, "x")?, optional_i64(action, "y")?) {
                    (Some(x), Some(y)) => Some(Point::new(x, y)),
                    (None, None) => None,
                    _ => return Err("scroll position needs both x and y".to_string()),
                };
                BrowserCommand::Scroll {
                    at,
                    dx: dx.unwrap_or(0),
                    dy: dy.unwrap_or(0),
                }
            }
            ActionKind::TypeText => BrowserCommand::TypeText {
                text: action
                    .get_string("text")
                    .ok_or_else(|| "type_text requires a text string".to_string())?,
            },
            ActionKind::Wait => BrowserCommand::Wait {
                duration: self.wait_duration(action)?,
            },
            ActionKind::Navigate => {
                let raw = action
                    .get_string("url")
                    .ok_or_else(|| "navigate requires a url string".to_string())?;
                BrowserCommand::Navigate {
                    url: normalize_url(&raw).map_err(|e| e.to_string())?,
                }
            }
            ActionKind::Back => BrowserCommand::Back,
            ActionKind::Forward => BrowserCommand::Forward,
            ActionKind::Reload => BrowserCommand::Reload,
            ActionKind::AcknowledgeSafetyCheck => BrowserCommand::AcknowledgeSafetyCheck,
            ActionKind::Unsupported => {
                let name = action
                    .get_string("type")
                    .or_else(|| action.get_string("name"))
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(format!("unsupported action kind '{}'", name));
            }
        };
        Ok(command)
    }

    /// Validate, execute and re-observe one action
    pub async fn execute(
        &self,
        action: &ActionItem,
        executor: &dyn BrowserExecutor,
    ) -> ExecutionOutcome {
        let command = match self.validate(action) {
            Ok(command) => command,
            Err(reason) => {
                tracing::warn!(kind = %action.kind, %reason, "malformed action");
                return ExecutionOutcome::malformed(reason);
            }
        };
        tracing::info!(kind = %action.kind, command = ?command, "dispatching");

        if let BrowserCommand::Wait { duration } = command {
            tokio::time::sleep(duration).await;
        } else if let Err(message) = self.with_deadline(run_primitive(&command, executor)).await {
            tracing::warn!(kind = %action.kind, error = %message, "browser primitive failed");
            return ExecutionOutcome::executor_failure(message, self.observe(executor).await.ok());
        }

        match self.observe(executor).await {
            Ok(observation) => ExecutionOutcome::Observed(observation),
            Err(message) => ExecutionOutcome::executor_failure(
                format!("action ran but the page could not be observed: {}", message),
                None,
            ),
        }
    }

    /// Capture a fresh screenshot and URL
    pub async fn observe(
        &self,
        executor: &dyn BrowserExecutor,
    ) -> std::result::Result<Observation, String> {
        let screenshot = self.with_deadline(executor.screenshot()).await?;
        let current_url = self.with_deadline(executor.current_url()).await?;
        Ok(Observation {
            screenshot,
            current_url,
        })
    }

    /// Bound a primitive by the action timeout
    async fn with_deadline<T, F>(&self, fut: F) -> std::result::Result<T, String>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.settings.action_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "timed out after {} ms; the outcome is unknown and the action was not retried",
                self.settings.action_timeout.as_millis()
            )),
        }
    }

    fn wait_duration(&self, action: &ActionItem) -> std::result::Result<Duration, String> {
        let ms = ["ms", "time_ms", "duration_ms"]
            .iter()
            .find_map(|key| action.arguments.get(*key).map(|_| *key));
        let duration = match ms {
            None => self.settings.default_wait,
            Some(key) => {
                let value = action
                    .get_i64(key)
                    .filter(|v| *v >= 0)
                    .ok_or_else(|| format!("wait {} must be a non-negative integer", key))?;
                Duration::from_millis(value as u64)
            }
        };
        Ok(duration.min(self.settings.max_wait))
    }
}

/// Issue the primitive for a validated command
async fn run_primitive(command: &BrowserCommand, executor: &dyn BrowserExecutor) -> Result<()> {
    match command {
        BrowserCommand::Click { at, button } => executor.click(*at, *button).await,
        BrowserCommand::DoubleClick { at } => executor.double_click(*at).await,
        BrowserCommand::Drag { path } => executor.drag(path).await,
        BrowserCommand::KeyPress { keys } => executor.press(keys).await,
        BrowserCommand::Move { to } => executor.move_to(*to).await,
        BrowserCommand::Scroll { at, dx, dy } => executor.scroll(*at, *dx, *dy).await,
        BrowserCommand::TypeText { text } => executor.type_text(text).await,
        BrowserCommand::Navigate { url } => executor.goto(url).await,
        BrowserCommand::Back => executor.back().await,
        BrowserCommand::Forward => executor.forward().await,
        BrowserCommand::Reload => executor.reload().await,
        BrowserCommand::Screenshot
        | BrowserCommand::AcknowledgeSafetyCheck
        | BrowserCommand::Wait { .. } => Ok(()),
    }
}

fn optional_i64(action: &ActionItem, key: &str) -> std::result::Result<Option<i64>, String> {
    match action.arguments.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(_) => action
            .get_i64(key)
            .map(Some)
            .ok_or_else(|| format!("{} must be an integer", key)),
    }
}

fn required_point(action: &ActionItem, kind: &str) -> std::result::Result<Point, String> {
    match (action.get_i64("x"), action.get_i64("y")) {
        (Some(x), Some(y)) => Ok(Point::new(x, y)),
        _ => Err(format!("{} requires integer x and y", kind)),
    }
}

fn parse_point(value: &serde_json::Value) -> Option<Point> {
    match value {
        serde_json::Value::Object(map) => Some(Point::new(
            map.get("x")?.as_i64()?,
            map.get("y")?.as_i64()?,
        )),
        serde_json::Value::Array(pair) if pair.len() == 2 => {
            Some(Point::new(pair[0].as_i64()?, pair[1].as_i64()?))
        }
        _ => None,
    }
}

fn drag_path(action: &ActionItem) -> std::result::Result<Vec<Point>, String> {
    let raw = action
        .arguments
        .get("path")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "drag requires a path array".to_string())?;
    let path = raw
        .iter()
        .map(parse_point)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| "drag path entries must be {x, y} points".to_string())?;
    if path.len() < 2 {
        return Err("drag path needs at least two points".to_string());
    }
    Ok(path)
}

fn key_sequence(action: &ActionItem) -> std::result::Result<Vec<String>, String> {
    let keys: Vec<String> = match (action.arguments.get("keys"), action.get_string("key")) {
        (Some(serde_json::Value::Array(items)), _) => items
            .iter()
            .map(|k| k.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| "key_press keys must be strings".to_string())?,
        (Some(serde_json::Value::String(single)), _) => vec![single.clone()],
        (None, Some(single)) => vec![single],
        _ => return Err("key_press requires keys or key".to_string()),
    };

    if keys.is_empty() || keys.iter().any(|k| k.is_empty()) {
        return Err("key_press keys must be non-empty".to_string());
    }
    Ok(keys.iter().map(|k| normalize_key(k)).collect())
}

/// Map decision-service key names to browser key names
pub fn normalize_key(key: &str) -> String {
    let mapped = match key.to_ascii_lowercase().as_str() {
        "/" => "Divide",
        "\\" => "Backslash",
        "alt" | "option" => "Alt",
        "arrowdown" | "down" => "ArrowDown",
        "arrowleft" | "left" => "ArrowLeft",
        "arrowright" | "right" => "ArrowRight",
        "arrowup" | "up" => "ArrowUp",
        "backspace" => "Backspace",
        "capslock" => "CapsLock",
        "cmd" | "command" | "meta" | "super" | "win" => "Meta",
        "ctrl" | "control" => "Control",
        "delete" | "del" => "Delete",
        "end" => "End",
        "enter" | "return" => "Enter",
        "esc" | "escape" => "Escape",
        "home" => "Home",
        "insert" => "Insert",
        "pagedown" => "PageDown",
        "pageup" => "PageUp",
        "shift" => "Shift",
        "space" => "Space",
        "tab" => "Tab",
        _ => return key.to_string(),
    };
    mapped.to_string()
}
