//! Shared types used across bua modules
//!
//! Contains the action vocabulary, safety checks, observations and execution
//! outcomes that flow between the agent, the dispatcher and browser backends.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::error::{BuaError, Result};

/// A point in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Mouse button identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    /// Parse a button name as emitted by the decision service
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" | "primary" => Some(Self::Left),
            "right" | "secondary" => Some(Self::Right),
            "middle" | "wheel" => Some(Self::Middle),
            "back" => Some(Self::Back),
            "forward" => Some(Self::Forward),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
            Self::Back => "back",
            Self::Forward => "forward",
        }
    }
}

/// The fixed action vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    DoubleClick,
    Drag,
    KeyPress,
    Move,
    Screenshot,
    Scroll,
    TypeText,
    Wait,
    Navigate,
    Back,
    Forward,
    Reload,
    AcknowledgeSafetyCheck,
    /// A kind name the vocabulary does not contain
    #[serde(other)]
    Unsupported,
}

impl ActionKind {
    /// Every dispatchable kind
    pub const ALL: [ActionKind; 14] = [
        ActionKind::Click,
        ActionKind::DoubleClick,
        ActionKind::Drag,
        ActionKind::KeyPress,
        ActionKind::Move,
        ActionKind::Screenshot,
        ActionKind::Scroll,
        ActionKind::TypeText,
        ActionKind::Wait,
        ActionKind::Navigate,
        ActionKind::Back,
        ActionKind::Forward,
        ActionKind::Reload,
        ActionKind::AcknowledgeSafetyCheck,
    ];

    /// Resolve a kind name, accepting the aliases decision services use
    pub fn from_name(name: &str) -> Self {
        match name {
            "click" => Self::Click,
            "double_click" | "dblclick" => Self::DoubleClick,
            "drag" => Self::Drag,
            "keypress" | "key_press" | "press_key" => Self::KeyPress,
            "move" => Self::Move,
            "screenshot" => Self::Screenshot,
            "scroll" => Self::Scroll,
            "type" | "type_text" => Self::TypeText,
            "wait" => Self::Wait,
            "goto" | "navigate" => Self::Navigate,
            "back" | "go_back" => Self::Back,
            "forward" | "go_forward" => Self::Forward,
            "reload" => Self::Reload,
            "acknowledge_safety_check" => Self::AcknowledgeSafetyCheck,
            _ => Self::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::DoubleClick => "double_click",
            Self::Drag => "drag",
            Self::KeyPress => "key_press",
            Self::Move => "move",
            Self::Screenshot => "screenshot",
            Self::Scroll => "scroll",
            Self::TypeText => "type_text",
            Self::Wait => "wait",
            Self::Navigate => "navigate",
            Self::Back => "back",
            Self::Forward => "forward",
            Self::Reload => "reload",
            Self::AcknowledgeSafetyCheck => "acknowledge_safety_check",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action proposed by the decision service
///
/// Arguments are kept as the service sent them; they are checked against the
/// kind's requirements only when the action is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    /// Kind of operation
    pub kind: ActionKind,
    /// Kind-specific parameters as sent by the service
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ActionItem {
    /// Create a new action
    pub fn new(kind: ActionKind, arguments: serde_json::Value) -> Self {
        Self { kind, arguments }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Get an integer argument by key, accepting integral floats
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        let value = self.arguments.get(key)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
    }

    /// Navigation target, if any
    pub fn target_url(&self) -> Option<String> {
        match self.kind {
            ActionKind::Navigate => self.get_string("url"),
            _ => None,
        }
    }
}

/// A fully validated browser operation
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserCommand {
    Click { at: Point, button: MouseButton },
    DoubleClick { at: Point },
    Drag { path: Vec<Point> },
    KeyPress { keys: Vec<String> },
    Move { to: Point },
    Screenshot,
    Scroll { at: Option<Point>, dx: i64, dy: i64 },
    TypeText { text: String },
    Wait { duration: Duration },
    Navigate { url: String },
    Back,
    Forward,
    Reload,
    AcknowledgeSafetyCheck,
}

/// A check the decision service raised that needs acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSafetyCheck {
    /// Identifier, unique per occurrence
    pub id: String,
    /// Machine-readable category (e.g. "malicious_instructions")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable reason
    #[serde(default)]
    pub message: String,
}

impl PendingSafetyCheck {
    pub fn new(id: impl Into<String>, code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.map(str::to_string),
            message: message.into(),
        }
    }
}

/// A base64-encoded PNG screenshot
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Screenshot(String);

impl Screenshot {
    /// Wrap base64 data
    pub fn from_base64(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    /// Encode raw PNG bytes
    pub fn from_png(bytes: &[u8]) -> Self {
        Self(base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Decode back to PNG bytes
    pub fn to_png(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.0.trim())
            .map_err(|e| BuaError::browser(format!("Invalid screenshot data: {}", e)))
    }

    /// Data URL suitable for image inputs
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.0)
    }
}

impl fmt::Debug for Screenshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Screenshot({} bytes base64)", self.0.len())
    }
}

/// Post-action browser state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub screenshot: Screenshot,
    pub current_url: String,
}

/// Why an action did not produce the intended effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required parameters were missing or invalid; nothing was executed
    MalformedAction,
    /// The browser primitive itself failed
    ExecutorFailure,
    /// The run stopped before the action was dispatched
    NotExecuted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MalformedAction => write!(f, "malformed action"),
            FailureKind::ExecutorFailure => write!(f, "executor failure"),
            FailureKind::NotExecuted => write!(f, "not executed"),
        }
    }
}

/// Result of dispatching one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The action ran; this is the state afterwards
    Observed(Observation),
    /// The action failed; the page may still have been observed
    Failed {
        kind: FailureKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        observation: Option<Observation>,
    },
}

impl ExecutionOutcome {
    /// Create a malformed-action outcome
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Failed {
            kind: FailureKind::MalformedAction,
            message: message.into(),
            observation: None,
        }
    }

    /// Create an executor-failure outcome
    pub fn executor_failure(message: impl Into<String>, observation: Option<Observation>) -> Self {
        Self::Failed {
            kind: FailureKind::ExecutorFailure,
            message: message.into(),
            observation,
        }
    }

    /// Resolve an action that was never dispatched
    pub fn not_executed(message: impl Into<String>) -> Self {
        Self::Failed {
            kind: FailureKind::NotExecuted,
            message: message.into(),
            observation: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            Self::Observed(_) => None,
        }
    }

    /// The observation carried by this outcome, if any
    pub fn observation(&self) -> Option<&Observation> {
        match self {
            Self::Observed(obs) => Some(obs),
            Self::Failed { observation, .. } => observation.as_ref(),
        }
    }
}

/// An action together with the call id the service assigned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub call_id: String,
    /// Provider-assigned item id, echoed back untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub action: ActionItem,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_safety_checks: Vec<PendingSafetyCheck>,
}

impl ActionCall {
    pub fn new(call_id: impl Into<String>, action: ActionItem) -> Self {
        Self {
            call_id: call_id.into(),
            item_id: None,
            action,
            pending_safety_checks: Vec::new(),
        }
    }

    /// Attach a safety check
    pub fn with_safety_check(mut self, check: PendingSafetyCheck) -> Self {
        self.pending_safety_checks.push(check);
        self
    }
}

/// The outcome of an action call, keyed by its call id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub call_id: String,
    pub outcome: ExecutionOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acknowledged_safety_checks: Vec<PendingSafetyCheck>,
}

/// One entry in a run's transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptItem {
    /// Text supplied by the user
    UserInput { text: String },
    /// Text produced by the decision service
    AssistantText { text: String },
    /// An action the decision service wants executed
    Action(ActionCall),
    /// The result of executing the preceding action
    ActionResult(ActionResult),
    /// Explicit completion signal from the decision service
    Completion { success: bool, answer: String },
    /// A provider item carried verbatim and never interpreted
    Passthrough { payload: serde_json::Value },
}

impl TranscriptItem {
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserInput { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::AssistantText { text: text.into() }
    }

    /// The action call, if this item is one
    pub fn as_action(&self) -> Option<&ActionCall> {
        match self {
            Self::Action(call) => Some(call),
            _ => None,
        }
    }

    /// The action result, if this item is one
    pub fn as_result(&self) -> Option<&ActionResult> {
        match self {
            Self::ActionResult(result) => Some(result),
            _ => None,
        }
    }
}
