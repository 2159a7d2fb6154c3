//! Decision service trait for abstracting different backends
//!
//! The agent only depends on this boundary; the wire schema belongs to each
//! implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ActionCall, ActionKind, Result, TranscriptItem};

/// Viewport and environment context sent with every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayContext {
    pub width: u32,
    pub height: u32,
    /// URL the browser was on when the run started
    pub start_url: Option<String>,
}

/// One request to the decision service
#[derive(Debug, Clone)]
pub struct ServiceRequest<'a> {
    /// The full transcript so far, in order
    pub items: &'a [TranscriptItem],
    /// Action kinds the service may propose
    pub vocabulary: &'a [ActionKind],
    /// Viewport and starting context
    pub display: &'a DisplayContext,
}

/// One output item of a service response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseItem {
    /// Assistant text with no action attached
    Text(String),
    /// An action to dispatch, possibly carrying safety checks
    Action(ActionCall),
    /// The service declares the task finished
    Done { success: bool, answer: String },
    /// The service cannot go on without more input from the user
    HelpRequest { reason: String },
    /// A provider item to carry verbatim
    Passthrough(serde_json::Value),
}

impl ResponseItem {
    pub fn is_pending_action(&self) -> bool {
        matches!(self, ResponseItem::Action(_))
    }
}

impl From<ResponseItem> for TranscriptItem {
    fn from(item: ResponseItem) -> Self {
        match item {
            ResponseItem::Text(text) => TranscriptItem::AssistantText { text },
            ResponseItem::Action(call) => TranscriptItem::Action(call),
            ResponseItem::Done { success, answer } => TranscriptItem::Completion { success, answer },
            ResponseItem::HelpRequest { reason } => TranscriptItem::AssistantText { text: reason },
            ResponseItem::Passthrough(payload) => TranscriptItem::Passthrough { payload },
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Add another usage record to this one
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Response from the decision service
#[derive(Debug, Clone, Default)]
pub struct ServiceResponse {
    /// Output items in the order the service produced them
    pub items: Vec<ResponseItem>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
}

impl ServiceResponse {
    /// Whether any output item needs dispatch
    pub fn has_pending_actions(&self) -> bool {
        self.items.iter().any(ResponseItem::is_pending_action)
    }
}

/// Trait for decision services
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Propose the next output items for the transcript
    async fn respond(&self, request: ServiceRequest<'_>) -> Result<ServiceResponse>;

    /// Get the service name
    fn name(&self) -> &str;
}
