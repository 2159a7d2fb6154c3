//! Shared test doubles: a scripted decision service and a recording browser.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bua::browser::BrowserExecutor;
use bua::core::{
    ActionCall, ActionItem, ActionKind, BuaError, Config, MouseButton, PendingSafetyCheck, Point,
    Result, Screenshot, TranscriptItem,
};
use bua::llm::{DecisionService, ResponseItem, ServiceRequest, ServiceResponse, TokenUsage};

pub type Fallback = Box<dyn Fn(usize) -> ServiceResponse + Send + Sync>;

/// Replays queued responses, then the fallback (or plain text) forever
pub struct ScriptedService {
    script: Mutex<VecDeque<Result<ServiceResponse>>>,
    fallback: Option<Fallback>,
    requests: Mutex<Vec<Vec<TranscriptItem>>>,
}

impl ScriptedService {
    pub fn new(script: Vec<Result<ServiceResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn endless(fallback: Fallback) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(fallback),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Transcript sent with every call, in call order
    pub fn requests(&self) -> Vec<Vec<TranscriptItem>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl DecisionService for ScriptedService {
    async fn respond(&self, request: ServiceRequest<'_>) -> Result<ServiceResponse> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.items.to_vec());
            requests.len()
        };
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(fallback) => Ok(fallback(n)),
            None => Ok(text("Nothing left to do.")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Browser double that records every primitive it receives
pub struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
    url: Mutex<String>,
    click_error: Mutex<Option<BuaError>>,
    click_lands_on: Mutex<Option<String>>,
    hang_on_click: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            url: Mutex::new("about:blank".to_string()),
            click_error: Mutex::new(None),
            click_lands_on: Mutex::new(None),
            hang_on_click: false,
        }
    }

    /// The next click fails with `error`
    pub fn fail_next_click(self, error: BuaError) -> Self {
        *self.click_error.lock().unwrap() = Some(error);
        self
    }

    /// Clicks navigate the page to `url`
    pub fn click_navigates_to(self, url: &str) -> Self {
        *self.click_lands_on.lock().unwrap() = Some(url.to_string());
        self
    }

    /// Clicks never finish
    pub fn hanging_clicks(mut self) -> Self {
        self.hang_on_click = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change browser state
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c != "screenshot" && c != "current_url")
            .collect()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl BrowserExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    fn dimensions(&self) -> (u32, u32) {
        (1024, 768)
    }

    async fn screenshot(&self) -> Result<Screenshot> {
        self.record("screenshot");
        Ok(Screenshot::from_png(b"\x89PNG fake"))
    }

    async fn current_url(&self) -> Result<String> {
        self.record("current_url");
        Ok(self.url.lock().unwrap().clone())
    }

    async fn click(&self, at: Point, button: MouseButton) -> Result<()> {
        self.record(format!("click {},{} {}", at.x, at.y, button.as_str()));
        if self.hang_on_click {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        }
        if let Some(error) = self.click_error.lock().unwrap().take() {
            return Err(error);
        }
        if let Some(url) = self.click_lands_on.lock().unwrap().clone() {
            *self.url.lock().unwrap() = url;
        }
        Ok(())
    }

    async fn double_click(&self, at: Point) -> Result<()> {
        self.record(format!("double_click {},{}", at.x, at.y));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.record(format!("type {}", text));
        Ok(())
    }

    async fn press(&self, keys: &[String]) -> Result<()> {
        self.record(format!("press {}", keys.join("+")));
        Ok(())
    }

    async fn scroll(&self, _at: Option<Point>, dx: i64, dy: i64) -> Result<()> {
        self.record(format!("scroll {},{}", dx, dy));
        Ok(())
    }

    async fn drag(&self, path: &[Point]) -> Result<()> {
        self.record(format!("drag {}", path.len()));
        Ok(())
    }

    async fn move_to(&self, at: Point) -> Result<()> {
        self.record(format!("move {},{}", at.x, at.y));
        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.record(format!("goto {}", url));
        *self.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        self.record("back");
        Ok(())
    }

    async fn forward(&self) -> Result<()> {
        self.record("forward");
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.record("reload");
        Ok(())
    }
}

/// Configuration with fast retries and no start URL
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.service.api_key = Some("sk-test".into());
    config.service.max_retries = 2;
    config.service.retry_backoff_ms = 1;
    config.browser.start_url = String::new();
    config.agent.max_iterations = None;
    config.agent.default_wait_ms = 1;
    config.safety.blocked_domains = Vec::new();
    config
}

pub fn executor() -> Arc<RecordingExecutor> {
    Arc::new(RecordingExecutor::new())
}

pub fn action(call_id: &str, kind: ActionKind, arguments: serde_json::Value) -> ActionCall {
    ActionCall::new(call_id, ActionItem::new(kind, arguments))
}

pub fn checked(call: ActionCall, check_id: &str) -> ActionCall {
    call.with_safety_check(PendingSafetyCheck::new(check_id, None, "Please confirm"))
}

pub fn actions(calls: Vec<ActionCall>) -> ServiceResponse {
    ServiceResponse {
        items: calls.into_iter().map(ResponseItem::Action).collect(),
        usage: Some(TokenUsage {
            input_tokens: 100,
            output_tokens: 10,
            total_tokens: 110,
        }),
    }
}

pub fn text(message: &str) -> ServiceResponse {
    ServiceResponse {
        items: vec![ResponseItem::Text(message.to_string())],
        usage: None,
    }
}
