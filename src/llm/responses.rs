//! Responses API client implementation
//!
//! Async HTTP client for an OpenAI-style `/responses` endpoint with the
//! computer-use tool. All wire-format knowledge lives in this file.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::core::{
    ActionCall, ActionItem, ActionKind, ActionResult, BuaError, Config, ExecutionOutcome,
    Observation, PendingSafetyCheck, Result, TranscriptItem,
};
use crate::llm::traits::{
    DecisionService, DisplayContext, ResponseItem, ServiceRequest, ServiceResponse, TokenUsage,
};

/// Function tools declared next to the computer tool
const FUNCTION_KINDS: [ActionKind; 5] = [
    ActionKind::Navigate,
    ActionKind::Back,
    ActionKind::Forward,
    ActionKind::Reload,
    ActionKind::AcknowledgeSafetyCheck,
];

const DONE_FUNCTION: &str = "done";
const HELP_FUNCTION: &str = "request_help";

/// Responses API client
#[derive(Clone)]
pub struct ResponsesClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// Responses API reply
#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireSafetyCheck {
    id: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

impl ResponsesClient {
    /// Create a new client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .service
            .api_key
            .clone()
            .ok_or_else(|| BuaError::config("Missing decision service API key"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.service.timeout_secs))
            .build()
            .map_err(|e| BuaError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.service.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.service.model.clone(),
        })
    }

    /// Build the request body for a transcript
    fn build_body(&self, request: &ServiceRequest<'_>) -> Value {
        let mut body = json!({
            "model": self.model,
            "input": to_wire_input(request.items),
            "tools": tool_definitions(request.vocabulary, request.display),
            "truncation": "auto",
        });
        if let Some(url) = &request.display.start_url {
            body["instructions"] = json!(format!(
                "You are operating a browser. The session started at {}.",
                url
            ));
        }
        body
    }
}

/// Wire name of a computer action kind
fn computer_action_name(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::KeyPress => "keypress",
        ActionKind::TypeText => "type",
        other => other.as_str(),
    }
}

/// Wire name of a function-tool kind
fn function_name(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Navigate => "goto",
        other => other.as_str(),
    }
}

fn is_function_call(action: &ActionItem) -> bool {
    match action.kind {
        ActionKind::Unsupported => action.arguments.get("type").is_none(),
        kind => FUNCTION_KINDS.contains(&kind),
    }
}

/// Declare the computer tool plus one function per non-computer kind
fn tool_definitions(vocabulary: &[ActionKind], display: &DisplayContext) -> Vec<Value> {
    let mut tools = vec![json!({
        "type": "computer_use_preview",
        "display_width": display.width,
        "display_height": display.height,
        "environment": "browser",
    })];

    for kind in FUNCTION_KINDS.iter().filter(|k| vocabulary.contains(k)) {
        let (description, parameters) = match kind {
            ActionKind::Navigate => (
                "Go to a URL in the current tab",
                json!({
                    "type": "object",
                    "properties": { "url": { "type": "string", "description": "Absolute URL" } },
                    "required": ["url"],
                    "additionalProperties": false
                }),
            ),
            ActionKind::Back => ("Go back to the previous page", empty_parameters()),
            ActionKind::Forward => ("Go forward to the next page", empty_parameters()),
            ActionKind::Reload => ("Reload the current page", empty_parameters()),
            _ => (
                "Acknowledge a safety check and re-observe the page",
                empty_parameters(),
            ),
        };
        tools.push(json!({
            "type": "function",
            "name": function_name(*kind),
            "description": description,
            "parameters": parameters,
        }));
    }

    tools.push(json!({
        "type": "function",
        "name": DONE_FUNCTION,
        "description": "Finish the task, reporting whether it succeeded and the answer",
        "parameters": {
            "type": "object",
            "properties": {
                "success": { "type": "boolean" },
                "answer": { "type": "string" }
            },
            "required": ["success", "answer"],
            "additionalProperties": false
        },
    }));

    tools.push(json!({
        "type": "function",
        "name": HELP_FUNCTION,
        "description": "Stop and ask the user for help when the task cannot continue without them",
        "parameters": {
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "What is needed from the user" }
            },
            "required": ["reason"],
            "additionalProperties": false
        },
    }));

    tools
}

fn empty_parameters() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

fn wire_safety_checks(checks: &[PendingSafetyCheck]) -> Vec<Value> {
    checks
        .iter()
        .map(|c| {
            let mut obj = json!({ "id": c.id, "message": c.message });
            if let Some(code) = &c.code {
                obj["code"] = json!(code);
            }
            obj
        })
        .collect()
}

/// Convert the transcript into Responses API input items
fn to_wire_input(items: &[TranscriptItem]) -> Vec<Value> {
    let mut input = Vec::with_capacity(items.len());
    let mut last_observation: Option<&Observation> = None;
    let mut functions: Vec<&str> = Vec::new();

    for item in items {
        match item {
            TranscriptItem::UserInput { text } => {
                input.push(json!({ "role": "user", "content": text }));
            }
            TranscriptItem::AssistantText { text } => {
                input.push(json!({
                    "type": "message",
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": text }],
                }));
            }
            TranscriptItem::Completion { answer, .. } => {
                input.push(json!({
                    "type": "message",
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": answer }],
                }));
            }
            TranscriptItem::Action(call) => {
                if is_function_call(&call.action) {
                    functions.push(call.call_id.as_str());
                    input.push(function_call_item(call));
                } else {
                    input.push(computer_call_item(call));
                }
            }
            TranscriptItem::ActionResult(result) => {
                let observation = result.outcome.observation().or(last_observation);
                if functions.contains(&result.call_id.as_str()) {
                    input.extend(function_output_items(result, observation));
                } else {
                    input.extend(computer_output_items(result, observation));
                }
                if let Some(obs) = result.outcome.observation() {
                    last_observation = Some(obs);
                }
            }
            TranscriptItem::Passthrough { payload } => input.push(payload.clone()),
        }
    }

    input
}

fn computer_call_item(call: &ActionCall) -> Value {
    let mut action = match &call.action.arguments {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if call.action.kind != ActionKind::Unsupported {
        action.insert(
            "type".to_string(),
            json!(computer_action_name(call.action.kind)),
        );
    }

    let mut item = json!({
        "type": "computer_call",
        "call_id": call.call_id,
        "action": Value::Object(action),
        "pending_safety_checks": wire_safety_checks(&call.pending_safety_checks),
        "status": "completed",
    });
    if let Some(id) = &call.item_id {
        item["id"] = json!(id);
    }
    item
}

fn function_call_item(call: &ActionCall) -> Value {
    let mut arguments = match &call.action.arguments {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    let name = match call.action.kind {
        ActionKind::Unsupported => arguments
            .remove("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string()),
        kind => function_name(kind).to_string(),
    };

    let mut item = json!({
        "type": "function_call",
        "call_id": call.call_id,
        "name": name,
        "arguments": Value::Object(arguments).to_string(),
    });
    if let Some(id) = &call.item_id {
        item["id"] = json!(id);
    }
    item
}

fn failure_text(outcome: &ExecutionOutcome) -> Option<String> {
    match outcome {
        ExecutionOutcome::Failed { kind, message, .. } => {
            Some(format!("The last action failed ({}): {}", kind, message))
        }
        ExecutionOutcome::Observed(_) => None,
    }
}

fn computer_output_items(result: &ActionResult, observation: Option<&Observation>) -> Vec<Value> {
    let mut output = json!({ "type": "input_image" });
    if let Some(obs) = observation {
        output["image_url"] = json!(obs.screenshot.data_url());
        output["current_url"] = json!(obs.current_url);
    }

    let mut items = vec![json!({
        "type": "computer_call_output",
        "call_id": result.call_id,
        "acknowledged_safety_checks": wire_safety_checks(&result.acknowledged_safety_checks),
        "output": output,
    })];

    // The computer output carries no error field, so failures ride along as text.
    if let Some(text) = failure_text(&result.outcome) {
        items.push(json!({ "role": "user", "content": text }));
    }
    items
}

fn function_output_items(result: &ActionResult, observation: Option<&Observation>) -> Vec<Value> {
    let output = match &result.outcome {
        ExecutionOutcome::Observed(obs) => json!({ "status": "ok", "current_url": obs.current_url }),
        ExecutionOutcome::Failed { kind, message, .. } => {
            json!({ "status": "failed", "kind": kind, "error": message })
        }
    };

    let mut items = vec![json!({
        "type": "function_call_output",
        "call_id": result.call_id,
        "output": output.to_string(),
    })];

    if let Some(obs) = observation {
        items.push(json!({
            "role": "user",
            "content": [
                { "type": "input_text", "text": format!("Current URL: {}", obs.current_url) },
                { "type": "input_image", "image_url": obs.screenshot.data_url() }
            ],
        }));
    }
    items
}

/// Translate Responses API output items into response items
fn from_wire_output(output: Vec<Value>) -> Result<Vec<ResponseItem>> {
    let mut items = Vec::with_capacity(output.len());

    for raw in output {
        let item_type = raw
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match item_type.as_str() {
            "message" => {
                let text = message_text(&raw);
                if !text.is_empty() {
                    items.push(ResponseItem::Text(text));
                }
            }
            "computer_call" => items.push(ResponseItem::Action(parse_computer_call(&raw)?)),
            "function_call" => items.push(parse_function_call(&raw)?),
            _ => items.push(ResponseItem::Passthrough(raw)),
        }
    }

    Ok(items)
}

fn message_text(raw: &Value) -> String {
    match raw.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn required_call_id(raw: &Value) -> Result<String> {
    raw.get("call_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BuaError::service("Response item is missing call_id"))
}

fn parse_computer_call(raw: &Value) -> Result<ActionCall> {
    let call_id = required_call_id(raw)?;
    let arguments = raw.get("action").cloned().unwrap_or_else(|| json!({}));
    let kind = arguments
        .get("type")
        .and_then(Value::as_str)
        .map(ActionKind::from_name)
        .unwrap_or(ActionKind::Unsupported);

    let pending_safety_checks = match raw.get("pending_safety_checks") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<WireSafetyCheck>>(value.clone())?
            .into_iter()
            .map(|c| PendingSafetyCheck {
                id: c.id,
                code: c.code,
                message: c.message,
            })
            .collect(),
    };

    Ok(ActionCall {
        call_id,
        item_id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        action: ActionItem::new(kind, arguments),
        pending_safety_checks,
    })
}

fn parse_function_call(raw: &Value) -> Result<ResponseItem> {
    let call_id = required_call_id(raw)?;
    let name = raw.get("name").and_then(Value::as_str).unwrap_or_default();
    let mut arguments = match raw.get("arguments") {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            serde_json::from_str::<Value>(s).unwrap_or_else(|_| json!({ "raw": s }))
        }
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    };

    if name == DONE_FUNCTION {
        return Ok(ResponseItem::Done {
            success: arguments.get("success").and_then(Value::as_bool).unwrap_or(true),
            answer: arguments
                .get("answer")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    if name == HELP_FUNCTION {
        return Ok(ResponseItem::HelpRequest {
            reason: arguments
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let kind = match ActionKind::from_name(name) {
        kind if FUNCTION_KINDS.contains(&kind) => kind,
        _ => ActionKind::Unsupported,
    };
    if kind == ActionKind::Unsupported {
        if let Value::Object(map) = &mut arguments {
            map.insert("name".to_string(), json!(name));
        }
    }

    Ok(ResponseItem::Action(ActionCall {
        call_id,
        item_id: raw.get("id").and_then(Value::as_str).map(str::to_string),
        action: ActionItem::new(kind, arguments),
        pending_safety_checks: Vec::new(),
    }))
}

/// Replace inline image data so payloads can be logged
fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) if s.starts_with("data:image") => json!("<image>"),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[async_trait]
impl DecisionService for ResponsesClient {
    async fn respond(&self, request: ServiceRequest<'_>) -> Result<ServiceResponse> {
        let body = self.build_body(&request);
        tracing::debug!(request = %sanitize(&body), "responses request");

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BuaError::service(format!("Cannot connect to {}: {}", self.base_url, e))
                } else if e.is_timeout() {
                    BuaError::Timeout(format!("Request to {} timed out", self.base_url))
                } else {
                    BuaError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => BuaError::Auth(error_text),
                429 | 500..=599 => {
                    BuaError::service(format!("API error ({}): {}", status, error_text))
                }
                _ => BuaError::Other(format!(
                    "Decision service rejected the request ({}): {}",
                    status, error_text
                )),
            });
        }

        let response_text = response.text().await?;
        let reply: ResponsesReply = serde_json::from_str(&response_text)
            .map_err(|e| BuaError::service(format!("Failed to parse response: {}", e)))?;
        tracing::debug!(items = reply.output.len(), "responses reply");

        Ok(ServiceResponse {
            items: from_wire_output(reply.output)?,
            usage: reply.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn name(&self) -> &str {
        "responses"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Screenshot;

    fn display() -> DisplayContext {
        DisplayContext {
            width: 1024,
            height: 768,
            start_url: None,
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let mut config = Config::default();
        config.service.api_key = None;
        assert!(ResponsesClient::from_config(&config).is_err());

        config.service.api_key = Some("sk-test".into());
        config.service.base_url = "https://api.example.com/v1/".into();
        let client = ResponsesClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_parse_output_items() {
        let output = vec![
            json!({"type": "reasoning", "id": "rs_1", "summary": []}),
            json!({
                "type": "computer_call",
                "id": "cu_1",
                "call_id": "call_1",
                "action": {"type": "click", "x": 10, "y": 20, "button": "left"},
                "pending_safety_checks": [
                    {"id": "sc_1", "code": "malicious_instructions", "message": "Check this page"}
                ]
            }),
            json!({
                "type": "function_call",
                "call_id": "call_2",
                "name": "goto",
                "arguments": "{\"url\": \"https://example.com\"}"
            }),
            json!({
                "type": "message",
                "role": "assistant",
                "content": [{"type": "output_text", "text": "Done clicking."}]
            }),
        ];

        let items = from_wire_output(output).unwrap();
        assert_eq!(items.len(), 4);
        assert!(matches!(items[0], ResponseItem::Passthrough(_)));

        let ResponseItem::Action(click) = &items[1] else {
            panic!("expected action");
        };
        assert_eq!(click.action.kind, ActionKind::Click);
        assert_eq!(click.item_id.as_deref(), Some("cu_1"));
        assert_eq!(click.pending_safety_checks[0].id, "sc_1");

        let ResponseItem::Action(goto) = &items[2] else {
            panic!("expected action");
        };
        assert_eq!(goto.action.kind, ActionKind::Navigate);
        assert_eq!(goto.action.target_url().as_deref(), Some("https://example.com"));

        assert_eq!(items[3], ResponseItem::Text("Done clicking.".into()));
    }

    #[test]
    fn test_done_function_and_unknown_function() {
        let items = from_wire_output(vec![
            json!({
                "type": "function_call",
                "call_id": "call_9",
                "name": "open_new_tab",
                "arguments": "{}"
            }),
            json!({
                "type": "function_call",
                "call_id": "call_10",
                "name": "done",
                "arguments": "{\"success\": false, \"answer\": \"Could not log in\"}"
            }),
        ])
        .unwrap();

        let ResponseItem::Action(unknown) = &items[0] else {
            panic!("expected action");
        };
        assert_eq!(unknown.action.kind, ActionKind::Unsupported);
        assert_eq!(unknown.action.get_string("name").as_deref(), Some("open_new_tab"));
        assert_eq!(
            items[1],
            ResponseItem::Done {
                success: false,
                answer: "Could not log in".into()
            }
        );
    }

    #[test]
    fn test_help_request_function() {
        let items = from_wire_output(vec![json!({
            "type": "function_call",
            "call_id": "call_11",
            "name": "request_help",
            "arguments": "{\"reason\": \"Need the one-time code sent by SMS\"}"
        })])
        .unwrap();
        assert_eq!(
            items,
            vec![ResponseItem::HelpRequest {
                reason: "Need the one-time code sent by SMS".into()
            }]
        );
    }

    #[test]
    fn test_null_safety_checks_mean_none() {
        let items = from_wire_output(vec![json!({
            "type": "computer_call",
            "call_id": "call_1",
            "action": {"type": "scroll", "scroll_x": 0, "scroll_y": 200},
            "pending_safety_checks": null
        })])
        .unwrap();
        let ResponseItem::Action(call) = &items[0] else {
            panic!("expected action");
        };
        assert_eq!(call.action.kind, ActionKind::Scroll);
        assert!(call.pending_safety_checks.is_empty());
    }

    #[test]
    fn test_missing_call_id_is_a_service_error() {
        let result = from_wire_output(vec![json!({
            "type": "computer_call",
            "action": {"type": "wait"}
        })]);
        assert!(matches!(result, Err(BuaError::Service(_))));
    }

    #[test]
    fn test_wire_input_keeps_results_after_calls() {
        let observation = Observation {
            screenshot: Screenshot::from_base64("AAAA"),
            current_url: "https://example.com/".into(),
        };
        let items = vec![
            TranscriptItem::user("open example"),
            TranscriptItem::Action(ActionCall::new(
                "call_1",
                ActionItem::new(ActionKind::Navigate, json!({"url": "https://example.com"})),
            )),
            TranscriptItem::ActionResult(ActionResult {
                call_id: "call_1".into(),
                outcome: ExecutionOutcome::Observed(observation.clone()),
                acknowledged_safety_checks: Vec::new(),
            }),
            TranscriptItem::Action(ActionCall::new(
                "call_2",
                ActionItem::new(ActionKind::KeyPress, json!({"type": "keypress", "keys": ["ENTER"]})),
            )),
            TranscriptItem::ActionResult(ActionResult {
                call_id: "call_2".into(),
                outcome: ExecutionOutcome::executor_failure("timed out", None),
                acknowledged_safety_checks: Vec::new(),
            }),
        ];

        let input = to_wire_input(&items);
        let types: Vec<&str> = input
            .iter()
            .map(|v| v.get("type").and_then(Value::as_str).unwrap_or("user"))
            .collect();
        assert_eq!(
            types,
            vec![
                "user",
                "function_call",
                "function_call_output",
                "user",
                "computer_call",
                "computer_call_output",
                "user"
            ]
        );
        assert_eq!(input[1]["name"], "goto");
        assert_eq!(input[4]["action"]["type"], "keypress");
        // A failed computer action reuses the last known screenshot.
        assert_eq!(
            input[5]["output"]["image_url"],
            json!(observation.screenshot.data_url())
        );
        assert!(input[6]["content"].as_str().unwrap().contains("timed out"));
    }

    #[test]
    fn test_tool_definitions_follow_vocabulary() {
        let tools = tool_definitions(&[ActionKind::Click, ActionKind::Navigate], &display());
        let names: Vec<&str> = tools
            .iter()
            .filter_map(|t| t.get("name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, vec!["goto", "done", "request_help"]);
        assert_eq!(tools[0]["display_width"], 1024);
    }

    #[test]
    fn test_sanitize_elides_images() {
        let value = json!({"output": {"image_url": "data:image/png;base64,AAAA", "current_url": "x"}});
        let clean = sanitize(&value);
        assert_eq!(clean["output"]["image_url"], "<image>");
        assert_eq!(clean["output"]["current_url"], "x");
    }
}
