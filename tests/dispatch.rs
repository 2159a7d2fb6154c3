//! Action dispatcher integration tests

mod common;

use serde_json::json;
use std::time::Duration;

use bua::agent::{ActionDispatcher, DispatchSettings};
use bua::core::{ActionItem, ActionKind, ExecutionOutcome, FailureKind};

use common::RecordingExecutor;

fn dispatcher() -> ActionDispatcher {
    ActionDispatcher::new(DispatchSettings {
        action_timeout: Duration::from_secs(5),
        default_wait: Duration::from_millis(5),
        max_wait: Duration::from_millis(50),
    })
}

#[tokio::test]
async fn test_missing_parameters_never_call_the_executor() {
    let dispatcher = dispatcher();
    let browser = RecordingExecutor::new();

    let kinds_with_required_params = [
        ActionKind::Click,
        ActionKind::DoubleClick,
        ActionKind::Drag,
        ActionKind::KeyPress,
        ActionKind::Move,
        ActionKind::Scroll,
        ActionKind::TypeText,
        ActionKind::Navigate,
        ActionKind::Unsupported,
    ];
    for kind in kinds_with_required_params {
        let outcome = dispatcher
            .execute(&ActionItem::new(kind, json!({})), &browser)
            .await;
        assert_eq!(
            outcome.failure_kind(),
            Some(FailureKind::MalformedAction),
            "{} without parameters",
            kind
        );
    }

    // Present but invalid
    let invalid = [
        ActionItem::new(ActionKind::Click, json!({"x": "ten", "y": 3})),
        ActionItem::new(ActionKind::KeyPress, json!({"keys": []})),
        ActionItem::new(ActionKind::TypeText, json!({"text": 42})),
        ActionItem::new(ActionKind::Navigate, json!({"url": "http://exa mple.com"})),
        ActionItem::new(ActionKind::Wait, json!({"ms": "soon"})),
    ];
    for action in &invalid {
        let outcome = dispatcher.execute(action, &browser).await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::MalformedAction));
    }

    assert!(browser.calls().is_empty());
}

#[tokio::test]
async fn test_parameterless_kinds_dispatch_and_observe() {
    let dispatcher = dispatcher();
    let browser = RecordingExecutor::new();

    for kind in [
        ActionKind::Screenshot,
        ActionKind::Back,
        ActionKind::Forward,
        ActionKind::Reload,
        ActionKind::AcknowledgeSafetyCheck,
    ] {
        let outcome = dispatcher
            .execute(&ActionItem::new(kind, json!({})), &browser)
            .await;
        assert!(matches!(outcome, ExecutionOutcome::Observed(_)), "{}", kind);
    }
    assert_eq!(browser.mutating_calls(), vec!["back", "forward", "reload"]);
}

#[tokio::test]
async fn test_wait_only_reobserves() {
    let dispatcher = dispatcher();
    let browser = RecordingExecutor::new();
    let wait = ActionItem::new(ActionKind::Wait, json!({}));

    let first = dispatcher.execute(&wait, &browser).await;
    let second = dispatcher.execute(&wait, &browser).await;

    assert!(browser.mutating_calls().is_empty());
    assert_eq!(first, second);
    assert_eq!(
        browser.calls(),
        vec!["screenshot", "current_url", "screenshot", "current_url"]
    );
}

#[tokio::test]
async fn test_primitives_receive_normalized_arguments() {
    let dispatcher = dispatcher();
    let browser = RecordingExecutor::new();

    let actions = [
        ActionItem::new(ActionKind::Navigate, json!({"url": "example.com/a"})),
        ActionItem::new(ActionKind::Click, json!({"x": 10.0, "y": 20, "button": "right"})),
        ActionItem::new(ActionKind::DoubleClick, json!({"x": 1, "y": 2})),
        ActionItem::new(ActionKind::KeyPress, json!({"keys": ["CTRL", "SHIFT", "t"]})),
        ActionItem::new(ActionKind::Scroll, json!({"x": 5, "y": 5, "scroll_x": 0, "scroll_y": -300})),
        ActionItem::new(ActionKind::Drag, json!({"path": [{"x": 0, "y": 0}, {"x": 5, "y": 5}, {"x": 9, "y": 9}]})),
        ActionItem::new(ActionKind::Move, json!({"x": 7, "y": 8})),
        ActionItem::new(ActionKind::TypeText, json!({"text": "hello"})),
    ];
    for action in &actions {
        let outcome = dispatcher.execute(action, &browser).await;
        assert!(!outcome.is_failure(), "{} failed: {:?}", action.kind, outcome);
    }

    assert_eq!(
        browser.mutating_calls(),
        vec![
            "goto https://example.com/a",
            "click 10,20 right",
            "double_click 1,2",
            "press Control+Shift+t",
            "scroll 0,-300",
            "drag 3",
            "move 7,8",
            "type hello",
        ]
    );
}

#[tokio::test]
async fn test_navigate_outcome_reflects_post_action_state() {
    let dispatcher = dispatcher();
    let browser = RecordingExecutor::new();

    let outcome = dispatcher
        .execute(
            &ActionItem::new(ActionKind::Navigate, json!({"url": "https://example.org"})),
            &browser,
        )
        .await;

    assert_eq!(
        outcome.observation().unwrap().current_url,
        "https://example.org/"
    );
}
