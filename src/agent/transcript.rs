//! Transcript management
//!
//! Maintains the ordered, append-only record of one run: the user's input,
//! everything the decision service proposed, and the outcome of each action.

use serde::{Deserialize, Serialize};

use crate::core::{ActionCall, ActionResult, Observation, TranscriptItem};

/// Append-only record of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    items: Vec<TranscriptItem>,
}

impl Transcript {
    /// Start a transcript with the user's input
    pub fn new(initial_input: impl Into<String>) -> Self {
        Self {
            items: vec![TranscriptItem::user(initial_input)],
        }
    }

    /// Append a follow-up request from the user
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.items.push(TranscriptItem::user(text));
    }

    /// Drop all history
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Append one item
    pub fn push(&mut self, item: TranscriptItem) {
        self.items.push(item);
    }

    /// Append an action's result right after the action it resolves
    pub fn push_result(&mut self, result: ActionResult) {
        debug_assert!(
            self.last_unresolved().map(|c| c.call_id.as_str()) == Some(result.call_id.as_str()),
            "result must follow its action"
        );
        self.items.push(TranscriptItem::ActionResult(result));
    }

    /// All items in causal order
    pub fn items(&self) -> &[TranscriptItem] {
        &self.items
    }

    /// Get item count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The last item, if it is an action still waiting for its result
    pub fn last_unresolved(&self) -> Option<&ActionCall> {
        self.items.last().and_then(TranscriptItem::as_action)
    }

    /// Most recent browser observation recorded in the transcript
    pub fn last_observation(&self) -> Option<&Observation> {
        self.items
            .iter()
            .rev()
            .filter_map(TranscriptItem::as_result)
            .find_map(|r| r.outcome.observation())
    }

    /// The last assistant text or completion answer
    pub fn final_text(&self) -> Option<&str> {
        self.items.iter().rev().find_map(|item| match item {
            TranscriptItem::AssistantText { text } => Some(text.as_str()),
            TranscriptItem::Completion { answer, .. } => Some(answer.as_str()),
            _ => None,
        })
    }

    /// Number of actions recorded
    pub fn action_count(&self) -> usize {
        self.items.iter().filter(|i| i.as_action().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActionItem, ActionKind, ExecutionOutcome, Screenshot};

    fn navigate_call(id: &str) -> ActionCall {
        ActionCall::new(
            id,
            ActionItem::new(
                ActionKind::Navigate,
                serde_json::json!({"url": "https://example.com"}),
            ),
        )
    }

    fn observed(url: &str) -> ExecutionOutcome {
        ExecutionOutcome::Observed(Observation {
            screenshot: Screenshot::from_base64("AAAA"),
            current_url: url.to_string(),
        })
    }

    #[test]
    fn test_transcript_basic() {
        let mut transcript = Transcript::new("find cats");
        transcript.push(TranscriptItem::assistant("On it."));

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.final_text(), Some("On it."));
        assert!(transcript.last_unresolved().is_none());
    }

    #[test]
    fn test_result_follows_action() {
        let mut transcript = Transcript::new("go");
        transcript.push(TranscriptItem::Action(navigate_call("call_1")));
        assert_eq!(
            transcript.last_unresolved().map(|c| c.call_id.as_str()),
            Some("call_1")
        );

        transcript.push_result(ActionResult {
            call_id: "call_1".into(),
            outcome: observed("https://example.com/"),
            acknowledged_safety_checks: Vec::new(),
        });
        assert!(transcript.last_unresolved().is_none());
        assert_eq!(
            transcript.last_observation().map(|o| o.current_url.as_str()),
            Some("https://example.com/")
        );
    }

    #[test]
    fn test_serialization_preserves_order() {
        let mut transcript = Transcript::new("go");
        transcript.push(TranscriptItem::Action(navigate_call("call_1")));
        transcript.push_result(ActionResult {
            call_id: "call_1".into(),
            outcome: ExecutionOutcome::malformed("missing url"),
            acknowledged_safety_checks: Vec::new(),
        });

        let json = serde_json::to_string(&transcript).unwrap();
        let restored: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, transcript);
        assert!(matches!(restored.items()[1], TranscriptItem::Action(_)));
        assert!(matches!(restored.items()[2], TranscriptItem::ActionResult(_)));
    }

    #[test]
    fn test_follow_up_and_clear() {
        let mut transcript = Transcript::new("find cats");
        transcript.push(TranscriptItem::assistant("Found three."));
        transcript.push_user("open the second one");

        assert_eq!(transcript.len(), 3);
        assert_eq!(
            transcript.items()[2],
            TranscriptItem::user("open the second one")
        );

        transcript.clear();
        assert!(transcript.is_empty());
        assert!(transcript.final_text().is_none());
    }

    #[test]
    fn test_last_observation_skips_failed_without_observation() {
        let mut transcript = Transcript::new("go");
        transcript.push(TranscriptItem::Action(navigate_call("call_1")));
        transcript.push_result(ActionResult {
            call_id: "call_1".into(),
            outcome: observed("https://a.example/"),
            acknowledged_safety_checks: Vec::new(),
        });
        transcript.push(TranscriptItem::Action(navigate_call("call_2")));
        transcript.push_result(ActionResult {
            call_id: "call_2".into(),
            outcome: ExecutionOutcome::malformed("bad"),
            acknowledged_safety_checks: Vec::new(),
        });

        assert_eq!(
            transcript.last_observation().map(|o| o.current_url.as_str()),
            Some("https://a.example/")
        );
        assert_eq!(transcript.action_count(), 2);
    }
}
