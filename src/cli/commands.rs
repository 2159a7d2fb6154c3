//! CLI commands
//!
//! Special commands that can be executed in the REPL.

use crate::agent::Agent;
use crate::cli::display::ScreenshotViewer;
use crate::core::TranscriptItem;

/// Result of parsing a command
pub enum CommandResult {
    /// Run the input as a task
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Conversation history was cleared
    Clear,
}

/// A REPL command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Clear,
    Help,
    Status,
    /// `None` toggles
    Show(Option<bool>),
    Transcript,
    /// A `/`-prefixed line that names no command
    Unknown(String),
}

/// Recognise a command line; `None` means the line is a task
///
/// A bare line is a command only when it is exactly a command word (or
/// `show on`/`show off`), so tasks such as "show me the cheapest flight"
/// reach the agent. A leading `/` always marks a command.
pub fn parse_command(input: &str) -> Option<Command> {
    let input = input.trim();
    let (slashed, body) = match input.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let parts: Vec<&str> = body.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return slashed.then(|| Command::Unknown(input.to_string()));
    };
    let cmd = first.to_lowercase();

    let command = match (cmd.as_str(), &parts[1..]) {
        ("exit" | "quit" | "q", []) => Command::Exit,
        ("clear" | "reset", []) => Command::Clear,
        ("help" | "?", []) => Command::Help,
        ("status", []) => Command::Status,
        ("transcript", []) => Command::Transcript,
        ("show", []) => Command::Show(None),
        ("show", [arg]) => match arg.to_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => Command::Show(Some(true)),
            "off" | "false" | "0" | "no" => Command::Show(Some(false)),
            _ if slashed => Command::Unknown(input.to_string()),
            _ => return None,
        },
        _ if slashed => Command::Unknown(input.to_string()),
        _ => return None,
    };
    Some(command)
}

/// Parse and handle special commands
pub fn handle_command(input: &str, agent: &mut Agent, viewer: &ScreenshotViewer) -> CommandResult {
    let Some(command) = parse_command(input) else {
        return CommandResult::Continue(input.trim().to_string());
    };

    match command {
        Command::Exit => CommandResult::Exit,

        Command::Clear => {
            agent.clear_history();
            CommandResult::Clear
        }

        Command::Help => CommandResult::Handled(help_text()),

        Command::Status => CommandResult::Handled(status_text(agent, viewer)),

        Command::Show(setting) => {
            let enabled = setting.unwrap_or(!viewer.is_enabled());
            viewer.set_enabled(enabled);
            CommandResult::Handled(format!(
                "Screenshot display: {}",
                if enabled { "ON" } else { "OFF" }
            ))
        }

        Command::Transcript => CommandResult::Handled(transcript_text(agent)),

        Command::Unknown(line) => CommandResult::Handled(format!(
            "Unknown command: {}. Type 'help' for available commands.",
            line
        )),
    }
}

fn status_text(agent: &Agent, viewer: &ScreenshotViewer) -> String {
    let config = agent.config();
    let last_url = agent
        .last_observation()
        .map(|o| o.current_url.as_str())
        .unwrap_or("-");
    format!(
        "bua Status:\n\
         ─────────────────────────────\n\
         Browser:        {} ({})\n\
         Model:          {}\n\
         Start URL:      {}\n\
         Last URL:       {}\n\
         Max iterations: {}\n\
         Screenshots:    {}\n\
         History:        {} items",
        config.browser.provider,
        agent.executor().name(),
        config.service.model,
        config.browser.start_url,
        last_url,
        config
            .agent
            .max_iterations
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string()),
        if viewer.is_enabled() { "on" } else { "off" },
        agent.transcript().len(),
    )
}

/// One line per item of the conversation so far
pub fn transcript_text(agent: &Agent) -> String {
    let items = agent.transcript().items();
    if items.is_empty() {
        return "No history yet.".to_string();
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{:>3}. {}", i + 1, describe_item(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_item(item: &TranscriptItem) -> String {
    match item {
        TranscriptItem::UserInput { text } => format!("user: {}", text),
        TranscriptItem::AssistantText { text } => format!("assistant: {}", text),
        TranscriptItem::Action(call) => format!("action {} {}", call.action.kind, call.action.arguments),
        TranscriptItem::ActionResult(result) => match result.outcome.failure_kind() {
            None => format!(
                "observed {}",
                result
                    .outcome
                    .observation()
                    .map(|o| o.current_url.as_str())
                    .unwrap_or("")
            ),
            Some(kind) => format!("failed ({})", kind),
        },
        TranscriptItem::Completion { success, answer } => {
            format!("done (success: {}): {}", success, answer)
        }
        TranscriptItem::Passthrough { payload } => format!(
            "provider item {}",
            payload.get("type").and_then(|t| t.as_str()).unwrap_or("?")
        ),
    }
}

/// Generate help text
fn help_text() -> String {
    r#"bua Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit bua
  clear, reset     Forget the conversation so far
  status           Show the browser and service in use
  show [on|off]    Toggle screenshot display
  transcript       List the items of the conversation

Commands can also be written with a leading '/'. Anything else is run as a
browser task that can build on the earlier ones.

Keyboard Shortcuts:
  Ctrl+C           Stop the current task before its next action
  Ctrl+D           Exit bua
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ActionCall, ActionItem, ActionKind, ActionResult, ExecutionOutcome};
    use serde_json::json;

    #[test]
    fn test_describe_items() {
        let action = TranscriptItem::Action(ActionCall::new(
            "c1",
            ActionItem::new(ActionKind::Navigate, json!({"url": "https://example.com"})),
        ));
        assert!(describe_item(&action).starts_with("action navigate"));

        let failed = TranscriptItem::ActionResult(ActionResult {
            call_id: "c1".into(),
            outcome: ExecutionOutcome::malformed("missing url"),
            acknowledged_safety_checks: Vec::new(),
        });
        assert_eq!(describe_item(&failed), "failed (malformed action)");
    }

    #[test]
    fn test_tasks_starting_with_command_words_are_tasks() {
        for task in [
            "show me the cheapest flight to Lisbon",
            "status of my order 1234",
            "transcript of the keynote on youtube",
            "clear the search box and look up rust",
            "help me find a dentist",
        ] {
            assert_eq!(parse_command(task), None, "{}", task);
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("exit"), Some(Command::Exit));
        assert_eq!(parse_command("  Quit "), Some(Command::Exit));
        assert_eq!(parse_command("clear"), Some(Command::Clear));
        assert_eq!(parse_command("/reset"), Some(Command::Clear));
        assert_eq!(parse_command("show"), Some(Command::Show(None)));
        assert_eq!(parse_command("show off"), Some(Command::Show(Some(false))));
        assert_eq!(parse_command("/show on"), Some(Command::Show(Some(true))));
        assert_eq!(parse_command("status"), Some(Command::Status));
    }

    #[test]
    fn test_slash_prefix_always_marks_a_command() {
        assert_eq!(
            parse_command("/show me"),
            Some(Command::Unknown("/show me".into()))
        );
        assert_eq!(parse_command("/bogus"), Some(Command::Unknown("/bogus".into())));
        assert_eq!(parse_command("/"), Some(Command::Unknown("/".into())));
        assert_eq!(parse_command("search for cats"), None);
    }

    #[test]
    fn test_help_mentions_commands() {
        let help = help_text();
        for cmd in ["status", "show", "transcript", "clear", "exit"] {
            assert!(help.contains(cmd));
        }
    }
}
