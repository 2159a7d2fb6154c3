//! Interactive safety acknowledgment
//!
//! Asks the user on the terminal before an action flagged by the decision
//! service runs.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

use crate::agent::Acknowledger;
use crate::core::{ActionItem, PendingSafetyCheck};

/// Prompts `[y/N]` on stdin; anything but yes rejects
pub struct PromptAcknowledger;

#[async_trait]
impl Acknowledger for PromptAcknowledger {
    async fn acknowledge(&self, check: &PendingSafetyCheck, action: &ActionItem) -> bool {
        println!("\n⚠️  Safety check {} on {}", check.id, action.kind);
        if let Some(code) = &check.code {
            println!("   [{}]", code);
        }
        if !check.message.is_empty() {
            println!("   {}", check.message);
        }
        if let Some(url) = action.target_url() {
            println!("   Target: {}", url);
        }

        let answer = tokio::task::spawn_blocking(|| -> io::Result<String> {
            print!("Proceed? [y/N]: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => is_yes(&line),
            _ => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
