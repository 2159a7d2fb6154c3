//! Interactive REPL for bua
//!
//! Provides the main user interaction loop.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::agent::{Agent, RunReport, StopReason};
use crate::cli::commands::{handle_command, CommandResult};
use crate::cli::display::ScreenshotViewer;
use crate::core::{BuaError, Result};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    agent: Agent,
    viewer: Arc<ScreenshotViewer>,
}

impl Repl {
    /// Wrap a ready agent; every observation goes to the viewer
    pub fn new(mut agent: Agent, viewer: Arc<ScreenshotViewer>) -> Self {
        agent.set_observer(viewer.observer());
        Self { agent, viewer }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            let input = input.trim();
            if input.is_empty() {
                continue;
            }

            match handle_command(input, &mut self.agent, &self.viewer) {
                CommandResult::Exit => {
                    println!("\nGoodbye!");
                    break;
                }
                CommandResult::Clear => println!("Conversation cleared.\n"),
                CommandResult::Handled(output) => println!("{}\n", output),
                CommandResult::Continue(task) => {
                    // Task errors are reported and the session stays open
                    let _ = self.run_task(&task).await;
                }
            }
        }

        Ok(())
    }

    /// Run one task on top of the conversation so far and print its terminal state
    pub async fn run_task(&mut self, input: &str) -> Result<RunReport> {
        match self.agent.continue_run(input, None).await {
            Ok(report) => {
                print_report(&report);
                Ok(report)
            }
            Err(e) => {
                self.print_failure(&e);
                Err(e)
            }
        }
    }

    /// Report an unrecoverable error with the last known browser state
    fn print_failure(&self, error: &BuaError) {
        eprintln!("\n❌ Error: {}", error);
        match self.agent.last_observation() {
            Some(observation) => {
                eprintln!("   Last URL: {}", observation.current_url);
                match self.viewer.save(&observation.screenshot) {
                    Ok(path) => eprintln!("   Last screenshot: {}", path.display()),
                    Err(e) => eprintln!("   Last screenshot could not be saved: {}", e),
                }
            }
            None => eprintln!("   No browser observation was recorded."),
        }
        eprintln!();
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.agent.config();

        println!(
            r#"
╔═══════════════════════════════════════╗
║   bua - browser use agent             ║
╚═══════════════════════════════════════╝
"#
        );
        println!("Browser:   {} ({})", config.browser.provider, self.agent.executor().name());
        println!("Model:     {}", config.service.model);
        println!("Start URL: {}", config.browser.start_url);
        println!();
        println!("Commands: help, status, show, transcript, clear, exit");
        println!("─────────────────────────────────────────");
    }
}

fn print_report(report: &RunReport) {
    match &report.stop {
        StopReason::Completed => {
            if let Some(text) = report.transcript.final_text() {
                println!("\n{}\n", text);
            }
            println!("✅ Completed");
        }
        StopReason::Done { success, answer } => {
            println!("\n{}\n", answer);
            println!("{} {}", if *success { "✅" } else { "⚠️ " }, report.stop);
        }
        StopReason::NeedsHelp { reason } => {
            println!("\n🙋 Needs help: {}", reason);
            println!("   Reply with the missing details to continue.");
        }
        StopReason::SafetyRejected { check } => {
            println!("\n🛑 Cancelled: safety check {} was not acknowledged", check.id);
            if !check.message.is_empty() {
                println!("   {}", check.message);
            }
        }
        StopReason::BlockedUrl { url } => println!("\n🛑 Stopped at blocked URL {}", url),
        StopReason::Interrupted => println!("\n⏹  Interrupted"),
    }
    println!(
        "   {} iterations, {} actions, {} tokens\n",
        report.iterations,
        report.transcript.action_count(),
        report.usage.total_tokens
    );
}
