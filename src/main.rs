//! bua - Browser Use Agent
//!
//! Main entry point for the CLI application.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use bua::agent::FixedAcknowledger;
use bua::cli::{PromptAcknowledger, ScreenshotViewer};
use bua::core::ProviderKind;
use bua::{browser, llm, Agent, Config, Repl};

/// bua - let a computer-use model drive a browser
#[derive(Parser, Debug)]
#[command(name = "bua")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Browser backend: local, browserbase or notte
    #[arg(long, short = 'c')]
    computer: Option<ProviderKind>,

    /// Single task mode (non-interactive)
    #[arg(long, short = 'i')]
    input: Option<String>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Open each screenshot as it arrives
    #[arg(long)]
    show: bool,

    /// URL opened before the first task (empty string to skip)
    #[arg(long)]
    start_url: Option<String>,

    /// Stop a task after this many service calls
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Computer-use model name
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Run in headed browser mode (visible window, local backend only)
    #[arg(long)]
    headed: bool,

    /// Accept every safety check without asking
    #[arg(long)]
    accept_safety_checks: bool,
}

fn init_logging(debug: bool) {
    let level = if debug { "bua=debug,info" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(provider) = args.computer {
        config.browser.provider = provider;
    }

    if let Some(ref start_url) = args.start_url {
        config.browser.start_url = start_url.clone();
    }

    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = Some(max);
    }

    if let Some(ref model) = args.model {
        config.service.model = model.clone();
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.show {
        config.agent.show_images = true;
    }

    if args.headed {
        config.browser.headed = true;
    }

    init_logging(config.agent.debug);
    config.validate()?;

    let service = llm::create_service(&config)?;
    let executor = browser::connect(&config)
        .await
        .with_context(|| format!("failed to start the {} browser", config.browser.provider))?;

    let viewer = Arc::new(ScreenshotViewer::new(
        ScreenshotViewer::default_dir(),
        config.agent.show_images,
    ));
    let mut agent = Agent::new(config, service, Arc::clone(&executor));
    if args.accept_safety_checks {
        agent.set_acknowledger(Arc::new(FixedAcknowledger(true)));
    } else {
        agent.set_acknowledger(Arc::new(PromptAcknowledger));
    }

    // Ctrl+C stops the running task before its next action
    let cancel = agent.cancel_flag();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if cancel.interrupt() {
                tracing::warn!("interrupt received, stopping before the next action");
            } else {
                eprintln!("\nNo task is running. Type 'exit' or press Ctrl+D to quit.");
            }
        }
    });

    let mut repl = Repl::new(agent, viewer);
    let outcome = match args.input {
        // Single task mode
        Some(input) => repl.run_task(&input).await.map(|_| ()),
        // Interactive REPL mode
        None => repl.run().await,
    };

    if let Err(e) = executor.close().await {
        tracing::warn!(error = %e, "failed to close browser session");
    }

    outcome?;
    Ok(())
}
