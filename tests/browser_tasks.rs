//! Live browser task tests
//!
//! Run a real task end to end against the local agent-browser backend and the
//! configured decision service.
//!
//! Run with: cargo test --test browser_tasks -- --ignored --nocapture

use std::time::Duration;
use tokio::time::timeout;

use bua::agent::{Agent, FixedAcknowledger};
use bua::core::{Config, ProviderKind};
use bua::{browser, llm};

/// Helper to create an agent over a local browser
async fn create_browser_agent() -> Result<Agent, Box<dyn std::error::Error>> {
    let mut config = Config::load();
    config.browser.provider = ProviderKind::Local;
    config.browser.start_url = "https://example.com".into();
    config.agent.max_iterations = Some(8);
    config.validate()?;

    let service = llm::create_service(&config)?;
    let executor = browser::connect(&config).await?;
    let mut agent = Agent::new(config, service, executor);
    agent.set_acknowledger(std::sync::Arc::new(FixedAcknowledger(false)));
    Ok(agent)
}

#[tokio::test]
#[ignore] // Requires agent-browser and OPENAI_API_KEY
async fn test_read_page_heading() {
    let mut agent = match create_browser_agent().await {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            return;
        }
    };

    let result = timeout(
        Duration::from_secs(180),
        agent.run("What is the main heading on this page?", None),
    )
    .await;

    assert!(result.is_ok(), "Task timed out");
    let report = result.unwrap().expect("task failed");
    println!("{}: {:?}", report.stop, report.transcript.final_text());
    assert!(report.transcript.final_text().is_some());

    agent.executor().close().await.ok();
}

#[tokio::test]
#[ignore] // Requires agent-browser and OPENAI_API_KEY
async fn test_navigate_and_report_url() {
    let mut agent = match create_browser_agent().await {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Skipping test: {}", e);
            return;
        }
    };

    let result = timeout(
        Duration::from_secs(180),
        agent.run("Go to https://www.rust-lang.org and tell me the page title", None),
    )
    .await;

    assert!(result.is_ok(), "Task timed out");
    let report = result.unwrap().expect("task failed");
    let url = agent
        .last_observation()
        .map(|o| o.current_url.clone())
        .unwrap_or_default();
    println!("stop: {}, url: {}", report.stop, url);
    assert!(url.contains("rust-lang.org"));

    agent.executor().close().await.ok();
}
