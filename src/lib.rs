//! bua - Browser Use Agent
//!
//! Lets a computer-use model operate a browser: the agent sends the running
//! transcript to a decision service, dispatches each proposed action against
//! a browser backend, and feeds the resulting screenshot back until the task
//! is done.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Decision service abstraction with a Responses API client
//! - **Browser**: Executor trait with local and hosted backends
//! - **Agent**: Turn loop, action dispatch and safety gate
//! - **CLI**: REPL, screenshot display and safety prompt
//!
//! # Usage
//!
//! ```rust,no_run
//! use bua::{browser, llm, Agent, Config};
//!
//! #[tokio::main]
//! async fn main() -> bua::Result<()> {
//!     let config = Config::load();
//!     config.validate()?;
//!
//!     let service = llm::create_service(&config)?;
//!     let executor = browser::connect(&config).await?;
//!     let mut agent = Agent::new(config, service, executor);
//!
//!     let report = agent.run("search for cats and open the first result", None).await?;
//!     println!("{}: {:?}", report.stop, report.transcript.final_text());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod browser;
pub mod cli;
pub mod core;
pub mod llm;

// Re-export commonly used items
pub use agent::{Agent, RunReport, StopReason, Transcript};
pub use browser::BrowserExecutor;
pub use cli::Repl;
pub use core::{BuaError, Config, Result};
pub use llm::DecisionService;
