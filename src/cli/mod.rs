//! CLI module - command-line interface
//!
//! Contains the REPL, command parsing, screenshot display and the
//! interactive safety prompt.

pub mod acknowledge;
pub mod commands;
pub mod display;
pub mod repl;

pub use acknowledge::PromptAcknowledger;
pub use display::ScreenshotViewer;
pub use repl::Repl;
