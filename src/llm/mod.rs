//! LLM module - decision service integrations
//!
//! Provides the decision service abstraction with a Responses API client as
//! the primary backend.

pub mod responses;
pub mod traits;

use std::sync::Arc;

use crate::core::{Config, Result};

pub use responses::ResponsesClient;
pub use traits::{
    DecisionService, DisplayContext, ResponseItem, ServiceRequest, ServiceResponse, TokenUsage,
};

/// Create the decision service described by the configuration
pub fn create_service(config: &Config) -> Result<Arc<dyn DecisionService>> {
    Ok(Arc::new(ResponsesClient::from_config(config)?))
}
