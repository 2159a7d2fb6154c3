//! Safety gate
//!
//! Decides whether an action flagged with a [`PendingSafetyCheck`] may run.
//! Checks on the allow-list are accepted by policy; everything else goes to an
//! [`Acknowledger`]. With no acknowledger installed, the check is rejected.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::browser::{host_of, normalize_url};
use crate::core::config::SafetyConfig;
use crate::core::{ActionItem, ActionKind, BuaError, PendingSafetyCheck, Result};

/// Verdict for one safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyDecision {
    Accepted,
    Rejected,
}

/// External acknowledgment source (an interactive prompt, or a fixed policy)
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Return true to let the action run
    async fn acknowledge(&self, check: &PendingSafetyCheck, action: &ActionItem) -> bool;
}

/// Acknowledger that always answers the same way
pub struct FixedAcknowledger(pub bool);

#[async_trait]
impl Acknowledger for FixedAcknowledger {
    async fn acknowledge(&self, _check: &PendingSafetyCheck, _action: &ActionItem) -> bool {
        self.0
    }
}

pub struct SafetyGate {
    auto_accept_codes: Vec<String>,
    auto_accept_actions: Vec<ActionKind>,
    blocked_domains: Vec<String>,
    acknowledger: Option<Arc<dyn Acknowledger>>,
    /// Check ids already evaluated in this run
    seen: HashSet<String>,
}

impl SafetyGate {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            auto_accept_codes: config.auto_accept_codes.clone(),
            auto_accept_actions: config.auto_accept_actions.clone(),
            blocked_domains: config
                .blocked_domains
                .iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            acknowledger: None,
            seen: HashSet::new(),
        }
    }

    pub fn set_acknowledger(&mut self, acknowledger: Arc<dyn Acknowledger>) {
        self.acknowledger = Some(acknowledger);
    }

    /// Forget evaluated ids; called at the start of every run
    pub fn reset(&mut self) {
        self.seen.clear();
    }

    /// Evaluate a check for the action it is attached to
    ///
    /// Each id is evaluated at most once per run; seeing an id again is a
    /// protocol violation and fails with [`BuaError::DuplicateSafetyCheck`].
    pub async fn check(
        &mut self,
        check: &PendingSafetyCheck,
        action: &ActionItem,
    ) -> Result<SafetyDecision> {
        if !self.seen.insert(check.id.clone()) {
            return Err(BuaError::DuplicateSafetyCheck(check.id.clone()));
        }

        if let Some(target) = self.blocked_target(action) {
            tracing::warn!(check = %check.id, url = %target, "safety check on a blocked navigation target");
            return Ok(SafetyDecision::Rejected);
        }

        let code_allowed = check
            .code
            .as_ref()
            .is_some_and(|code| self.auto_accept_codes.iter().any(|c| c == code));
        if code_allowed || self.auto_accept_actions.contains(&action.kind) {
            tracing::info!(check = %check.id, kind = %action.kind, "safety check accepted by policy");
            return Ok(SafetyDecision::Accepted);
        }

        let accepted = match &self.acknowledger {
            Some(acknowledger) => acknowledger.acknowledge(check, action).await,
            None => false,
        };
        tracing::info!(check = %check.id, accepted, "safety check resolved");

        Ok(if accepted {
            SafetyDecision::Accepted
        } else {
            SafetyDecision::Rejected
        })
    }

    /// Whether a URL lies on a blocked domain or one of its subdomains
    pub fn is_blocked(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        self.blocked_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }

    /// The normalized navigation target of `action`, when it is blocked
    pub fn blocked_target(&self, action: &ActionItem) -> Option<String> {
        let url = normalize_url(&action.target_url()?).ok()?;
        self.is_blocked(&url).then_some(url)
    }
}
