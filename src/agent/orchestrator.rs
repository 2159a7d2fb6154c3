//! Agent orchestrator
//!
//! The turn loop: ask the decision service for the next output items, dispatch
//! every pending action against the browser in the order received, fold each
//! outcome back into the transcript, and repeat until the service stops
//! proposing actions.

use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::agent::dispatcher::{ActionDispatcher, DispatchSettings};
use crate::agent::loop_state::LoopState;
use crate::agent::safety::{Acknowledger, SafetyDecision, SafetyGate};
use crate::agent::transcript::Transcript;
use crate::browser::{normalize_url, BrowserExecutor};
use crate::core::{
    ActionCall, ActionKind, ActionResult, BuaError, Config, ExecutionOutcome, Observation,
    PendingSafetyCheck, Result, TranscriptItem,
};
use crate::llm::{
    DecisionService, DisplayContext, ResponseItem, ServiceRequest, ServiceResponse, TokenUsage,
};

/// Called with every fresh observation, e.g. to display the screenshot
pub type ObservationCallback = Box<dyn Fn(&Observation) + Send + Sync>;

/// Shared interrupt flag, checked between iterations and before each dispatch
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the run in progress; `false` when there is none
    pub fn interrupt(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.cancel();
        true
    }

    /// Whether a run is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the flag and mark a run as started
    fn begin(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Why a run ended without an error
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The service answered without proposing an action
    Completed,
    /// The service signalled completion explicitly
    Done { success: bool, answer: String },
    /// The service needs more input from the user to go on
    NeedsHelp { reason: String },
    /// A safety check was not acknowledged; the action did not run
    SafetyRejected { check: PendingSafetyCheck },
    /// The browser was about to go, or went, to a blocked domain
    BlockedUrl { url: String },
    /// The user interrupted the run
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::Done { success: true, .. } => write!(f, "done (success)"),
            StopReason::Done { success: false, .. } => write!(f, "done (gave up)"),
            StopReason::NeedsHelp { reason } => write!(f, "needs help: {}", reason),
            StopReason::SafetyRejected { check } => {
                write!(f, "cancelled: safety check {} was not acknowledged", check.id)
            }
            StopReason::BlockedUrl { url } => write!(f, "stopped: blocked URL {}", url),
            StopReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub transcript: Transcript,
    pub stop: StopReason,
    /// Service calls made
    pub iterations: usize,
    pub usage: TokenUsage,
}

/// Main agent that drives one browser session on behalf of the user
pub struct Agent {
    config: Config,
    service: Arc<dyn DecisionService>,
    executor: Arc<dyn BrowserExecutor>,
    dispatcher: ActionDispatcher,
    safety: SafetyGate,
    transcript: Transcript,
    cancel: CancelFlag,
    observer: Option<ObservationCallback>,
}

impl Agent {
    /// Create an agent over an already connected browser
    pub fn new(
        config: Config,
        service: Arc<dyn DecisionService>,
        executor: Arc<dyn BrowserExecutor>,
    ) -> Self {
        let dispatcher = ActionDispatcher::new(DispatchSettings::from_config(&config));
        let safety = SafetyGate::new(&config.safety);

        Self {
            config,
            service,
            executor,
            dispatcher,
            safety,
            transcript: Transcript::default(),
            cancel: CancelFlag::new(),
            observer: None,
        }
    }

    /// Install the source of human acknowledgments for safety checks
    pub fn set_acknowledger(&mut self, acknowledger: Arc<dyn Acknowledger>) {
        self.safety.set_acknowledger(acknowledger);
    }

    pub fn set_observer(&mut self, observer: ObservationCallback) {
        self.observer = Some(observer);
    }

    /// A handle that interrupts the current run when cancelled
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Transcript of the current or most recent run
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Last browser state seen, for diagnosis after a failure
    pub fn last_observation(&self) -> Option<&Observation> {
        self.transcript.last_observation()
    }

    pub fn executor(&self) -> &Arc<dyn BrowserExecutor> {
        &self.executor
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forget the conversation so the next task starts from scratch
    pub fn clear_history(&mut self) {
        self.transcript.clear();
    }

    /// Run one task to its stopping point on a fresh transcript
    ///
    /// `max_iterations` bounds the number of service calls; `None` falls back
    /// to the configured bound, which is unbounded by default.
    pub async fn run(&mut self, input: &str, max_iterations: Option<usize>) -> Result<RunReport> {
        if input.trim().is_empty() {
            return Err(BuaError::EmptyInput);
        }
        self.transcript.clear();
        self.continue_run(input, max_iterations).await
    }

    /// Run a follow-up task on top of the existing transcript
    ///
    /// The service sees every earlier item, so the input can refer to what
    /// previous tasks did. An action the previous task left unresolved is
    /// closed with a not-executed result first. Safety check ids are tracked
    /// per task.
    pub async fn continue_run(
        &mut self,
        input: &str,
        max_iterations: Option<usize>,
    ) -> Result<RunReport> {
        let input = input.trim();
        if input.is_empty() {
            return Err(BuaError::EmptyInput);
        }

        if let Some(call_id) = self.transcript.last_unresolved().map(|c| c.call_id.clone()) {
            self.transcript.push_result(ActionResult {
                call_id,
                outcome: ExecutionOutcome::not_executed(
                    "the previous task stopped before this action ran",
                ),
                acknowledged_safety_checks: Vec::new(),
            });
        }
        self.transcript.push_user(input);
        self.safety.reset();

        let mut state = LoopState::new(max_iterations.or(self.config.agent.max_iterations));
        let display = self.display_context();
        tracing::info!(
            service = self.service.name(),
            browser = self.executor.name(),
            max_iterations = ?state.max_iterations,
            history = self.transcript.len() - 1,
            "starting run"
        );

        self.cancel.begin();
        let stop = self.drive(&mut state, &display).await;
        self.cancel.finish();
        let stop = stop?;
        tracing::info!(stop = %stop, iterations = state.iteration, "run finished");

        Ok(RunReport {
            transcript: self.transcript.clone(),
            stop,
            iterations: state.iteration,
            usage: state.usage,
        })
    }

    async fn drive(&mut self, state: &mut LoopState, display: &DisplayContext) -> Result<StopReason> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Interrupted);
            }

            let iteration = state.begin_iteration()?;
            tracing::debug!(
                iteration,
                remaining = ?state.remaining(),
                items = self.transcript.len(),
                "calling decision service"
            );
            let response = self.call_service(display).await?;
            state.record_usage(response.usage.as_ref());

            if !response.has_pending_actions() {
                let mut stop = StopReason::Completed;
                for item in response.items {
                    match &item {
                        ResponseItem::Done { success, answer } => {
                            stop = StopReason::Done {
                                success: *success,
                                answer: answer.clone(),
                            };
                        }
                        ResponseItem::HelpRequest { reason } => {
                            stop = StopReason::NeedsHelp {
                                reason: reason.clone(),
                            };
                        }
                        _ => {}
                    }
                    self.transcript.push(item.into());
                }
                return Ok(stop);
            }

            for item in response.items {
                match item {
                    ResponseItem::Action(call) => {
                        self.transcript.push(TranscriptItem::Action(call.clone()));
                        if let Some(stop) = self.handle_action(&call).await? {
                            return Ok(stop);
                        }
                    }
                    ResponseItem::Done { success, answer } => {
                        self.transcript.push(TranscriptItem::Completion {
                            success,
                            answer: answer.clone(),
                        });
                        return Ok(StopReason::Done { success, answer });
                    }
                    ResponseItem::HelpRequest { reason } => {
                        self.transcript.push(TranscriptItem::assistant(reason.clone()));
                        return Ok(StopReason::NeedsHelp { reason });
                    }
                    other => self.transcript.push(other.into()),
                }
            }
        }
    }

    /// Gate, dispatch and record one action; `Some` stops the run
    async fn handle_action(&mut self, call: &ActionCall) -> Result<Option<StopReason>> {
        let mut acknowledged = Vec::new();
        for check in &call.pending_safety_checks {
            match self.safety.check(check, &call.action).await? {
                SafetyDecision::Accepted => acknowledged.push(check.clone()),
                SafetyDecision::Rejected => {
                    tracing::warn!(check = %check.id, kind = %call.action.kind, "safety check rejected");
                    return Ok(Some(StopReason::SafetyRejected {
                        check: check.clone(),
                    }));
                }
            }
        }

        if let Some(url) = self.safety.blocked_target(&call.action) {
            tracing::warn!(url = %url, "refusing navigation to blocked domain");
            return Ok(Some(StopReason::BlockedUrl { url }));
        }

        if self.cancel.is_cancelled() {
            return Ok(Some(StopReason::Interrupted));
        }

        let outcome = self
            .dispatcher
            .execute(&call.action, self.executor.as_ref())
            .await;

        let mut landed_on_blocked = None;
        if let Some(observation) = outcome.observation() {
            if let Some(observer) = &self.observer {
                observer(observation);
            }
            if self.safety.is_blocked(&observation.current_url) {
                landed_on_blocked = Some(observation.current_url.clone());
            }
        }

        self.transcript.push_result(ActionResult {
            call_id: call.call_id.clone(),
            outcome,
            acknowledged_safety_checks: acknowledged,
        });

        if let Some(url) = landed_on_blocked {
            tracing::warn!(url = %url, "browser landed on blocked domain");
            return Ok(Some(StopReason::BlockedUrl { url }));
        }
        Ok(None)
    }

    /// Call the service with a timeout, retrying transient failures with backoff
    async fn call_service(&self, display: &DisplayContext) -> Result<ServiceResponse> {
        let timeout = Duration::from_secs(self.config.service.timeout_secs);
        let max_attempts = self.config.service.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let request = ServiceRequest {
                items: self.transcript.items(),
                vocabulary: &ActionKind::ALL,
                display,
            };

            let error = match tokio::time::timeout(timeout, self.service.respond(request)).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => e,
                Err(_) => BuaError::Timeout(format!(
                    "decision service did not answer within {}s",
                    timeout.as_secs()
                )),
            };

            if !error.is_retryable() || attempt >= max_attempts {
                return Err(BuaError::ServiceUnavailable {
                    attempts: attempt,
                    message: error.to_string(),
                });
            }

            let delay = backoff_delay(self.config.service.retry_backoff_ms, attempt);
            tracing::warn!(attempt, error = %error, delay_ms = delay.as_millis() as u64, "decision service call failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    fn display_context(&self) -> DisplayContext {
        let (width, height) = self.executor.dimensions();
        let start_url = Some(self.config.browser.start_url.as_str())
            .filter(|u| !u.trim().is_empty())
            .and_then(|u| normalize_url(u).ok());
        DisplayContext {
            width,
            height,
            start_url,
        }
    }
}

/// Exponential backoff with up to 50% jitter
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1).min(16)));
    let jitter = rand::rng().random_range(0..=exp / 2);
    Duration::from_millis(exp + jitter)
}
