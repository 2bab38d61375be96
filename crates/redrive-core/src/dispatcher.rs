//! Failure routing.
//!
//! The [`Dispatcher`] handles one failed execution end to end:
//!
//! ```text
//! fetch ──▶ locate ──▶ update ledger ──▶ decide ──┬──▶ retry queue
//!   │          │                                  └──▶ notify (+ terminal queue)
//!   │          └── malformed ──▶ notify (investigation)
//!   ├── upstream unavailable ──▶ retry queue (start input, byte for byte)
//!   └── rejected ──▶ error to the caller
//! ```

use std::ops::RangeInclusive;

use rand::Rng;
use redrive_config::{
    DEFAULT_DELAY_MAX_SECS, DEFAULT_DELAY_MIN_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MESSAGE_GROUP_ID,
    DEFAULT_REGION, RedriveConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::diagnostics::{self, DiagnosticLinks};
use crate::error::{RedriveError, Result};
use crate::history::{EventLogFetcher, SharedHistorySource};
use crate::ledger::{FailureRecord, update_ledger};
use crate::locator::FailureLocator;
use crate::policy::{Decision, RetryPolicy};
use crate::sink::{SendOptions, SharedNotifier, SharedRetryQueue};

/// One failed execution to handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// The failed execution.
    pub execution_arn: String,
    /// The input the execution was started with, exactly as received.
    #[serde(default)]
    pub start_input: Map<String, Value>,
    /// Cause reported by the orchestrator, if the caller has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Invocation {
    /// Create an invocation.
    pub fn new(execution_arn: impl Into<String>, start_input: Map<String, Value>) -> Self {
        Self {
            execution_arn: execution_arn.into(),
            start_input,
            cause: None,
        }
    }

    /// Attach a cause.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// The ledger carried in by the start input.
    pub fn previous_record(&self) -> FailureRecord {
        FailureRecord::from_object(self.start_input.clone())
    }
}

/// How an invocation was routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// History was unavailable; the start input was re-queued unchanged.
    PassThrough(Map<String, Value>),
    /// The updated record was queued for another attempt.
    Retried(FailureRecord),
    /// The retry budget is spent; a human was notified.
    Escalated(FailureRecord),
    /// The history could not be interpreted; a human was notified.
    NeedsInvestigation,
}

impl Outcome {
    /// The updated record, for retried and escalated outcomes.
    pub fn record(&self) -> Option<&FailureRecord> {
        match self {
            Outcome::Retried(r) | Outcome::Escalated(r) => Some(r),
            Outcome::PassThrough(_) | Outcome::NeedsInvestigation => None,
        }
    }

    /// Consume the outcome, returning its updated record.
    pub fn into_record(self) -> Option<FailureRecord> {
        match self {
            Outcome::Retried(r) | Outcome::Escalated(r) => Some(r),
            Outcome::PassThrough(_) | Outcome::NeedsInvestigation => None,
        }
    }

    /// The JSON handed back to the caller: the queued payload, or `null`
    /// when nothing was queued.
    pub fn into_json(self) -> serde_json::Result<Value> {
        match self {
            Outcome::PassThrough(input) => Ok(Value::Object(input)),
            Outcome::Retried(r) | Outcome::Escalated(r) => serde_json::to_value(r),
            Outcome::NeedsInvestigation => Ok(Value::Null),
        }
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::PassThrough(_) => "pass_through",
            Outcome::Retried(_) => "retried",
            Outcome::Escalated(_) => "escalated",
            Outcome::NeedsInvestigation => "needs_investigation",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Routing targets and retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Queue that re-drives failed inputs.
    pub queue_url: String,
    /// Queue that archives escalated records.
    pub terminal_queue_url: Option<String>,
    /// Topic for escalations.
    pub topic_arn: String,
    /// Region used in diagnostic links.
    pub region: String,
    /// Deploy stage used in diagnostic links.
    pub stage: Option<String>,
    /// Retry budget.
    pub max_retries: u32,
    /// Window for the retry delay on standard queues.
    pub delay_range: RangeInclusive<u32>,
    /// Message group for FIFO queues.
    pub message_group_id: String,
}

impl DispatcherConfig {
    /// Create a config with default retry settings.
    pub fn new(queue_url: impl Into<String>, topic_arn: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            terminal_queue_url: None,
            topic_arn: topic_arn.into(),
            region: DEFAULT_REGION.to_string(),
            stage: None,
            max_retries: DEFAULT_MAX_RETRIES,
            delay_range: DEFAULT_DELAY_MIN_SECS..=DEFAULT_DELAY_MAX_SECS,
            message_group_id: DEFAULT_MESSAGE_GROUP_ID.to_string(),
        }
    }

    /// Build from a loaded configuration.
    pub fn from_config(config: &RedriveConfig) -> redrive_config::Result<Self> {
        Ok(Self {
            queue_url: config.queue_url()?.to_string(),
            terminal_queue_url: config.queue.terminal_url.clone().filter(|s| !s.is_empty()),
            topic_arn: config.topic_arn()?.to_string(),
            region: config.aws.region.clone(),
            stage: config.aws.stage.clone(),
            max_retries: config.retry.max_retries,
            delay_range: config.queue.delay_range(),
            message_group_id: config.queue.message_group_id.clone(),
        })
    }

    /// Set the terminal archive queue.
    pub fn with_terminal_queue(mut self, url: impl Into<String>) -> Self {
        self.terminal_queue_url = Some(url.into());
        self
    }

    /// Set the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the deploy stage.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay window. Bounds given in either order.
    pub fn with_delay_range(mut self, a: u32, b: u32) -> Self {
        self.delay_range = a.min(b)..=a.max(b);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Routes a failed execution to the retry queue or to a human.
#[derive(Clone)]
pub struct Dispatcher {
    fetcher: EventLogFetcher,
    locator: FailureLocator,
    policy: RetryPolicy,
    queue: SharedRetryQueue,
    notifier: SharedNotifier,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a dispatcher over the given collaborators.
    pub fn new(
        history: SharedHistorySource,
        queue: SharedRetryQueue,
        notifier: SharedNotifier,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            fetcher: EventLogFetcher::new(history),
            locator: FailureLocator::new(),
            policy: RetryPolicy::new(config.max_retries),
            queue,
            notifier,
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handle one failed execution.
    pub async fn handle(&self, invocation: &Invocation) -> Result<Outcome> {
        let arn = invocation.execution_arn.as_str();

        let log = match self.fetcher.fetch(arn).await {
            Ok(log) => log,
            Err(e) if e.is_upstream() => {
                warn!(execution_arn = arn, error = %e, "History unavailable, re-queuing start input");
                let body = serde_json::to_string(&invocation.start_input)?;
                self.enqueue(&self.config.queue_url, arn, &body, true)
                    .await?;
                return Ok(Outcome::PassThrough(invocation.start_input.clone()));
            }
            Err(e) if e.is_malformed_history() => {
                return self.investigate(arn, &e.to_string()).await;
            }
            Err(e) => return Err(e),
        };

        let located = match self.locator.locate(&log) {
            Ok(located) => located,
            Err(e) => return self.investigate(arn, &e.to_string()).await,
        };

        let previous = invocation.previous_record();
        let record = located.record.inherit_ledger(&previous);
        let record = update_ledger(record, arn, previous.resume_state.as_deref());
        let fail_count = record.fail_count();

        match self.policy.decide(fail_count) {
            Decision::Retry => {
                info!(
                    execution_arn = arn,
                    resume_state = record.resume_state.as_deref(),
                    fail_count,
                    max_retries = self.policy.max_retries(),
                    "Retrying failed state"
                );
                self.enqueue(&self.config.queue_url, arn, &record.to_json()?, true)
                    .await?;
                Ok(Outcome::Retried(record))
            }
            Decision::Escalate => {
                warn!(
                    execution_arn = arn,
                    resume_state = record.resume_state.as_deref(),
                    fail_count,
                    max_retries = self.policy.max_retries(),
                    "Retry budget exhausted, escalating"
                );
                let cause = located.cause.as_deref().or(invocation.cause.as_deref());
                let links = DiagnosticLinks::collect(
                    arn,
                    &record,
                    &self.config.region,
                    self.config.stage.as_deref(),
                );
                let message = diagnostics::escalation_message(arn, &record, cause, &links)?;
                let subject = diagnostics::escalation_subject(arn);
                self.notifier
                    .publish(&self.config.topic_arn, &message, Some(&subject))
                    .await?;

                if let Some(terminal) = &self.config.terminal_queue_url {
                    self.enqueue(terminal, arn, &record.to_json()?, false)
                        .await?;
                }
                Ok(Outcome::Escalated(record))
            }
        }
    }

    async fn investigate(&self, arn: &str, reason: &str) -> Result<Outcome> {
        warn!(execution_arn = arn, %reason, "History malformed, requesting investigation");
        let message = diagnostics::investigation_message(arn, reason);
        let subject = diagnostics::investigation_subject(arn);
        self.notifier
            .publish(&self.config.topic_arn, &message, Some(&subject))
            .await?;
        Ok(Outcome::NeedsInvestigation)
    }

    async fn enqueue(
        &self,
        queue_url: &str,
        arn: &str,
        body: &str,
        delayed: bool,
    ) -> Result<()> {
        let options = self.send_options(queue_url, arn, body, delayed);
        let ack = self.queue.send(queue_url, body, &options).await?;
        info!(
            queue_url,
            message_id = ack.message_id.as_deref(),
            delay_seconds = options.delay_seconds,
            "Queued record"
        );
        Ok(())
    }

    fn send_options(&self, queue_url: &str, arn: &str, body: &str, delayed: bool) -> SendOptions {
        if is_fifo(queue_url) {
            SendOptions {
                delay_seconds: None,
                message_group_id: Some(self.config.message_group_id.clone()),
                deduplication_id: Some(deduplication_id(arn, body)),
            }
        } else {
            SendOptions {
                delay_seconds: delayed
                    .then(|| rand::rng().random_range(self.config.delay_range.clone())),
                ..Default::default()
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Whether `queue_url` names a FIFO queue.
pub fn is_fifo(queue_url: &str) -> bool {
    queue_url.ends_with(".fifo")
}

/// Deterministic FIFO deduplication id for a message.
pub fn deduplication_id(execution_arn: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(execution_arn.as_bytes());
    hasher.update(b"\n");
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}
