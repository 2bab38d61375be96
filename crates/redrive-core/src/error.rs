//! Error types for failure handling.

use thiserror::Error;

/// Result type for failure handling operations.
pub type Result<T> = std::result::Result<T, RedriveError>;

/// Errors that can occur while handling a failed execution.
#[derive(Debug, Error)]
pub enum RedriveError {
    /// The orchestrator's history API failed (throttling, network, 5xx).
    ///
    /// Transient: the dispatcher re-queues the input without counting it.
    #[error("Orchestrator unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The execution history cannot be interpreted.
    ///
    /// Not retryable: the dispatcher asks a human to investigate.
    #[error("Malformed history: {0}")]
    MalformedHistory(#[from] HistoryError),

    /// The orchestrator refused the history request (access denied,
    /// unknown execution, invalid ARN).
    ///
    /// Permanent: retrying cannot succeed, so the error reaches the caller.
    #[error("History request rejected: {0}")]
    HistoryRejected(String),

    /// Publishing to a queue failed.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Publishing a notification failed.
    #[error("Notification error: {0}")]
    Notify(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] redrive_config::ConfigError),

    /// A record could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RedriveError {
    /// Whether this is a transient orchestrator failure.
    pub fn is_upstream(&self) -> bool {
        matches!(self, RedriveError::UpstreamUnavailable(_))
    }

    /// Whether this error needs a human to look at the execution.
    pub fn is_malformed_history(&self) -> bool {
        matches!(self, RedriveError::MalformedHistory(_))
    }
}

/// Ways an execution history can be structurally unusable.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The history contained no events.
    #[error("history is empty")]
    Empty,

    /// Two events share an id.
    #[error("duplicate event id {0}")]
    DuplicateEventId(u64),

    /// No step failure precedes the most recent event.
    #[error("no failure event found")]
    NoFailureEvent,

    /// A back-pointer refers to an event missing from the history.
    #[error("event {event_id} points to missing event {previous_event_id}")]
    DanglingPointer {
        event_id: u64,
        previous_event_id: u64,
    },

    /// A back-pointer does not point to an earlier event.
    #[error("event {event_id} points forward to event {previous_event_id}")]
    ForwardPointer {
        event_id: u64,
        previous_event_id: u64,
    },

    /// The walk reached the root without finding the failing state's entry.
    #[error("no {entry_kind} event precedes failure event {failure_event_id}")]
    MissingEntryEvent {
        failure_event_id: u64,
        entry_kind: String,
    },

    /// The entry event carries no state details.
    #[error("event {0} has no state details")]
    MissingStateDetails(u64),

    /// A history page could not be decoded.
    #[error("history page could not be decoded: {0}")]
    UnreadablePage(String),

    /// The entry event's recorded input is not a JSON object.
    #[error("event {event_id} input is not a JSON object: {reason}")]
    InvalidInput { event_id: u64, reason: String },
}
