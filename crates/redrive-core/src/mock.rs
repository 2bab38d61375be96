//! In-memory implementations of the external seams.
//!
//! Used by this crate's tests and by downstream crates that want to drive a
//! [`Dispatcher`](crate::Dispatcher) without network access.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{RedriveError, Result};
use crate::history::{HistoryPage, HistorySource};
use crate::sink::{Notifier, PublishAck, RetryQueue, SendAck, SendOptions};

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

/// A history source that serves pre-configured pages in order.
#[derive(Debug)]
pub struct StaticHistory {
    pages: Mutex<Vec<HistoryPage>>,
    failure: Option<(fn(String) -> RedriveError, String)>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl StaticHistory {
    /// Serve `pages` in order, one per request.
    ///
    /// Requests beyond the last page get an upstream error.
    pub fn new(pages: Vec<HistoryPage>) -> Self {
        Self {
            pages: Mutex::new(pages),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A source whose every request is throttled.
    pub fn throttled() -> Self {
        Self::failing(
            RedriveError::UpstreamUnavailable,
            "ThrottlingException: Rate exceeded",
        )
    }

    /// A source that refuses every request with a permanent error.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::failing(RedriveError::HistoryRejected, message)
    }

    fn failing(error: fn(String) -> RedriveError, message: impl Into<String>) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            failure: Some((error, message.into())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests made so far as `(execution_arn, next_token)`.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn get_history(
        &self,
        execution_arn: &str,
        next_token: Option<&str>,
    ) -> Result<HistoryPage> {
        self.calls
            .lock()
            .unwrap()
            .push((execution_arn.to_string(), next_token.map(String::from)));

        if let Some((error, message)) = &self.failure {
            return Err(error(message.clone()));
        }

        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            return Err(RedriveError::UpstreamUnavailable(
                "StaticHistory: no more pages available".to_string(),
            ));
        }
        Ok(pages.remove(0))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queue
// ─────────────────────────────────────────────────────────────────────────────

/// A message captured by [`RecordingQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Destination queue.
    pub queue_url: String,
    /// Message body.
    pub body: String,
    /// Options the message was sent with.
    pub options: SendOptions,
}

/// A queue that records every message it accepts.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<String>,
}

impl RecordingQueue {
    /// Create an accepting queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that rejects every send with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of messages accepted.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl RetryQueue for RecordingQueue {
    async fn send(&self, queue_url: &str, body: &str, options: &SendOptions) -> Result<SendAck> {
        if let Some(message) = &self.failure {
            return Err(RedriveError::Queue(message.clone()));
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            queue_url: queue_url.to_string(),
            body: body.to_string(),
            options: options.clone(),
        });
        Ok(SendAck {
            message_id: Some(format!("mock-message-{}", sent.len())),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifier
// ─────────────────────────────────────────────────────────────────────────────

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedNotification {
    /// Destination topic.
    pub topic_arn: String,
    /// Message body.
    pub message: String,
    /// Subject line.
    pub subject: Option<String>,
}

/// A notifier that records every notification it accepts.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<PublishedNotification>>,
    failure: Option<String>,
}

impl RecordingNotifier {
    /// Create an accepting notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that rejects every publish with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    /// Notifications accepted so far.
    pub fn published(&self) -> Vec<PublishedNotification> {
        self.published.lock().unwrap().clone()
    }

    /// Number of notifications accepted.
    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<PublishAck> {
        if let Some(failure) = &self.failure {
            return Err(RedriveError::Notify(failure.clone()));
        }

        let mut published = self.published.lock().unwrap();
        published.push(PublishedNotification {
            topic_arn: topic_arn.to_string(),
            message: message.to_string(),
            subject: subject.map(String::from),
        });
        Ok(PublishAck {
            message_id: Some(format!("mock-notification-{}", published.len())),
        })
    }
}
