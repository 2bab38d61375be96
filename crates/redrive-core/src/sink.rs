//! Outbound seams: the retry queue and the notification channel.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Per-message queue options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Seconds before the message becomes visible.
    pub delay_seconds: Option<u32>,
    /// FIFO message group.
    pub message_group_id: Option<String>,
    /// FIFO deduplication id.
    pub deduplication_id: Option<String>,
}

/// Acknowledgement of a queued message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendAck {
    /// Id assigned by the queue, when reported.
    pub message_id: Option<String>,
}

/// Acknowledgement of a published notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishAck {
    /// Id assigned by the notification service, when reported.
    pub message_id: Option<String>,
}

/// A message queue.
#[async_trait]
pub trait RetryQueue: Send + Sync {
    /// Send one message body to `queue_url`.
    async fn send(&self, queue_url: &str, body: &str, options: &SendOptions) -> Result<SendAck>;
}

/// A notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish a message to `topic_arn`.
    async fn publish(&self, topic_arn: &str, message: &str, subject: Option<&str>)
    -> Result<PublishAck>;
}

/// Shared queue.
pub type SharedRetryQueue = Arc<dyn RetryQueue>;

/// Shared notifier.
pub type SharedNotifier = Arc<dyn Notifier>;
