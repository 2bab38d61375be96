//! SQS API.

use async_trait::async_trait;
use redrive_core::{RedriveError, RetryQueue, SendAck, SendOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::AwsClient;
use crate::error::Result;

const SEND_MESSAGE: &str = "AmazonSQS.SendMessage";

/// Body of a `SendMessage` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageRequest<'a> {
    /// Destination queue.
    pub queue_url: &'a str,
    /// Message body.
    pub message_body: &'a str,
    /// Visibility delay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u32>,
    /// FIFO message group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_group_id: Option<&'a str>,
    /// FIFO deduplication id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_deduplication_id: Option<&'a str>,
}

/// Reply to a `SendMessage` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessageResponse {
    /// Id assigned to the message.
    #[serde(default)]
    pub message_id: Option<String>,
    /// MD5 digest of the body as received.
    #[serde(default, rename = "MD5OfMessageBody")]
    pub md5_of_message_body: Option<String>,
    /// Position within a FIFO group.
    #[serde(default)]
    pub sequence_number: Option<String>,
}

/// SQS API client.
pub struct QueuesApi {
    client: AwsClient,
}

impl QueuesApi {
    pub(crate) fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// Send one message.
    pub async fn send_message(
        &self,
        queue_url: &str,
        body: &str,
        options: &SendOptions,
    ) -> Result<SendMessageResponse> {
        let request = SendMessageRequest {
            queue_url,
            message_body: body,
            delay_seconds: options.delay_seconds,
            message_group_id: options.message_group_id.as_deref(),
            message_deduplication_id: options.deduplication_id.as_deref(),
        };
        let response: SendMessageResponse = self
            .client
            .call_json(self.client.sqs_endpoint(), SEND_MESSAGE, &request)
            .await?;
        debug!(
            queue_url,
            message_id = response.message_id.as_deref(),
            "Message accepted"
        );
        Ok(response)
    }
}

#[async_trait]
impl RetryQueue for AwsClient {
    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        options: &SendOptions,
    ) -> redrive_core::Result<SendAck> {
        let response = self
            .queues()
            .send_message(queue_url, body, options)
            .await
            .map_err(|e| RedriveError::Queue(e.to_string()))?;
        Ok(SendAck {
            message_id: response.message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fifo_request_shape() {
        let request = SendMessageRequest {
            queue_url: "https://sqs/q.fifo",
            message_body: "{}",
            delay_seconds: None,
            message_group_id: Some("step_function_error"),
            message_deduplication_id: Some("abc"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "QueueUrl": "https://sqs/q.fifo",
                "MessageBody": "{}",
                "MessageGroupId": "step_function_error",
                "MessageDeduplicationId": "abc"
            })
        );
    }

    #[test]
    fn test_response_parses() {
        let response: SendMessageResponse = serde_json::from_value(json!({
            "MessageId": "5fea7756-0ea4-451a-a703-a558b933e274",
            "MD5OfMessageBody": "fafb00f5732ab283681e124bf8747ed1"
        }))
        .unwrap();
        assert_eq!(
            response.message_id.as_deref(),
            Some("5fea7756-0ea4-451a-a703-a558b933e274")
        );
        assert!(response.md5_of_message_body.is_some());
        assert!(response.sequence_number.is_none());
    }
}
