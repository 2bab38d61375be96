//! SNS API.

use async_trait::async_trait;
use redrive_core::{Notifier, PublishAck, RedriveError};

use crate::client::{AwsClient, xml_text};
use crate::error::Result;

const API_VERSION: &str = "2010-03-31";

/// SNS API client.
pub struct TopicsApi {
    client: AwsClient,
}

impl TopicsApi {
    pub(crate) fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// Publish a message, returning the assigned message id.
    pub async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> Result<Option<String>> {
        let mut params = vec![
            ("Action", "Publish"),
            ("Version", API_VERSION),
            ("TopicArn", topic_arn),
            ("Message", message),
        ];
        if let Some(subject) = subject {
            params.push(("Subject", subject));
        }

        let body = self
            .client
            .call_query(self.client.sns_endpoint(), &params)
            .await?;
        Ok(xml_text(&body, "MessageId"))
    }
}

#[async_trait]
impl Notifier for AwsClient {
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> redrive_core::Result<PublishAck> {
        let message_id = self
            .topics()
            .publish(topic_arn, message, subject)
            .await
            .map_err(|e| RedriveError::Notify(e.to_string()))?;
        Ok(PublishAck { message_id })
    }
}
