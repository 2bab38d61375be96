//! Step Functions API.

use async_trait::async_trait;
use redrive_core::{HistoryError, HistoryPage, HistorySource, RedriveError};
use serde::Serialize;

use crate::client::AwsClient;
use crate::error::{Error, Result};

const GET_EXECUTION_HISTORY: &str = "AWSStepFunctions.GetExecutionHistory";

/// Largest page the service returns.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Body of a `GetExecutionHistory` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetExecutionHistoryRequest<'a> {
    /// The execution to read.
    pub execution_arn: &'a str,
    /// Continuation token from the previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<&'a str>,
    /// Page size.
    pub max_results: u32,
    /// Oldest events first.
    pub reverse_order: bool,
    /// Include state inputs and outputs.
    pub include_execution_data: bool,
}

/// Step Functions API client.
pub struct StatesApi {
    client: AwsClient,
}

impl StatesApi {
    pub(crate) fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// Fetch one page of an execution's history, oldest events first.
    pub async fn get_execution_history(
        &self,
        execution_arn: &str,
        next_token: Option<&str>,
    ) -> Result<HistoryPage> {
        let request = GetExecutionHistoryRequest {
            execution_arn,
            next_token,
            max_results: MAX_PAGE_SIZE,
            reverse_order: false,
            include_execution_data: true,
        };
        self.client
            .call_json(
                self.client.states_endpoint(),
                GET_EXECUTION_HISTORY,
                &request,
            )
            .await
    }
}

#[async_trait]
impl HistorySource for AwsClient {
    async fn get_history(
        &self,
        execution_arn: &str,
        next_token: Option<&str>,
    ) -> redrive_core::Result<HistoryPage> {
        self.states()
            .get_execution_history(execution_arn, next_token)
            .await
            .map_err(history_error)
    }
}

/// Classify a history call failure for the dispatcher.
///
/// Transient failures are re-driven without counting; an undecodable page
/// needs a human; anything else is a permanent rejection.
fn history_error(err: Error) -> RedriveError {
    match err {
        Error::Json(e) => HistoryError::UnreadablePage(e.to_string()).into(),
        e if e.is_transient() => RedriveError::UpstreamUnavailable(e.to_string()),
        e => RedriveError::HistoryRejected(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = GetExecutionHistoryRequest {
            execution_arn: "arn:x",
            next_token: None,
            max_results: MAX_PAGE_SIZE,
            reverse_order: false,
            include_execution_data: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "executionArn": "arn:x",
                "maxResults": 1000,
                "reverseOrder": false,
                "includeExecutionData": true
            })
        );
    }

    fn api(status: u16, code: &str) -> Error {
        Error::Api {
            status,
            code: code.to_string(),
            message: "m".to_string(),
        }
    }

    #[test]
    fn test_history_error_classification() {
        assert!(history_error(api(400, "ThrottlingException")).is_upstream());
        assert!(history_error(api(500, "InternalFailure")).is_upstream());
        assert!(matches!(
            history_error(api(400, "ExecutionDoesNotExist")),
            RedriveError::HistoryRejected(ref m) if m.contains("ExecutionDoesNotExist")
        ));
        assert!(matches!(
            history_error(Error::Config("x".to_string())),
            RedriveError::HistoryRejected(_)
        ));

        let decode = serde_json::from_str::<HistoryPage>(r#"{"events": [{"id": 1}]}"#).unwrap_err();
        assert!(matches!(
            history_error(Error::Json(decode)),
            RedriveError::MalformedHistory(HistoryError::UnreadablePage(_))
        ));
    }
}
