//! Escalation messages.
//!
//! Each diagnostic link is extracted on its own; a missing field only
//! replaces that one link with [`UNDETERMINED`].

use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use crate::ledger::FailureRecord;

/// Placeholder for a link whose inputs are missing.
pub const UNDETERMINED: &str = "could not be determined";

/// Longest subject the notification service accepts.
pub const MAX_SUBJECT_LEN: usize = 100;

/// Links that help a human investigate an escalated failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLinks {
    /// Console page for the failed execution.
    pub execution: Option<String>,
    /// Console page for the object the record was processing.
    pub source_object: Option<String>,
    /// Console page for the failing step's log group.
    pub logs: Option<String>,
}

impl DiagnosticLinks {
    /// Collect every link that can be derived.
    pub fn collect(
        execution_arn: &str,
        record: &FailureRecord,
        region: &str,
        stage: Option<&str>,
    ) -> Self {
        Self {
            execution: execution_link(execution_arn, region),
            source_object: source_object_link(record, region),
            logs: log_group_link(record, region, stage),
        }
    }
}

fn encode(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

fn execution_link(execution_arn: &str, region: &str) -> Option<String> {
    if execution_arn.is_empty() || region.is_empty() {
        return None;
    }
    Some(format!(
        "https://{region}.console.aws.amazon.com/states/home?region={region}#/executions/details/{execution_arn}"
    ))
}

/// Bucket and key from `bucket` + `key`, or from an `s3://` `sourceFile`.
fn source_object(record: &FailureRecord) -> Option<(String, String)> {
    let text = |key: &str| record.field(key).and_then(Value::as_str).filter(|s| !s.is_empty());

    if let (Some(bucket), Some(key)) = (text("bucket"), text("key")) {
        return Some((bucket.to_string(), key.to_string()));
    }

    let (bucket, key) = text("sourceFile")?.strip_prefix("s3://")?.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket.to_string(), key.to_string()))
}

fn source_object_link(record: &FailureRecord, region: &str) -> Option<String> {
    let (bucket, key) = source_object(record)?;
    Some(format!(
        "https://s3.console.aws.amazon.com/s3/object/{bucket}?region={region}&prefix={}",
        encode(&key)
    ))
}

/// Log group `/aws/lambda/<stage>-<resumeState>`.
fn log_group_link(record: &FailureRecord, region: &str, stage: Option<&str>) -> Option<String> {
    let stage = stage.filter(|s| !s.is_empty())?;
    let state = record.resume_state.as_deref().filter(|s| !s.is_empty())?;
    // The console expects the group name percent-encoded twice, with `%` written as `$25`.
    let group = encode(&format!("/aws/lambda/{stage}-{state}")).replace('%', "$25");
    Some(format!(
        "https://{region}.console.aws.amazon.com/cloudwatch/home?region={region}#logsV2:log-groups/log-group/{group}"
    ))
}

/// Pretty-print a JSON cause; anything else is returned unchanged.
pub fn format_cause(cause: &str) -> String {
    serde_json::from_str::<Value>(cause)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| cause.to_string())
}

/// Body of an escalation notification.
pub fn escalation_message(
    execution_arn: &str,
    record: &FailureRecord,
    cause: Option<&str>,
    links: &DiagnosticLinks,
) -> serde_json::Result<String> {
    let pretty_record = serde_json::to_string_pretty(record)?;
    let state = record.resume_state.as_deref().unwrap_or(UNDETERMINED);
    let cause = cause.map_or_else(|| UNDETERMINED.to_string(), format_cause);
    let link = |l: &Option<String>| l.clone().unwrap_or_else(|| UNDETERMINED.to_string());

    Ok(format!(
        "Execution {execution_arn} has failed {count} time(s) in state '{state}' and will not be retried.\n\
         \n\
         Failure record:\n\
         {pretty_record}\n\
         \n\
         Cause:\n\
         {cause}\n\
         \n\
         Execution: {execution}\n\
         Source object: {source}\n\
         Logs: {logs}\n",
        count = record.fail_count(),
        execution = link(&links.execution),
        source = link(&links.source_object),
        logs = link(&links.logs),
    ))
}

/// Subject of an escalation notification.
pub fn escalation_subject(execution_arn: &str) -> String {
    truncate_subject(&format!("Excessive Failures Reported on {execution_arn}"))
}

/// Body of the notification sent when a history cannot be interpreted.
pub fn investigation_message(execution_arn: &str, reason: &str) -> String {
    format!(
        "Execution {execution_arn} failed, but its history could not be interpreted: {reason}.\n\
         The input was not re-queued. Human investigation is required.\n"
    )
}

/// Subject of the notification sent when a history cannot be interpreted.
pub fn investigation_subject(execution_arn: &str) -> String {
    truncate_subject(&format!("Unreadable Execution History for {execution_arn}"))
}

fn truncate_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_LEN).collect()
}
