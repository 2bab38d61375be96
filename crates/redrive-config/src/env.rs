//! Environment overlay.
//!
//! Variables that are set and non-empty override the corresponding config
//! value. Unset or empty variables leave the file (or default) value alone.

use std::str::FromStr;

use crate::{ConfigError, RedriveConfig, Result};

/// Retry queue URL.
pub const QUEUE_URL: &str = "AWS_SQS_QUEUE_URL";
/// Terminal archive queue URL.
pub const TERMINAL_QUEUE_URL: &str = "AWS_SQS_TERMINAL_QUEUE_URL";
/// Escalation topic ARN.
pub const TOPIC_ARN: &str = "AWS_SNS_TOPIC_ARN";
/// Deployment region.
pub const REGION: &str = "AWS_DEPLOYMENT_REGION";
/// Retry budget.
pub const MAX_RETRIES: &str = "MAX_RETRIES";
/// Deploy stage.
pub const STAGE: &str = "STAGE";
/// Log filter.
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Lower bound of the retry delay window.
pub const DELAY_MIN_SECS: &str = "RETRY_DELAY_MIN_SECS";
/// Upper bound of the retry delay window.
pub const DELAY_MAX_SECS: &str = "RETRY_DELAY_MAX_SECS";
/// Step Functions endpoint.
pub const STATES_ENDPOINT: &str = "STATES_ENDPOINT";
/// SQS endpoint.
pub const SQS_ENDPOINT: &str = "SQS_ENDPOINT";
/// SNS endpoint.
pub const SNS_ENDPOINT: &str = "SNS_ENDPOINT";

/// Overlay the process environment onto `config`.
pub fn apply_env(config: &mut RedriveConfig) -> Result<()> {
    apply_env_with(config, |name| std::env::var(name).ok())
}

/// Overlay values from `lookup` onto `config`.
///
/// `lookup` maps a variable name to its value; tests pass a map-backed
/// closure instead of touching the process environment.
pub fn apply_env_with<F>(config: &mut RedriveConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(QUEUE_URL) {
        config.queue.url = Some(v);
    }
    if let Some(v) = get(TERMINAL_QUEUE_URL) {
        config.queue.terminal_url = Some(v);
    }
    if let Some(v) = get(TOPIC_ARN) {
        config.notify.topic_arn = Some(v);
    }
    if let Some(v) = get(REGION) {
        config.aws.region = v;
    }
    if let Some(v) = get(STAGE) {
        config.aws.stage = Some(v);
    }
    if let Some(v) = get(LOG_LEVEL) {
        config.logging.level = v;
    }
    if let Some(v) = get(STATES_ENDPOINT) {
        config.aws.states_endpoint = Some(v);
    }
    if let Some(v) = get(SQS_ENDPOINT) {
        config.aws.sqs_endpoint = Some(v);
    }
    if let Some(v) = get(SNS_ENDPOINT) {
        config.aws.sns_endpoint = Some(v);
    }
    if let Some(v) = get(MAX_RETRIES) {
        config.retry.max_retries = parse_number(MAX_RETRIES, &v)?;
    }
    if let Some(v) = get(DELAY_MIN_SECS) {
        config.queue.delay_min_secs = parse_number(DELAY_MIN_SECS, &v)?;
    }
    if let Some(v) = get(DELAY_MAX_SECS) {
        config.queue.delay_max_secs = parse_number(DELAY_MAX_SECS, &v)?;
    }
    Ok(())
}

fn parse_number<T>(field: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("'{value}': {e}"),
        })
}
