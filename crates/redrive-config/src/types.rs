//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [queue]
//! url = "https://sqs.us-west-2.amazonaws.com/123456789012/retries"
//! terminal_url = "https://sqs.us-west-2.amazonaws.com/123456789012/dead"
//! delay_min_secs = 300
//! delay_max_secs = 900
//!
//! [notify]
//! topic_arn = "arn:aws:sns:us-west-2:123456789012:failures"
//!
//! [retry]
//! max_retries = 4
//!
//! [aws]
//! region = "us-west-2"
//! stage = "prod"
//! states_endpoint = "http://localhost:8083"
//! sqs_endpoint = "http://localhost:4566"
//! sns_endpoint = "http://localhost:4566"
//!
//! [logging]
//! level = "info"
//! ```

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default retry budget before a failure is escalated.
pub const DEFAULT_MAX_RETRIES: u32 = 4;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default lower bound of the retry delay window, in seconds.
pub const DEFAULT_DELAY_MIN_SECS: u32 = 300;

/// Default upper bound of the retry delay window, in seconds.
pub const DEFAULT_DELAY_MAX_SECS: u32 = 900;

/// Largest per-message delay the queue service accepts.
pub const MAX_QUEUE_DELAY_SECS: u32 = 900;

/// Default FIFO message group.
pub const DEFAULT_MESSAGE_GROUP_ID: &str = "step_function_error";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every section has defaults so partial files parse; required values are
/// checked by [`RedriveConfig::validate`] once all layers are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedriveConfig {
    /// Retry and archive queues.
    pub queue: QueueConfig,
    /// Escalation notifications.
    pub notify: NotifyConfig,
    /// Retry budget.
    pub retry: RetryConfig,
    /// Region, stage and endpoints.
    pub aws: AwsConfig,
    /// Log verbosity.
    pub logging: LoggingConfig,
}

impl RedriveConfig {
    /// Create a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load and parse a TOML file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Check that every value the handler needs is present and coherent.
    pub fn validate(&self) -> Result<()> {
        self.queue_url()?;
        self.topic_arn()?;
        self.aws.states_endpoint()?;
        self.aws.sqs_endpoint()?;
        self.aws.sns_endpoint()?;

        if self.queue.delay_min_secs > self.queue.delay_max_secs {
            return Err(ConfigError::InvalidValue {
                field: "queue.delay_min_secs".to_string(),
                message: format!(
                    "{} is greater than delay_max_secs ({})",
                    self.queue.delay_min_secs, self.queue.delay_max_secs
                ),
            });
        }
        if self.queue.delay_max_secs > MAX_QUEUE_DELAY_SECS {
            return Err(ConfigError::InvalidValue {
                field: "queue.delay_max_secs".to_string(),
                message: format!("must not exceed {MAX_QUEUE_DELAY_SECS} seconds"),
            });
        }
        Ok(())
    }

    /// The retry queue URL.
    pub fn queue_url(&self) -> Result<&str> {
        self.queue
            .url
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "url".to_string(),
                section: "queue".to_string(),
                env_var: crate::env::QUEUE_URL.to_string(),
            })
    }

    /// The escalation topic ARN.
    pub fn topic_arn(&self) -> Result<&str> {
        self.notify
            .topic_arn
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "topic_arn".to_string(),
                section: "notify".to_string(),
                env_var: crate::env::TOPIC_ARN.to_string(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue that receives records to retry.
    pub url: Option<String>,
    /// Optional archive queue that also receives escalated records.
    pub terminal_url: Option<String>,
    /// Lower bound of the randomized retry delay.
    pub delay_min_secs: u32,
    /// Upper bound of the randomized retry delay.
    pub delay_max_secs: u32,
    /// Message group used when the queue is FIFO.
    pub message_group_id: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            terminal_url: None,
            delay_min_secs: DEFAULT_DELAY_MIN_SECS,
            delay_max_secs: DEFAULT_DELAY_MAX_SECS,
            message_group_id: DEFAULT_MESSAGE_GROUP_ID.to_string(),
        }
    }
}

impl QueueConfig {
    /// The inclusive retry delay window.
    pub fn delay_range(&self) -> RangeInclusive<u32> {
        self.delay_min_secs..=self.delay_max_secs
    }
}

/// Notification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Topic that receives escalations.
    pub topic_arn: Option<String>,
}

/// Retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Failures on the same state tolerated before escalating.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Deployment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Deployment region, used to build console links.
    pub region: String,
    /// Deploy stage, used to build log links.
    pub stage: Option<String>,
    /// Step Functions endpoint (a signing proxy or emulator).
    pub states_endpoint: Option<String>,
    /// SQS endpoint.
    pub sqs_endpoint: Option<String>,
    /// SNS endpoint.
    pub sns_endpoint: Option<String>,
}

impl AwsConfig {
    /// The Step Functions endpoint.
    pub fn states_endpoint(&self) -> Result<&str> {
        required_endpoint(&self.states_endpoint, "states_endpoint", crate::env::STATES_ENDPOINT)
    }

    /// The SQS endpoint.
    pub fn sqs_endpoint(&self) -> Result<&str> {
        required_endpoint(&self.sqs_endpoint, "sqs_endpoint", crate::env::SQS_ENDPOINT)
    }

    /// The SNS endpoint.
    pub fn sns_endpoint(&self) -> Result<&str> {
        required_endpoint(&self.sns_endpoint, "sns_endpoint", crate::env::SNS_ENDPOINT)
    }
}

fn required_endpoint<'a>(value: &'a Option<String>, field: &str, env_var: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: field.to_string(),
            section: "aws".to_string(),
            env_var: env_var.to_string(),
        })
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            stage: None,
            states_endpoint: None,
            sqs_endpoint: None,
            sns_endpoint: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `redrive_core=debug,info`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
