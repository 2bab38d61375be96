//! One dispatch from configuration to result.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redrive_client::AwsClient;
use redrive_config::RedriveConfig;
use redrive_core::{Dispatcher, DispatcherConfig, Invocation};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::info;

/// Load the config file (if any), overlay the environment and validate.
pub fn load_config(path: Option<&Path>) -> Result<RedriveConfig> {
    let mut config = match path {
        Some(path) => RedriveConfig::load_file(path)?,
        None => RedriveConfig::new(),
    };
    redrive_config::apply_env(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Read an invocation from a file path, or stdin for `-`.
pub async fn read_invocation(source: &str) -> Result<Invocation> {
    let raw = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read invocation from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read invocation from {source}"))?
    };
    parse_invocation(&raw)
}

fn parse_invocation(raw: &str) -> Result<Invocation> {
    let invocation: Invocation =
        serde_json::from_str(raw).context("Invocation is not valid JSON")?;
    if invocation.execution_arn.trim().is_empty() {
        anyhow::bail!("Invocation is missing executionArn");
    }
    Ok(invocation)
}

/// Handle one invocation, returning the JSON to hand back to the caller.
pub async fn run(source: &str, config: &RedriveConfig) -> Result<Value> {
    let invocation = read_invocation(source).await?;

    let client = Arc::new(AwsClient::from_config(&config.aws).context("Failed to build client")?);
    let dispatcher = Dispatcher::new(
        client.clone(),
        client.clone(),
        client,
        DispatcherConfig::from_config(config)?,
    );

    let outcome = dispatcher
        .handle(&invocation)
        .await
        .with_context(|| format!("Failed to handle {}", invocation.execution_arn))?;
    info!(
        execution_arn = %invocation.execution_arn,
        outcome = outcome.as_str(),
        "Invocation handled"
    );
    Ok(outcome.into_json()?)
}
