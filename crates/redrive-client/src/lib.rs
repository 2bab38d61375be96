//! HTTP clients for the services a failure handler talks to.
//!
//! [`AwsClient`] speaks to Step Functions (execution history), SQS (retry
//! queue) and SNS (escalations), and implements the matching
//! `redrive-core` seams so it can be handed straight to a
//! [`Dispatcher`](redrive_core::Dispatcher).
//!
//! Requests are unsigned and every endpoint must be configured; there is
//! no fallback to the public service endpoints.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use redrive_client::AwsClient;
//! use redrive_core::{Dispatcher, DispatcherConfig};
//!
//! # fn example() -> redrive_client::Result<()> {
//! let client = Arc::new(
//!     AwsClient::builder()
//!         .states_endpoint("http://localhost:8083")
//!         .sqs_endpoint("http://localhost:4566")
//!         .sns_endpoint("http://localhost:4566")
//!         .build()?,
//! );
//! let dispatcher = Dispatcher::new(
//!     client.clone(),
//!     client.clone(),
//!     client,
//!     DispatcherConfig::new(
//!         "https://sqs.us-west-2.amazonaws.com/123456789012/retry",
//!         "arn:aws:sns:us-west-2:123456789012:failures",
//!     ),
//! );
//! # let _ = dispatcher;
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Step Functions**: `GetExecutionHistory` (JSON 1.0 protocol)
//! - **SQS**: `SendMessage` (JSON 1.0 protocol)
//! - **SNS**: `Publish` (query protocol)

pub mod api;
pub mod client;
pub mod error;

pub use api::{QueuesApi, SendMessageRequest, SendMessageResponse, StatesApi, TopicsApi};
pub use client::{AwsClient, ClientBuilder};
pub use error::{Error, Result};
