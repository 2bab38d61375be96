//! Failure recovery for workflow executions.
//!
//! When a workflow execution fails, this crate reads its event history,
//! finds the step that failed and the input it was given, and either sends
//! that input back to a retry queue or, once the retry budget for the step is
//! spent, notifies a human.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │  Dispatcher::handle(Invocation) -> Outcome          │
//! └────────────────────────────────────────────────────┘
//!        │            │             │            │
//!        ▼            ▼             ▼            ▼
//! ┌──────────────┐ ┌─────────┐ ┌──────────┐ ┌───────────┐
//! │EventLogFetch.│ │ Locator │ │  Ledger  │ │  Policy   │
//! └──────────────┘ └─────────┘ └──────────┘ └───────────┘
//!        │                                       │
//!        ▼                                       ▼
//!  HistorySource                      RetryQueue / Notifier
//! ```
//!
//! The three external seams ([`HistorySource`], [`RetryQueue`], [`Notifier`])
//! are traits; `redrive-client` implements them over HTTP and [`mock`]
//! provides in-memory versions.

pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod history;
pub mod ledger;
pub mod locator;
pub mod mock;
pub mod policy;
pub mod sink;

pub use diagnostics::{DiagnosticLinks, UNDETERMINED};
pub use dispatcher::{Dispatcher, DispatcherConfig, Invocation, Outcome};
pub use error::{HistoryError, RedriveError, Result};
pub use event::{EntryKind, Event, EventKind, FailureKind, StateEnteredDetails};
pub use history::{EventLog, EventLogFetcher, HistoryPage, HistorySource, SharedHistorySource};
pub use ledger::{FailureRecord, update_ledger};
pub use locator::{FailureLocator, LocatedFailure};
pub use policy::{Decision, RetryPolicy, decide};
pub use sink::{
    Notifier, PublishAck, RetryQueue, SendAck, SendOptions, SharedNotifier, SharedRetryQueue,
};
