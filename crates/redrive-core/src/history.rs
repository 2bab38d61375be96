//! Execution history retrieval.
//!
//! [`HistorySource`] is the seam to the orchestrator's paginated history API.
//! [`EventLogFetcher`] drains every page into one [`EventLog`], an arena of
//! events indexed by id so back-pointer walks are map lookups.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HistoryError, Result};
use crate::event::Event;

/// One page of history as returned by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    /// Events on this page, in log order.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Continuation token; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Access to an orchestrator's execution history.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Fetch one page of history.
    ///
    /// Implementations report every API failure as
    /// [`RedriveError::UpstreamUnavailable`](crate::RedriveError::UpstreamUnavailable).
    async fn get_history(&self, execution_arn: &str, next_token: Option<&str>)
    -> Result<HistoryPage>;
}

/// Shared history source.
pub type SharedHistorySource = Arc<dyn HistorySource>;

// ─────────────────────────────────────────────────────────────────────────────
// EventLog
// ─────────────────────────────────────────────────────────────────────────────

/// An execution's complete history.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
    index: HashMap<u64, usize>,
}

impl EventLog {
    /// Build a log from events in log order.
    pub fn new(events: Vec<Event>) -> std::result::Result<Self, HistoryError> {
        let mut index = HashMap::with_capacity(events.len());
        for (position, event) in events.iter().enumerate() {
            if index.insert(event.id, position).is_some() {
                return Err(HistoryError::DuplicateEventId(event.id));
            }
        }
        Ok(Self { events, index })
    }

    /// Look up an event by id.
    pub fn get(&self, id: u64) -> Option<&Event> {
        self.index.get(&id).map(|&position| &self.events[position])
    }

    /// The most recent event (highest id).
    pub fn latest(&self) -> Option<&Event> {
        self.events.iter().max_by_key(|e| e.id)
    }

    /// Events in log order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Collects an execution's full history across pages.
#[derive(Clone)]
pub struct EventLogFetcher {
    source: SharedHistorySource,
}

impl EventLogFetcher {
    /// Create a fetcher over the given source.
    pub fn new(source: SharedHistorySource) -> Self {
        Self { source }
    }

    /// Fetch every page of history for an execution.
    ///
    /// Always makes at least one request. Source errors are returned as-is;
    /// there is no local retry.
    pub async fn fetch(&self, execution_arn: &str) -> Result<EventLog> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .source
                .get_history(execution_arn, next_token.as_deref())
                .await?;
            pages += 1;
            debug!(
                execution_arn,
                page = pages,
                events = page.events.len(),
                "Fetched history page"
            );

            events.extend(page.events);
            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!(execution_arn, pages, events = events.len(), "History complete");
        Ok(EventLog::new(events)?)
    }
}

impl std::fmt::Debug for EventLogFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogFetcher").finish_non_exhaustive()
    }
}
