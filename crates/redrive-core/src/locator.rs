//! Failure location over an execution's event log.
//!
//! Two backward walks over `previousEventId` pointers:
//!
//! 1. From the most recent event back to the nearest step failure.
//! 2. From that failure back to the entry event of the failing step, whose
//!    kind is fixed by [`FailureKind::entry_kind`].
//!
//! The entry event's recorded input becomes the [`FailureRecord`].

use serde_json::Value;
use tracing::debug;

use crate::error::HistoryError;
use crate::event::{EntryKind, Event, EventKind, FailureKind};
use crate::history::EventLog;
use crate::ledger::FailureRecord;

type Result<T> = std::result::Result<T, HistoryError>;

/// What the locator recovered from a history.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFailure {
    /// The failing step's input with `resumeState` set.
    pub record: FailureRecord,
    /// Kind of the failure event.
    pub failure_kind: FailureKind,
    /// Id of the failure event.
    pub failure_event_id: u64,
    /// Id of the failing step's entry event.
    pub entry_event_id: u64,
    /// Cause recorded on the failure event, if any.
    pub cause: Option<String>,
    /// Back-pointer lookups performed across both walks.
    pub lookups: usize,
}

/// Recovers the failing step and its input from an event log.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureLocator;

impl FailureLocator {
    /// Create a locator.
    pub fn new() -> Self {
        Self
    }

    /// Locate the most recent step failure and the input that caused it.
    pub fn locate(&self, log: &EventLog) -> Result<LocatedFailure> {
        let mut walk = Walk::new(log);

        let latest = log.latest().ok_or(HistoryError::Empty)?;
        let (failure, failure_kind) = walk.back_to_failure(latest)?;
        let entry_kind = failure_kind.entry_kind();
        let entry = walk.back_to_entry(failure, entry_kind)?;

        let details = entry
            .state_entered()
            .ok_or(HistoryError::MissingStateDetails(entry.id))?;
        let record = parse_input(entry.id, details.input.as_deref())?
            .with_resume_state(details.name);

        debug!(
            failure_event_id = failure.id,
            failure_kind = failure_kind.as_str(),
            entry_event_id = entry.id,
            resume_state = record.resume_state.as_deref(),
            lookups = walk.lookups,
            "Located failure"
        );

        Ok(LocatedFailure {
            record,
            failure_kind,
            failure_event_id: failure.id,
            entry_event_id: entry.id,
            cause: failure.cause().map(String::from),
            lookups: walk.lookups,
        })
    }
}

/// Backward traversal state, counting lookups.
struct Walk<'a> {
    log: &'a EventLog,
    lookups: usize,
}

impl<'a> Walk<'a> {
    fn new(log: &'a EventLog) -> Self {
        Self { log, lookups: 0 }
    }

    /// The event `event` points back to, or `None` at the root.
    fn previous(&mut self, event: &Event) -> Result<Option<&'a Event>> {
        if event.is_root() {
            return Ok(None);
        }
        if event.previous_event_id >= event.id {
            return Err(HistoryError::ForwardPointer {
                event_id: event.id,
                previous_event_id: event.previous_event_id,
            });
        }
        self.lookups += 1;
        self.log
            .get(event.previous_event_id)
            .map(Some)
            .ok_or(HistoryError::DanglingPointer {
                event_id: event.id,
                previous_event_id: event.previous_event_id,
            })
    }

    fn back_to_failure(&mut self, start: &'a Event) -> Result<(&'a Event, FailureKind)> {
        let mut current = start;
        loop {
            if let Some(kind) = current.kind.failure() {
                return Ok((current, kind));
            }
            current = self.previous(current)?.ok_or(HistoryError::NoFailureEvent)?;
        }
    }

    fn back_to_entry(&mut self, failure: &'a Event, entry_kind: EntryKind) -> Result<&'a Event> {
        let mut current = failure;
        loop {
            current = self
                .previous(current)?
                .ok_or_else(|| HistoryError::MissingEntryEvent {
                    failure_event_id: failure.id,
                    entry_kind: entry_kind.to_string(),
                })?;
            if current.kind == EventKind::Entry(entry_kind) {
                return Ok(current);
            }
        }
    }
}

fn parse_input(event_id: u64, input: Option<&str>) -> Result<FailureRecord> {
    let input = input.ok_or_else(|| HistoryError::InvalidInput {
        event_id,
        reason: "no input recorded".to_string(),
    })?;
    let value: Value = serde_json::from_str(input).map_err(|e| HistoryError::InvalidInput {
        event_id,
        reason: e.to_string(),
    })?;
    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(HistoryError::InvalidInput {
                event_id,
                reason: format!("expected an object, found {other}"),
            });
        }
    };
    Ok(FailureRecord::from_object(object))
}
