//! Execution history events.
//!
//! Events arrive in the orchestrator's JSON shape:
//!
//! ```json
//! {
//!   "id": 2,
//!   "previousEventId": 1,
//!   "type": "TaskStateEntered",
//!   "timestamp": 1700000000.123,
//!   "stateEnteredEventDetails": { "name": "someState", "input": "{\"value\": 3}" }
//! }
//! ```
//!
//! Only the event kinds the failure locator reasons about are modelled as
//! variants; every other type is kept as [`EventKind::Other`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Event types that mark the failure of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    LambdaFunctionFailed,
    LambdaFunctionTimedOut,
    LambdaFunctionStartFailed,
    LambdaFunctionScheduleFailed,
    TaskFailed,
    TaskTimedOut,
    TaskStartFailed,
    TaskSubmitFailed,
    ActivityFailed,
    ActivityTimedOut,
    ActivityScheduleFailed,
    MapIterationFailed,
    MapStateFailed,
    MapRunFailed,
    ParallelStateFailed,
}

impl FailureKind {
    /// Every failure kind, in declaration order.
    pub const ALL: [FailureKind; 15] = [
        FailureKind::LambdaFunctionFailed,
        FailureKind::LambdaFunctionTimedOut,
        FailureKind::LambdaFunctionStartFailed,
        FailureKind::LambdaFunctionScheduleFailed,
        FailureKind::TaskFailed,
        FailureKind::TaskTimedOut,
        FailureKind::TaskStartFailed,
        FailureKind::TaskSubmitFailed,
        FailureKind::ActivityFailed,
        FailureKind::ActivityTimedOut,
        FailureKind::ActivityScheduleFailed,
        FailureKind::MapIterationFailed,
        FailureKind::MapStateFailed,
        FailureKind::MapRunFailed,
        FailureKind::ParallelStateFailed,
    ];

    /// The entry event that began the step this failure belongs to.
    pub fn entry_kind(self) -> EntryKind {
        match self {
            FailureKind::LambdaFunctionFailed
            | FailureKind::LambdaFunctionTimedOut
            | FailureKind::LambdaFunctionStartFailed
            | FailureKind::LambdaFunctionScheduleFailed
            | FailureKind::TaskFailed
            | FailureKind::TaskTimedOut
            | FailureKind::TaskStartFailed
            | FailureKind::TaskSubmitFailed
            | FailureKind::ActivityFailed
            | FailureKind::ActivityTimedOut
            | FailureKind::ActivityScheduleFailed => EntryKind::TaskStateEntered,
            FailureKind::MapIterationFailed
            | FailureKind::MapStateFailed
            | FailureKind::MapRunFailed => EntryKind::MapStateEntered,
            FailureKind::ParallelStateFailed => EntryKind::ParallelStateEntered,
        }
    }

    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::LambdaFunctionFailed => "LambdaFunctionFailed",
            FailureKind::LambdaFunctionTimedOut => "LambdaFunctionTimedOut",
            FailureKind::LambdaFunctionStartFailed => "LambdaFunctionStartFailed",
            FailureKind::LambdaFunctionScheduleFailed => "LambdaFunctionScheduleFailed",
            FailureKind::TaskFailed => "TaskFailed",
            FailureKind::TaskTimedOut => "TaskTimedOut",
            FailureKind::TaskStartFailed => "TaskStartFailed",
            FailureKind::TaskSubmitFailed => "TaskSubmitFailed",
            FailureKind::ActivityFailed => "ActivityFailed",
            FailureKind::ActivityTimedOut => "ActivityTimedOut",
            FailureKind::ActivityScheduleFailed => "ActivityScheduleFailed",
            FailureKind::MapIterationFailed => "MapIterationFailed",
            FailureKind::MapStateFailed => "MapStateFailed",
            FailureKind::MapRunFailed => "MapRunFailed",
            FailureKind::ParallelStateFailed => "ParallelStateFailed",
        }
    }
}

/// Event types that mark a step being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    TaskStateEntered,
    MapStateEntered,
    ParallelStateEntered,
}

impl EntryKind {
    /// Every entry kind, in declaration order.
    pub const ALL: [EntryKind; 3] = [
        EntryKind::TaskStateEntered,
        EntryKind::MapStateEntered,
        EntryKind::ParallelStateEntered,
    ];

    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::TaskStateEntered => "TaskStateEntered",
            EntryKind::MapStateEntered => "MapStateEntered",
            EntryKind::ParallelStateEntered => "ParallelStateEntered",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `type` of a history event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A step failed.
    Failure(FailureKind),
    /// A step was entered.
    Entry(EntryKind),
    /// Any other event type, including execution-level failures.
    Other(String),
}

impl EventKind {
    /// The wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Failure(kind) => kind.as_str(),
            EventKind::Entry(kind) => kind.as_str(),
            EventKind::Other(name) => name,
        }
    }

    /// The failure kind, if this event is a step failure.
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            EventKind::Failure(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        if let Some(kind) = FailureKind::ALL.iter().find(|k| k.as_str() == name) {
            return EventKind::Failure(*kind);
        }
        if let Some(kind) = EntryKind::ALL.iter().find(|k| k.as_str() == name) {
            return EventKind::Entry(*kind);
        }
        EventKind::Other(name.to_string())
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::from(name.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// One entry in an execution's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique, increasing id within the execution.
    pub id: u64,
    /// Id of the event this one follows; `0` for the root.
    #[serde(default)]
    pub previous_event_id: u64,
    /// Event type.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// When the event was recorded. Informational only; ids define order.
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Type-specific detail blocks, e.g. `stateEnteredEventDetails`.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Details recorded when a state is entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEnteredDetails {
    /// Name of the state.
    pub name: String,
    /// The state's input as a JSON-encoded string.
    #[serde(default)]
    pub input: Option<String>,
}

impl Event {
    /// Create an event with no details.
    pub fn new(id: u64, previous_event_id: u64, kind: impl Into<EventKind>) -> Self {
        Self {
            id,
            previous_event_id,
            kind: kind.into(),
            timestamp: None,
            details: Map::new(),
        }
    }

    /// Attach a detail block.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    /// Whether this is the first event of the execution.
    pub fn is_root(&self) -> bool {
        self.previous_event_id == 0
    }

    /// The state-entered details, if present and well formed.
    pub fn state_entered(&self) -> Option<StateEnteredDetails> {
        self.details
            .get("stateEnteredEventDetails")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The failure cause recorded in any detail block.
    ///
    /// Prefers `cause`, falling back to `error`.
    pub fn cause(&self) -> Option<&str> {
        let field = |name: &str| {
            self.details
                .values()
                .filter_map(Value::as_object)
                .find_map(|block| block.get(name).and_then(Value::as_str))
        };
        field("cause").or_else(|| field("error"))
    }
}

/// Timestamps as epoch seconds (AWS JSON protocol) or RFC 3339 strings.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use serde_json::Value;

    pub(super) fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                let secs = n
                    .as_f64()
                    .ok_or_else(|| D::Error::custom("timestamp out of range"))?;
                let whole = secs.trunc() as i64;
                let nanos = ((secs.fract() * 1e9).round() as u32).min(999_999_999);
                DateTime::<Utc>::from_timestamp(whole, nanos)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid epoch timestamp {secs}")))
            }
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(D::Error::custom),
            Some(other) => Err(D::Error::custom(format!(
                "expected timestamp, found {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_failure_kind_has_an_entry() {
        for kind in FailureKind::ALL {
            let entry = kind.entry_kind();
            assert!(EntryKind::ALL.contains(&entry), "{kind:?}");
        }
        assert_eq!(
            FailureKind::MapIterationFailed.entry_kind(),
            EntryKind::MapStateEntered
        );
        assert_eq!(
            FailureKind::LambdaFunctionFailed.entry_kind(),
            EntryKind::TaskStateEntered
        );
        assert_eq!(
            FailureKind::ParallelStateFailed.entry_kind(),
            EntryKind::ParallelStateEntered
        );
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(
            EventKind::from("TaskFailed"),
            EventKind::Failure(FailureKind::TaskFailed)
        );
        assert_eq!(
            EventKind::from("MapStateEntered"),
            EventKind::Entry(EntryKind::MapStateEntered)
        );
        assert_eq!(
            EventKind::from("ExecutionFailed"),
            EventKind::Other("ExecutionFailed".to_string())
        );
        for kind in FailureKind::ALL {
            assert_eq!(EventKind::from(kind.as_str()).failure(), Some(kind));
        }
    }

    #[test]
    fn test_deserialize_event() {
        let event: Event = serde_json::from_value(json!({
            "timestamp": 1700000000.5,
            "id": 2,
            "previousEventId": 1,
            "type": "TaskStateEntered",
            "stateEnteredEventDetails": {
                "name": "someState",
                "input": "{\"value\": \"3\"}"
            }
        }))
        .unwrap();

        assert_eq!(event.id, 2);
        assert_eq!(event.previous_event_id, 1);
        assert_eq!(event.kind, EventKind::Entry(EntryKind::TaskStateEntered));
        let ts = event.timestamp.unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);

        let details = event.state_entered().unwrap();
        assert_eq!(details.name, "someState");
        assert_eq!(details.input.as_deref(), Some("{\"value\": \"3\"}"));
    }

    #[test]
    fn test_deserialize_rfc3339_timestamp_and_missing_pointer() {
        let event: Event = serde_json::from_value(json!({
            "timestamp": "2375-05-06T17:20:33Z",
            "id": 1,
            "type": "ExecutionStarted",
            "executionStartedEventDetails": {"input": "{}"}
        }))
        .unwrap();
        assert!(event.is_root());
        assert_eq!(event.timestamp.unwrap().to_rfc3339(), "2375-05-06T17:20:33+00:00");
        assert!(event.state_entered().is_none());
    }

    #[test]
    fn test_unknown_kind_round_trips() {
        let event = Event::new(7, 6, "WaitStateEntered");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "WaitStateEntered");
        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_cause_prefers_cause_over_error() {
        let event = Event::new(3, 2, "LambdaFunctionFailed").with_detail(
            "lambdaFunctionFailedEventDetails",
            json!({"error": "ValueError", "cause": "{\"errorMessage\": \"bad\"}"}),
        );
        assert_eq!(event.cause(), Some("{\"errorMessage\": \"bad\"}"));

        let timeout = Event::new(3, 2, "LambdaFunctionTimedOut").with_detail(
            "lambdaFunctionTimedOutEventDetails",
            json!({"error": "States.Timeout"}),
        );
        assert_eq!(timeout.cause(), Some("States.Timeout"));

        assert_eq!(Event::new(1, 0, "ExecutionStarted").cause(), None);
    }
}
