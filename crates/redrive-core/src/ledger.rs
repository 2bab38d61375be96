//! The failure record and its retry ledger.
//!
//! A [`FailureRecord`] is the failing step's original input plus three
//! ledger keys that travel with it through the retry queue:
//!
//! - `resumeState`: the step that failed
//! - `stepFunctionFails`: consecutive failures on that step
//! - `previousExecutions`: executions that failed carrying this input
//!
//! Updates are pure: [`update_ledger`] consumes a record and returns the
//! next one.
//!
//! Parsing is lenient: a ledger key of the wrong type (say
//! `"stepFunctionFails": "2"`) is dropped and treated as absent rather than
//! failing the whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// A failed step's input with its retry ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Map<String, Value>")]
pub struct FailureRecord {
    /// Name of the step entered right before the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<String>,

    /// Consecutive failures on `resume_state`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_function_fails: Option<u32>,

    /// Executions that failed while carrying this input, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_executions: Option<Vec<String>>,

    /// Every other key of the original input.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FailureRecord {
    /// Build a record from a JSON object, lifting any ledger keys out of it.
    ///
    /// Ledger keys holding a value of the wrong type are discarded.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        Self {
            resume_state: take_ledger_key(&mut object, "resumeState"),
            step_function_fails: take_ledger_key(&mut object, "stepFunctionFails"),
            previous_executions: take_ledger_key(&mut object, "previousExecutions"),
            fields: object,
        }
    }

    /// Set the resume state.
    pub fn with_resume_state(mut self, state: impl Into<String>) -> Self {
        self.resume_state = Some(state.into());
        self
    }

    /// The failure count, treating an absent count as zero.
    pub fn fail_count(&self) -> u32 {
        self.step_function_fails.unwrap_or(0)
    }

    /// Look up a non-ledger field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Fill ledger keys missing from this record from `previous`.
    ///
    /// The located record comes from the failing state's input; a workflow
    /// that drops the ledger keys between states would otherwise reset the
    /// count every cycle.
    pub fn inherit_ledger(mut self, previous: &FailureRecord) -> Self {
        if self.step_function_fails.is_none() {
            self.step_function_fails = previous.step_function_fails;
        }
        if self.previous_executions.is_none() {
            self.previous_executions = previous.previous_executions.clone();
        }
        self
    }

    /// Serialize to the JSON body published to queues.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Map<String, Value>> for FailureRecord {
    fn from(object: Map<String, Value>) -> Self {
        Self::from_object(object)
    }
}

fn take_ledger_key<T: DeserializeOwned>(object: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = object.shift_remove(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Ignoring ledger key with unexpected type");
            None
        }
    }
}

/// Record one more failure against `record`.
///
/// When the record's `resume_state` equals `previous_resume_state` the count
/// is incremented (from 1 if absent); otherwise it resets to 1. An absent
/// previous state always resets. `current_execution` is appended to the
/// lineage unless the lineage already holds it.
pub fn update_ledger(
    mut record: FailureRecord,
    current_execution: &str,
    previous_resume_state: Option<&str>,
) -> FailureRecord {
    let same_state = match (record.resume_state.as_deref(), previous_resume_state) {
        (Some(current), Some(previous)) => current == previous,
        _ => false,
    };

    record.step_function_fails = Some(if same_state {
        record.step_function_fails.map_or(1, |n| n.saturating_add(1))
    } else {
        1
    });

    let lineage = record.previous_executions.get_or_insert_with(Vec::new);
    if !lineage.iter().any(|e| e == current_execution) {
        lineage.push(current_execution.to_string());
    }

    record
}
