//! Task and Subtask entities.
//!
//! The wire shape follows the Remote Task Service: camelCase JSON, `subtasks`
//! may be missing, and `date` is either a plain calendar day or a full
//! timestamp whose time-of-day we drop.

use chrono::{DateTime, NaiveDate};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use super::ids::{SubtaskId, TaskId};
use super::title::Title;

/// Top-level to-do entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(deserialize_with = "deserialize_day")]
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    /// Display order is insertion order.
    #[serde(default, deserialize_with = "deserialize_subtasks")]
    pub subtasks: Vec<Subtask>,
    /// Position last persisted by the service. The store's order is what
    /// counts locally; this is informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl Task {
    /// Optimistic task used while the create request is in flight.
    pub fn draft(id: TaskId, title: &Title, date: NaiveDate) -> Self {
        Self {
            id,
            title: title.as_str().to_string(),
            date,
            completed: false,
            subtasks: Vec::new(),
            position: None,
        }
    }

    pub fn subtask(&self, id: &SubtaskId) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| &s.id == id)
    }

    pub fn subtask_mut(&mut self, id: &SubtaskId) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| &s.id == id)
    }

    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.date == day
    }
}

/// Child entity owned by exactly one Task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: SubtaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl Subtask {
    pub fn draft(id: SubtaskId, title: &Title) -> Self {
        Self {
            id,
            title: title.as_str().to_string(),
            completed: false,
        }
    }
}

/// Body of `POST /todos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub date: NaiveDate,
}

/// Body of `POST /subtasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubtask {
    pub todo_id: TaskId,
    pub title: String,
}

/// One entry of `PATCH /todos/reorder/positions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: TaskId,
    pub position: usize,
}

/// Accepts `2025-06-01` as well as RFC 3339 timestamps
/// (`2025-06-01T00:00:00.000Z`). The day is taken in the timestamp's own
/// offset.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    // `2025-06-01T09:30:00` without offset
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

fn deserialize_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_day(&raw).ok_or_else(|| de::Error::custom(format!("invalid date `{raw}`")))
}

fn deserialize_subtasks<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Subtask>, D::Error> {
    // the service sends `null` for tasks that never had subtasks
    Ok(Option::<Vec<Subtask>>::deserialize(deserializer)?.unwrap_or_default())
}
