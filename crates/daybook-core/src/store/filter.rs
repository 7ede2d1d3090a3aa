//! Date and completion filtering over the task list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::Task;

/// Completion-state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(&self, completed: bool) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !completed,
            StatusFilter::Completed => completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(format!(
                "unknown filter `{other}`; expected all|active|completed"
            )),
        }
    }
}

/// Selected day plus completion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFilter {
    pub date: Option<NaiveDate>,
    pub status: StatusFilter,
}

impl TaskFilter {
    pub fn new(date: Option<NaiveDate>, status: StatusFilter) -> Self {
        Self { date, status }
    }

    /// Selecting the already-selected day clears the selection.
    pub fn select_date(&mut self, day: NaiveDate) {
        self.date = if self.date == Some(day) { None } else { Some(day) };
    }

    pub fn clear_date(&mut self) {
        self.date = None;
    }

    /// Same-day match on `date` (if selected), then the status filter.
    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks
            .iter()
            .filter(|t| self.date.is_none_or(|day| t.is_on(day)))
            .filter(|t| self.status.matches(t.completed))
            .collect()
    }
}
