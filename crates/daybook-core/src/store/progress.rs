//! Counts and completion percentage across tasks and their subtasks.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::Task;

/// Tasks and subtasks counted together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counts {
    pub all: usize,
    pub active: usize,
    pub completed: usize,
}

impl Counts {
    /// Counts every task in `tasks` and every subtask they own.
    pub fn of<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut counts = Counts::default();
        for task in tasks {
            counts.add(task.completed);
            for subtask in &task.subtasks {
                counts.add(subtask.completed);
            }
        }
        counts
    }

    /// Same as [`Counts::of`], restricted to one day when given.
    pub fn for_date(tasks: &[Task], date: Option<NaiveDate>) -> Self {
        Self::of(
            tasks
                .iter()
                .filter(|t| date.is_none_or(|day| t.is_on(day))),
        )
    }

    /// `round(100 * completed / all)`, or 0 when there is nothing to count.
    pub fn percent(&self) -> u8 {
        if self.all == 0 {
            return 0;
        }
        // integer round-half-up
        ((200 * self.completed + self.all) / (2 * self.all)) as u8
    }

    fn add(&mut self, completed: bool) {
        self.all += 1;
        if completed {
            self.completed += 1;
        } else {
            self.active += 1;
        }
    }
}

/// Overall progress and the selected day's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub total: u8,
    /// 0 when no day is selected.
    pub selected_date: u8,
}

impl Progress {
    pub fn of(tasks: &[Task], selected: Option<NaiveDate>) -> Self {
        Self {
            total: Counts::of(tasks).percent(),
            selected_date: selected
                .map(|day| Counts::for_date(tasks, Some(day)).percent())
                .unwrap_or(0),
        }
    }
}

/// Shorthand for the overall percentage.
pub fn progress_percent(tasks: &[Task]) -> u8 {
    Counts::of(tasks).percent()
}
