use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::task::{Priority, Task};

/// A `Task` extended with scheduler-derived fields (§3, §4.2). Constructed
/// fresh per scheduling run by `services::analyzer`; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmartTask {
    pub task: Task,
    /// 0-100, monotone in priority/deadline proximity/project-lag/out-degree/milestone order.
    pub criticality: u32,
    pub flexibility: Flexibility,
    pub earliest_start: NaiveDateTime,
    /// End-of-day of the due date; `None` if the task carries no deadline.
    pub latest_end: Option<NaiveDateTime>,
    pub ideal_completion_date: Option<NaiveDate>,
    pub buffer_days: u32,
    pub requires_high_focus: bool,
    pub preferred_time_of_day: Option<TimeOfDay>,
    pub can_be_split: bool,
    pub minimum_session_minutes: i64,
    pub maximum_session_minutes: i64,
    pub dependency_depth: u32,
    /// Transitive dependents, via DFS with a `visited` guard (§4.2).
    pub blocks: Vec<String>,
    /// The effective (possibly learning-adjusted) estimate this run used for
    /// sizing; the raw `task.estimated_minutes` is never mutated.
    pub effective_estimate_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flexibility {
    Fixed,
    Movable,
    Splittable,
    Delegatable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

pub const DEFAULT_MIN_SESSION_MINUTES: i64 = 30;

impl SmartTask {
    pub fn priority(&self) -> Priority {
        self.task.priority
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.task.due_date
    }
}
