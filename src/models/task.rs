use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A work item, owned read-only by the core except for the two
/// scheduling-output fields it writes back through
/// `SchedulerDataSource::update_task_schedule`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Minutes; defaults to 30 when absent at the document-store boundary.
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: i64,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_start: Option<chrono::NaiveDateTime>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub blocking: Vec<String>,
    #[serde(default)]
    pub actual_duration_minutes: Option<i64>,
}

fn default_estimated_minutes() -> i64 {
    30
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Ordered phase within a project; used only for ordering and dependency
/// imputation (§4.2), never as a schedulable unit itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    /// 1-based.
    pub order: u32,
    pub estimated_hours: f64,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Recurring personal activity. Contributes blocked time on matching
/// weekdays; never becomes a `Task` (non-goal: recurring-task expansion).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub title: String,
    pub frequency: HabitFrequency,
    /// Minutes-of-day; habits with no scheduled time contribute no blocked
    /// time (they are informational only).
    #[serde(default)]
    pub scheduled_time_minutes: Option<u32>,
    pub duration_minutes: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum HabitFrequency {
    Daily,
    Weekly { weekdays: HashSet<chrono::Weekday> },
    Custom { weekdays: HashSet<chrono::Weekday> },
}

impl HabitFrequency {
    pub fn matches(&self, weekday: chrono::Weekday) -> bool {
        match self {
            HabitFrequency::Daily => true,
            HabitFrequency::Weekly { weekdays } | HabitFrequency::Custom { weekdays } => {
                weekdays.contains(&weekday)
            }
        }
    }
}
