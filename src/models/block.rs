use serde::{Deserialize, Serialize};

/// A concrete placement of a task, or a session of a split task (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBlock {
    pub id: String,
    pub task_id: String,
    pub date: chrono::NaiveDate,
    pub start_minute: u32,
    pub end_minute: u32,
    pub reasoning: String,
    pub is_locked: bool,
    #[serde(default)]
    pub session_info: Option<SessionInfo>,
}

impl ScheduledBlock {
    pub fn duration_minutes(&self) -> u32 {
        self.end_minute.saturating_sub(self.start_minute)
    }

    pub fn overlaps(&self, other: &ScheduledBlock) -> bool {
        self.date == other.date
            && self.start_minute < other.end_minute
            && other.start_minute < self.end_minute
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_number: u32,
    pub total_sessions: u32,
}
