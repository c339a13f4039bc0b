use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::block::ScheduledBlock;
use crate::models::conflict::Conflict;
use crate::models::task::Task;

/// Input to `services::emergency::preview`/`commit` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsertionRequest {
    pub task: Task,
    pub target_date: NaiveDate,
    pub target_start_minute: u32,
    #[serde(default)]
    pub must_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsertionPreview {
    pub can_insert: bool,
    pub proposed_start_minute: Option<u32>,
    pub proposed_end_minute: Option<u32>,
    pub ripple_effects: Vec<RippleEffect>,
    pub warnings: Vec<String>,
    pub total_items_affected: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RippleEffect {
    pub block_id: String,
    pub task_id: String,
    pub old_start_minute: u32,
    pub old_end_minute: u32,
    pub new_start_minute: u32,
    pub new_end_minute: u32,
    pub severity: RippleSeverity,
    pub impact_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RippleSeverity {
    Minor,
    Moderate,
    Significant,
}

impl RippleSeverity {
    pub fn for_shift_minutes(shift_minutes: i64) -> Self {
        if shift_minutes <= 60 {
            RippleSeverity::Minor
        } else if shift_minutes <= 120 {
            RippleSeverity::Moderate
        } else {
            RippleSeverity::Significant
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyInsertResult {
    pub new_block: ScheduledBlock,
    pub applied_ripples: Vec<RippleEffect>,
    pub conflicts: Vec<Conflict>,
}

/// Input/output of `services::rescheduler` (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub block_id: String,
    pub new_date: NaiveDate,
    pub new_start_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleOutcome {
    pub success: bool,
    pub conflicts: Vec<Conflict>,
    /// Set only on success; the relocated block.
    pub block: Option<ScheduledBlock>,
}
