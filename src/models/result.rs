use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::block::ScheduledBlock;
use crate::models::conflict::{Conflict, Warning};

/// The output of a scheduling run (§6). Never partially mutates external
/// state: a host inspects this and chooses, independently, whether/what to
/// write back through `SchedulerDataSource`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingResult {
    pub success: bool,
    pub scheduled_count: usize,
    pub unscheduled_count: usize,
    pub previews: Vec<SchedulePreview>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<Warning>,
    pub recommendations: Vec<String>,
    pub capacity_summary: CapacitySummary,
    pub unscheduled_task_ids: Vec<String>,
    pub unscheduled_reasons: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePreview {
    pub date: NaiveDate,
    pub blocks: Vec<ScheduledBlock>,
    pub utilization: f64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CapacitySummary {
    pub total_days: usize,
    pub working_days: usize,
    pub total_capacity_hours: f64,
    pub total_demand_hours: f64,
    pub utilization: f64,
    pub overloaded_days: usize,
}
