use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::task::Priority;

pub const MAX_COMPLETION_RECORDS: usize = 500;
pub const GLOBAL_WINDOW: usize = 30;

/// `LearningData` is the only long-lived state the core manages (§5); it is
/// a single JSON-serializable blob the host loads at process start and
/// saves after each recorded completion. Schema matches §6 verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LearningData {
    /// FIFO, capped at `MAX_COMPLETION_RECORDS`.
    pub records: Vec<CompletionRecord>,
    pub category_multipliers: HashMap<String, f64>,
    pub project_multipliers: HashMap<String, f64>,
    pub global_multiplier: f64,
    pub productivity_by_hour: [f64; 24],
    pub productivity_by_day: [f64; 7],
    pub peak_hours: Vec<u32>,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

impl Default for LearningData {
    fn default() -> Self {
        LearningData {
            records: Vec::new(),
            category_multipliers: HashMap::new(),
            project_multipliers: HashMap::new(),
            global_multiplier: 1.0,
            productivity_by_hour: [0.5; 24],
            productivity_by_day: [0.5; 7],
            peak_hours: Vec::new(),
            last_updated: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub task_id: String,
    pub estimated_minutes: i64,
    pub actual_minutes: i64,
    pub completed_date: NaiveDate,
    pub priority: Priority,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Hour-of-day (0-23) the completion was logged at, used to update
    /// `productivity_by_hour`.
    pub completion_hour: u32,
}

/// `adjustEstimate` output (§4.8, §6). `reason` names the most specific
/// history that won the cascade: overall, a tag, or a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimateAdjustment {
    pub adjusted_minutes: i64,
    pub confidence: u32,
    pub reason: String,
}
