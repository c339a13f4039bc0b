use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Post-hoc constraint violation detected by `services::conflicts` (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub affected_task_ids: Vec<String>,
    pub affected_dates: Vec<NaiveDate>,
    pub description: String,
    pub auto_resolvable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Collision,
    Overload,
    DeadlineMiss,
    DependencyViolation,
    InsufficientBuffer,
    SplitTooSmall,
    EnergyMismatch,
    NoCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Softer-than-`Conflict` observations (§4.4): utilization runs, near-due
/// unscheduled tasks, long blocks, high-focus-outside-peak placements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub category: WarningCategory,
    pub description: String,
    #[serde(default)]
    pub affected_task_ids: Vec<String>,
    #[serde(default)]
    pub affected_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    HighUtilizationRun,
    DueSoonUnscheduled,
    LongBlock,
    HighFocusOutsidePeak,
}
