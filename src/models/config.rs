use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::capacity::EnergyProfile;

/// Configuration surface (§6). Unknown options are a deserialization error
/// at the host boundary — this type has no catch-all field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// 0 = Sunday, matching `chrono::Weekday::num_days_from_sunday`.
    pub working_days: BTreeSet<u8>,
    pub working_hours_start_minute: u32,
    pub working_hours_end_minute: u32,
    #[serde(default)]
    pub lunch_break: Option<(u32, u32)>,
    #[serde(default = "default_deadline_buffer_days")]
    pub deadline_buffer_days: u32,
    #[serde(default)]
    pub strict_deadlines: bool,
    #[serde(default)]
    pub allow_buffer_reduction: bool,
    #[serde(default = "default_max_hours_per_day")]
    pub max_hours_per_day: f64,
    #[serde(default = "default_target_hours_per_day")]
    pub target_hours_per_day: f64,
    #[serde(default)]
    pub allow_overtime: bool,
    #[serde(default = "default_max_overtime_hours")]
    pub max_overtime_hours: f64,
    #[serde(default)]
    pub intensity_mode: IntensityMode,
    #[serde(default = "default_break_minutes")]
    pub breaks_between_tasks_minutes: i64,
    #[serde(default)]
    pub distribution_mode: DistributionMode,
    #[serde(default)]
    pub batch_similar_tasks: bool,
    #[serde(default)]
    pub focus_project_ids: BTreeSet<String>,
    #[serde(default)]
    pub focus_project_ratio: Option<f64>,
    #[serde(default)]
    pub energy_profile: Option<EnergyProfile>,
    #[serde(default)]
    pub schedule_high_focus_in_peak: bool,
    #[serde(default)]
    pub auto_resolve_conflicts: bool,
    #[serde(default)]
    pub conflict_resolution_strategy: ConflictResolutionStrategy,
}

fn default_deadline_buffer_days() -> u32 {
    2
}

fn default_max_hours_per_day() -> f64 {
    8.0
}

fn default_target_hours_per_day() -> f64 {
    6.0
}

fn default_max_overtime_hours() -> f64 {
    2.0
}

fn default_break_minutes() -> i64 {
    5
}

impl SchedulerConfig {
    pub fn max_overtime_minutes(&self) -> i64 {
        (self.max_overtime_hours * 60.0).round() as i64
    }

    pub fn working_day_minutes(&self) -> i64 {
        let mut minutes =
            (self.working_hours_end_minute as i64) - (self.working_hours_start_minute as i64);
        if let Some((start, end)) = self.lunch_break {
            minutes -= (end as i64) - (start as i64);
        }
        minutes.max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IntensityMode {
    Relaxed,
    #[default]
    Balanced,
    Intense,
    DeadlineDriven,
}

impl IntensityMode {
    /// Target utilization this mode aims for (§6).
    pub fn target_utilization(self) -> f64 {
        match self {
            IntensityMode::Relaxed => 0.6,
            IntensityMode::Balanced => 0.75,
            IntensityMode::Intense => 0.9,
            IntensityMode::DeadlineDriven => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionMode {
    #[default]
    Even,
    FrontLoad,
    BackLoad,
    DeadlineAware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolutionStrategy {
    #[default]
    Conservative,
    Aggressive,
    Interactive,
}
