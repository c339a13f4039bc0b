use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::block::ScheduledBlock;

/// Per-day capacity (§3, C3). `time_slots` is a totally ordered,
/// non-overlapping sequence tiling `[work_start, work_end)` (invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayCapacity {
    pub date: NaiveDate,
    pub work_start_minute: u32,
    pub work_end_minute: u32,
    pub total_minutes: i64,
    pub scheduled_minutes: i64,
    pub available_minutes: i64,
    pub time_slots: Vec<TimeSlot>,
    pub scheduled_tasks: Vec<ScheduledBlock>,
}

impl DayCapacity {
    /// Percent, 0-100+.
    pub fn utilization(&self) -> f64 {
        if self.total_minutes == 0 {
            return 0.0;
        }
        (self.scheduled_minutes as f64 / self.total_minutes as f64) * 100.0
    }

    pub fn is_overloaded(&self) -> bool {
        self.scheduled_minutes > self.total_minutes
    }

    pub fn overtime_minutes(&self) -> i64 {
        (self.scheduled_minutes - self.total_minutes).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_minute: u32,
    pub end_minute: u32,
    pub available: bool,
    #[serde(default)]
    pub source: Option<SlotSource>,
    #[serde(default)]
    pub is_peak_energy: bool,
    #[serde(default)]
    pub is_low_energy: bool,
}

impl TimeSlot {
    pub fn duration_minutes(&self) -> u32 {
        self.end_minute.saturating_sub(self.start_minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSource {
    Task,
    Habit,
    Lunch,
    FocusBlock,
    Calendar,
    TransitionBreak,
}

/// Optional per-user preference for when peak/low-energy windows fall.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnergyProfile {
    pub profile_type: EnergyProfileType,
    /// Minutes-of-day ranges, inclusive start / exclusive end.
    pub peak_hours: Vec<(u32, u32)>,
    pub low_energy_hours: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnergyProfileType {
    MorningPerson,
    NightOwl,
    Steady,
}

impl EnergyProfile {
    pub fn default_for(profile_type: EnergyProfileType) -> Self {
        match profile_type {
            EnergyProfileType::MorningPerson => EnergyProfile {
                profile_type,
                peak_hours: vec![(9 * 60, 12 * 60)],
                low_energy_hours: vec![(14 * 60, 16 * 60)],
            },
            EnergyProfileType::NightOwl => EnergyProfile {
                profile_type,
                peak_hours: vec![(15 * 60, 18 * 60)],
                low_energy_hours: vec![(9 * 60, 11 * 60)],
            },
            EnergyProfileType::Steady => EnergyProfile {
                profile_type,
                peak_hours: vec![(10 * 60, 12 * 60), (14 * 60, 16 * 60)],
                low_energy_hours: vec![(13 * 60, 14 * 60)],
            },
        }
    }

    pub fn is_peak(&self, minute: u32) -> bool {
        self.peak_hours
            .iter()
            .any(|(start, end)| minute >= *start && minute < *end)
    }

    pub fn is_low(&self, minute: u32) -> bool {
        self.low_energy_hours
            .iter()
            .any(|(start, end)| minute >= *start && minute < *end)
    }
}
