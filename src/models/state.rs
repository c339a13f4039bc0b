use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::block::ScheduledBlock;
use crate::models::capacity::{DayCapacity, EnergyProfile};
use crate::models::config::SchedulerConfig;
use crate::models::conflict::{Conflict, Warning};
use crate::models::smart_task::SmartTask;

/// The working state a scheduling run builds up and that C4/C6/C7 operate
/// on afterwards (§3). `capacity_by_date` is keyed by the calendar date
/// itself, not a string — the `YYYY-MM-DD` form only appears at the serde
/// boundary (§9: "auxiliary maps keyed by date-string").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerState {
    pub smart_tasks: HashMap<String, SmartTask>,
    pub scheduled_task_ids: Vec<String>,
    pub unscheduled_task_ids: Vec<String>,
    #[serde(with = "capacity_map_serde")]
    pub capacity_by_date: HashMap<NaiveDate, DayCapacity>,
    pub blocks: Vec<ScheduledBlock>,
    pub config: SchedulerConfig,
    pub energy_profile: Option<EnergyProfile>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<Warning>,
    pub recommendations: Vec<String>,
    pub unscheduled_reasons: HashMap<String, String>,
}

impl SchedulerState {
    pub fn new(config: SchedulerConfig, energy_profile: Option<EnergyProfile>) -> Self {
        Self {
            smart_tasks: HashMap::new(),
            scheduled_task_ids: Vec::new(),
            unscheduled_task_ids: Vec::new(),
            capacity_by_date: HashMap::new(),
            blocks: Vec::new(),
            config,
            energy_profile,
            conflicts: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            unscheduled_reasons: HashMap::new(),
        }
    }

    pub fn blocks_for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a ScheduledBlock> {
        self.blocks.iter().filter(move |b| b.task_id == task_id)
    }

    pub fn block_by_id(&self, block_id: &str) -> Option<&ScheduledBlock> {
        self.blocks.iter().find(|b| b.id == block_id)
    }

    pub fn mark_scheduled(&mut self, task_id: &str) {
        self.unscheduled_task_ids.retain(|id| id != task_id);
        if !self.scheduled_task_ids.iter().any(|id| id == task_id) {
            self.scheduled_task_ids.push(task_id.to_string());
        }
    }

    pub fn mark_unscheduled(&mut self, task_id: &str, reason: impl Into<String>) {
        self.scheduled_task_ids.retain(|id| id != task_id);
        if !self.unscheduled_task_ids.iter().any(|id| id == task_id) {
            self.unscheduled_task_ids.push(task_id.to_string());
        }
        self.unscheduled_reasons
            .insert(task_id.to_string(), reason.into());
    }
}

/// `HashMap<NaiveDate, _>` serializes fine under serde_json (object keys
/// must be strings, and `NaiveDate`'s `Display` already is `YYYY-MM-DD`),
/// but we spell the conversion out explicitly rather than relying on
/// serde's blanket `ToString`/`FromStr` map-key impl, since other hosts in
/// this corpus hand-roll the date-string boundary the same way (§9).
mod capacity_map_serde {
    use super::*;
    use serde::de::{Deserializer, Error as DeError};
    use serde::ser::Serializer;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(
        map: &HashMap<NaiveDate, DayCapacity>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (date, capacity) in map {
            out.serialize_entry(&date.format("%Y-%m-%d").to_string(), capacity)?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<NaiveDate, DayCapacity>, D::Error> {
        let raw: HashMap<String, DayCapacity> = HashMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                NaiveDate::from_str(&key)
                    .map(|date| (date, value))
                    .map_err(DeError::custom)
            })
            .collect()
    }
}
