//! Conflict and warning detection (C4, §4.4). Runs over a finished
//! `SchedulerState` and never mutates it — every finding is informational,
//! attached to the `SchedulingResult` for the host to act on.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::block::ScheduledBlock;
use crate::models::conflict::{Conflict, ConflictType, Severity, Warning, WarningCategory};
use crate::models::smart_task::SmartTask;
use crate::models::state::SchedulerState;

const HIGH_UTILIZATION_THRESHOLD: f64 = 90.0;
const HIGH_UTILIZATION_RUN_LENGTH: usize = 3;
const DUE_SOON_DAYS: i64 = 2;
const LONG_BLOCK_MINUTES: u32 = 180;
const MIN_BUFFER_DAYS_SEVERITY_THRESHOLD: i64 = 0;

pub fn detect_all(state: &SchedulerState) -> (Vec<Conflict>, Vec<Warning>) {
    let mut conflicts = Vec::new();
    conflicts.extend(detect_collisions(&state.blocks));
    conflicts.extend(detect_overloads(state));
    conflicts.extend(detect_deadline_misses(state));
    conflicts.extend(detect_dependency_violations(state));
    conflicts.extend(detect_insufficient_buffer(state));

    let mut warnings = Vec::new();
    warnings.extend(detect_high_utilization_runs(state));
    warnings.extend(detect_due_soon_unscheduled(state));
    warnings.extend(detect_long_blocks(&state.blocks));
    warnings.extend(detect_high_focus_outside_peak(state));

    (conflicts, warnings)
}

fn detect_collisions(blocks: &[ScheduledBlock]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for i in 0..blocks.len() {
        for j in (i + 1)..blocks.len() {
            if blocks[i].overlaps(&blocks[j]) {
                conflicts.push(Conflict {
                    conflict_type: ConflictType::Collision,
                    severity: Severity::Critical,
                    affected_task_ids: vec![blocks[i].task_id.clone(), blocks[j].task_id.clone()],
                    affected_dates: vec![blocks[i].date],
                    description: format!(
                        "{} and {} overlap on {}",
                        blocks[i].task_id, blocks[j].task_id, blocks[i].date
                    ),
                    auto_resolvable: false,
                });
            }
        }
    }
    conflicts
}

fn detect_overloads(state: &SchedulerState) -> Vec<Conflict> {
    state
        .capacity_by_date
        .values()
        .filter(|day| day.is_overloaded())
        .map(|day| Conflict {
            conflict_type: ConflictType::Overload,
            severity: if day.overtime_minutes() > state.config.max_overtime_minutes() {
                Severity::Critical
            } else {
                Severity::Warning
            },
            affected_task_ids: day.scheduled_tasks.iter().map(|b| b.task_id.clone()).collect(),
            affected_dates: vec![day.date],
            description: format!(
                "{} is overloaded by {} minutes",
                day.date,
                day.overtime_minutes()
            ),
            auto_resolvable: true,
        })
        .collect()
}

fn detect_deadline_misses(state: &SchedulerState) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for task_id in &state.unscheduled_task_ids {
        let Some(smart_task) = state.smart_tasks.get(task_id) else {
            continue;
        };
        if smart_task.due_date().is_some() {
            conflicts.push(Conflict {
                conflict_type: ConflictType::DeadlineMiss,
                severity: Severity::Critical,
                affected_task_ids: vec![task_id.clone()],
                affected_dates: smart_task.due_date().into_iter().collect(),
                description: format!(
                    "{task_id} could not be scheduled before its due date"
                ),
                auto_resolvable: false,
            });
        }
    }

    for smart_task in state.smart_tasks.values() {
        let Some(due) = smart_task.due_date() else {
            continue;
        };
        let latest_scheduled = latest_block_end_date(state, &smart_task.task.id);
        if let Some(last) = latest_scheduled {
            if last > due {
                conflicts.push(Conflict {
                    conflict_type: ConflictType::DeadlineMiss,
                    severity: Severity::Critical,
                    affected_task_ids: vec![smart_task.task.id.clone()],
                    affected_dates: vec![last],
                    description: format!(
                        "{} is scheduled to finish on {} after its due date {}",
                        smart_task.task.id, last, due
                    ),
                    auto_resolvable: false,
                });
            }
        }
    }
    conflicts
}

fn latest_block_end_date(state: &SchedulerState, task_id: &str) -> Option<NaiveDate> {
    state
        .blocks_for_task(task_id)
        .map(|b| b.date)
        .max()
}

fn detect_dependency_violations(state: &SchedulerState) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    let completion_date: HashMap<&str, NaiveDate> = state
        .blocks
        .iter()
        .fold(HashMap::new(), |mut map, block| {
            map.entry(block.task_id.as_str())
                .and_modify(|d| *d = (*d).max(block.date))
                .or_insert(block.date);
            map
        });

    for smart_task in state.smart_tasks.values() {
        let Some(&own_date) = completion_date.get(smart_task.task.id.as_str()) else {
            continue;
        };
        for predecessor_id in &smart_task.task.blocked_by {
            if let Some(&predecessor_date) = completion_date.get(predecessor_id.as_str()) {
                if predecessor_date > own_date {
                    conflicts.push(Conflict {
                        conflict_type: ConflictType::DependencyViolation,
                        severity: Severity::Critical,
                        affected_task_ids: vec![smart_task.task.id.clone(), predecessor_id.clone()],
                        affected_dates: vec![own_date, predecessor_date],
                        description: format!(
                            "{} is scheduled before its dependency {} finishes",
                            smart_task.task.id, predecessor_id
                        ),
                        auto_resolvable: true,
                    });
                }
            }
        }
    }
    conflicts
}

fn detect_insufficient_buffer(state: &SchedulerState) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for smart_task in state.smart_tasks.values() {
        let Some(due) = smart_task.due_date() else {
            continue;
        };
        let Some(last) = latest_block_end_date(state, &smart_task.task.id) else {
            continue;
        };
        let actual_buffer_days = (due - last).num_days();
        if actual_buffer_days < smart_task.buffer_days as i64
            && actual_buffer_days >= MIN_BUFFER_DAYS_SEVERITY_THRESHOLD
        {
            conflicts.push(Conflict {
                conflict_type: ConflictType::InsufficientBuffer,
                severity: Severity::Warning,
                affected_task_ids: vec![smart_task.task.id.clone()],
                affected_dates: vec![last, due],
                description: format!(
                    "{} finishes only {} day(s) before its due date, wanted {}",
                    smart_task.task.id, actual_buffer_days, smart_task.buffer_days
                ),
                auto_resolvable: false,
            });
        }
    }
    conflicts
}

fn detect_high_utilization_runs(state: &SchedulerState) -> Vec<Warning> {
    let mut dates: Vec<NaiveDate> = state.capacity_by_date.keys().copied().collect();
    dates.sort();

    let mut warnings = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, date) in dates.iter().enumerate() {
        let high = state
            .capacity_by_date
            .get(date)
            .is_some_and(|d| d.utilization() >= HIGH_UTILIZATION_THRESHOLD);
        if high {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            push_run_warning(&mut warnings, &dates, start, i);
        }
    }
    if let Some(start) = run_start {
        push_run_warning(&mut warnings, &dates, start, dates.len());
    }
    warnings
}

fn push_run_warning(warnings: &mut Vec<Warning>, dates: &[NaiveDate], start: usize, end: usize) {
    if end - start < HIGH_UTILIZATION_RUN_LENGTH {
        return;
    }
    warnings.push(Warning {
        category: WarningCategory::HighUtilizationRun,
        description: format!(
            "{} consecutive days at or above {}% utilization starting {}",
            end - start,
            HIGH_UTILIZATION_THRESHOLD,
            dates[start]
        ),
        affected_task_ids: Vec::new(),
        affected_dates: dates[start..end].to_vec(),
    });
}

fn detect_due_soon_unscheduled(state: &SchedulerState) -> Vec<Warning> {
    let Some(&any_date) = state.capacity_by_date.keys().next() else {
        return Vec::new();
    };
    let _ = any_date;
    state
        .unscheduled_task_ids
        .iter()
        .filter_map(|task_id| {
            let smart_task = state.smart_tasks.get(task_id)?;
            let due = smart_task.due_date()?;
            let today = state.config.start_date;
            if (due - today).num_days() <= DUE_SOON_DAYS {
                Some(Warning {
                    category: WarningCategory::DueSoonUnscheduled,
                    description: format!(
                        "{task_id} is due {due} and still unscheduled"
                    ),
                    affected_task_ids: vec![task_id.clone()],
                    affected_dates: vec![due],
                })
            } else {
                None
            }
        })
        .collect()
}

fn detect_long_blocks(blocks: &[ScheduledBlock]) -> Vec<Warning> {
    blocks
        .iter()
        .filter(|b| b.duration_minutes() > LONG_BLOCK_MINUTES && b.session_info.is_none())
        .map(|b| Warning {
            category: WarningCategory::LongBlock,
            description: format!(
                "{} on {} runs {} minutes without a break",
                b.task_id,
                b.date,
                b.duration_minutes()
            ),
            affected_task_ids: vec![b.task_id.clone()],
            affected_dates: vec![b.date],
        })
        .collect()
}

fn detect_high_focus_outside_peak(state: &SchedulerState) -> Vec<Warning> {
    let Some(profile) = &state.energy_profile else {
        return Vec::new();
    };
    let smart_tasks_by_id: HashMap<&str, &SmartTask> = state
        .smart_tasks
        .values()
        .map(|t| (t.task.id.as_str(), t))
        .collect();

    state
        .blocks
        .iter()
        .filter_map(|block| {
            let smart_task = smart_tasks_by_id.get(block.task_id.as_str())?;
            if smart_task.requires_high_focus && !profile.is_peak(block.start_minute) {
                Some(Warning {
                    category: WarningCategory::HighFocusOutsidePeak,
                    description: format!(
                        "{} needs high focus but is scheduled outside peak hours on {}",
                        block.task_id, block.date
                    ),
                    affected_task_ids: vec![block.task_id.clone()],
                    affected_dates: vec![block.date],
                })
            } else {
                None
            }
        })
        .collect()
}
