//! Multi-pass packer (C5, §4.5): the scheduling engine's entry point.
//! Four passes place increasingly flexible work into the capacity map built
//! by `services::capacity`, then `services::conflicts` runs once over the
//! finished state.

use std::collections::HashMap;

use chrono::{NaiveDate, Timelike};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::block::{ScheduledBlock, SessionInfo};
use crate::models::capacity::SlotSource;
use crate::models::config::SchedulerConfig;
use crate::models::learning::LearningData;
use crate::models::result::{CapacitySummary, SchedulePreview, SchedulingResult};
use crate::models::smart_task::{Flexibility, SmartTask};
use crate::models::state::SchedulerState;
use crate::models::task::{Habit, Milestone, Project, Task, TaskStatus};
use crate::services::analyzer::{self, AnalysisContext};
use crate::services::capacity;
use crate::services::conflicts;
use crate::services::time;

const CRITICAL_PATH_THRESHOLD: u32 = 60;
const MIN_SPLIT_SESSION_MINUTES: u32 = 30;

pub struct SchedulingInput<'a> {
    pub tasks: &'a [Task],
    pub projects: &'a [Project],
    pub milestones: &'a [Milestone],
    pub habits: &'a [Habit],
    pub learning: Option<&'a LearningData>,
}

/// Runs all four passes and returns the final `SchedulingResult`, discarding
/// the intermediate `SchedulerState`. Never returns `Err`: a task that
/// cannot be placed is recorded as unscheduled with a reason, never a call
/// failure (§4.5, §6).
pub fn schedule_all(input: SchedulingInput, config: SchedulerConfig) -> SchedulingResult {
    run(input, config).1
}

/// Same as `schedule_all`, but also returns the finished `SchedulerState` so
/// a caller can keep running `services::emergency`/`services::rescheduler`
/// against it afterwards (the `Scheduler` façade in the crate root does
/// exactly this).
pub fn run(input: SchedulingInput, config: SchedulerConfig) -> (SchedulerState, SchedulingResult) {
    let today = config.start_date;
    let energy_profile = config.energy_profile.clone();
    let mut state = SchedulerState::new(config.clone(), energy_profile.clone());

    let active_tasks: Vec<&Task> = input
        .tasks
        .iter()
        .filter(|t| t.status.is_active())
        .collect();

    build_capacity_map(&mut state, &input, today);
    analyze_tasks(&mut state, &input, &active_tasks, today);

    lock_immovable_tasks(&mut state);
    place_critical_path(&mut state);
    fill_remaining(&mut state);
    optimize_and_batch(&mut state);

    let result = finalize(&mut state);
    (state, result)
}

fn build_capacity_map(state: &mut SchedulerState, input: &SchedulingInput, today: NaiveDate) {
    let working_days = time::enumerate_working_days(today, state.config.end_date, &state.config.working_days);
    for date in working_days {
        let fixed = input
            .habits
            .iter()
            .filter_map(|h| capacity::habit_interval(h, date))
            .collect();
        let day = capacity::build_day(date, &state.config, state.energy_profile.as_ref(), fixed);
        state.capacity_by_date.insert(date, day);
    }
}

fn analyze_tasks(
    state: &mut SchedulerState,
    input: &SchedulingInput,
    active_tasks: &[&Task],
    today: NaiveDate,
) {
    let mut completions: HashMap<String, chrono::NaiveDateTime> = HashMap::new();
    for task in input.tasks.iter().filter(|t| t.status == TaskStatus::Completed) {
        if let Some(scheduled_start) = task.scheduled_start {
            completions.insert(task.id.clone(), scheduled_start);
        }
    }

    for task in active_tasks {
        let project = task
            .project_id
            .as_ref()
            .and_then(|id| input.projects.iter().find(|p| &p.id == id));
        let milestone = task
            .milestone_id
            .as_ref()
            .and_then(|id| input.milestones.iter().find(|m| &m.id == id));
        let sibling_tasks: Vec<Task> = match &task.project_id {
            Some(project_id) => input
                .tasks
                .iter()
                .filter(|t| t.project_id.as_ref() == Some(project_id))
                .cloned()
                .collect(),
            None => vec![(*task).clone()],
        };
        let project_milestones: Vec<Milestone> = match &task.project_id {
            Some(project_id) => input
                .milestones
                .iter()
                .filter(|m| &m.project_id == project_id)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let ctx = AnalysisContext {
            today,
            working_days: &state.config.working_days,
            project,
            milestone,
            sibling_tasks: &sibling_tasks,
            milestones: &project_milestones,
            predecessor_completions: &completions,
            learning: input.learning,
            config: &state.config,
        };

        let smart_task = analyzer::analyze(task, &ctx);
        state.unscheduled_task_ids.push(task.id.clone());
        state.smart_tasks.insert(task.id.clone(), smart_task);
    }
}

fn lock_immovable_tasks(state: &mut SchedulerState) {
    let immovable_ids: Vec<String> = state
        .smart_tasks
        .values()
        .filter(|t| t.flexibility == Flexibility::Fixed)
        .map(|t| t.task.id.clone())
        .collect();

    for task_id in immovable_ids {
        let Some(smart_task) = state.smart_tasks.get(&task_id).cloned() else {
            continue;
        };
        let duration = smart_task.effective_estimate_minutes.max(1) as u32;

        if let Some(scheduled_start) = smart_task.task.scheduled_start {
            let date = scheduled_start.date();
            let start_minute = (scheduled_start.time().num_seconds_from_midnight() / 60) as u32;

            if let Some(day) = state.capacity_by_date.get_mut(&date) {
                if capacity::reserve(day, start_minute, duration, SlotSource::Task, 0).is_ok() {
                    push_block(state, &task_id, date, start_minute, start_minute + duration, true, "locked placement", None);
                    continue;
                }
            }
            state.mark_unscheduled(&task_id, "locked slot unavailable or outside scheduling range".to_string());
            continue;
        }

        // Fixed but no prior scheduledStart: still must end up locked, so
        // find the best day under the strictest settings (no peak
        // preference, avoid low-energy slots) and reserve it there.
        let Some(due_date) = smart_task.task.due_date else {
            state.mark_unscheduled(&task_id, "fixed task has no scheduledStart and no due date to search from".to_string());
            continue;
        };
        let search_end = due_date.min(state.config.end_date);
        let day_date = capacity::find_best_day_for_task(
            &smart_task,
            &state.capacity_by_date,
            state.config.start_date,
            search_end,
            &state.config,
        )
        .map(|day| day.date);

        let placed = day_date.and_then(|date| {
            let day = state.capacity_by_date.get_mut(&date)?;
            let slot = capacity::find_best_slot(day, duration, false, true)?;
            capacity::reserve(day, slot.start_minute, duration, SlotSource::Task, 0).ok()?;
            Some((date, slot.start_minute))
        });

        match placed {
            Some((date, start_minute)) => {
                push_block(
                    state,
                    &task_id,
                    date,
                    start_minute,
                    start_minute + duration,
                    true,
                    "locked placement (fixed, no prior scheduledStart)",
                    None,
                );
            }
            None => {
                state.mark_unscheduled(&task_id, "no day before its deadline has room to lock this fixed task".to_string());
            }
        }
    }
}

fn place_critical_path(state: &mut SchedulerState) {
    let mut critical: Vec<SmartTask> = state
        .smart_tasks
        .values()
        .filter(|t| {
            t.criticality >= CRITICAL_PATH_THRESHOLD
                && !state.scheduled_task_ids.contains(&t.task.id)
        })
        .cloned()
        .collect();
    analyzer::sort_smart_tasks(&mut critical);

    for smart_task in critical {
        place_task(state, &smart_task, false);
    }
}

fn fill_remaining(state: &mut SchedulerState) {
    let mut remaining: Vec<SmartTask> = state
        .smart_tasks
        .values()
        .filter(|t| {
            !state.scheduled_task_ids.contains(&t.task.id)
                && !state.unscheduled_reasons.contains_key(&t.task.id)
        })
        .cloned()
        .collect();
    analyzer::sort_smart_tasks(&mut remaining);

    for smart_task in remaining {
        let placed = place_task(state, &smart_task, false);
        if !placed {
            place_task(state, &smart_task, true);
        }
    }
}

/// Best-effort optimization pass: never mutates placements, only records
/// recommendations when batching similar tasks looks beneficial.
fn optimize_and_batch(state: &mut SchedulerState) {
    if !state.config.batch_similar_tasks {
        return;
    }
    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    for smart_task in state.smart_tasks.values() {
        for tag in &smart_task.task.tags {
            *tag_counts.entry(tag.clone()).or_insert(0) += 1;
        }
    }
    for (tag, count) in tag_counts {
        if count >= 3 {
            state.recommendations.push(format!(
                "{count} tasks tagged \"{tag}\" could be batched into a single focus block"
            ));
        }
    }
}

/// Tries to place `smart_task` as a single block across the scheduling
/// range; if it cannot fit anywhere and is splittable, falls back to
/// multiple session blocks. `relax_deadline` widens the search to the full
/// configured range instead of stopping at the task's own due date.
fn place_task(state: &mut SchedulerState, smart_task: &SmartTask, relax_deadline: bool) -> bool {
    let search_start = state.config.start_date.max(smart_task.earliest_start.date());
    let search_end = if relax_deadline {
        state.config.end_date
    } else {
        smart_task
            .latest_end
            .map(|d| d.date())
            .unwrap_or(state.config.end_date)
            .min(state.config.end_date)
    };
    if search_end < search_start {
        state.mark_unscheduled(&smart_task.task.id, "no capacity remains before the task's due date".to_string());
        return false;
    }

    let prefer_peak = smart_task.requires_high_focus && state.config.schedule_high_focus_in_peak;

    if try_single_block(state, smart_task, search_start, search_end, prefer_peak) {
        return true;
    }

    if smart_task.can_be_split {
        if try_split_sessions(state, smart_task, search_start, search_end, prefer_peak) {
            return true;
        }
    }

    state.mark_unscheduled(
        &smart_task.task.id,
        "no day in range had a large enough available slot".to_string(),
    );
    false
}

fn try_single_block(
    state: &mut SchedulerState,
    smart_task: &SmartTask,
    search_start: NaiveDate,
    search_end: NaiveDate,
    prefer_peak: bool,
) -> bool {
    let Some(day) = capacity::find_best_day_for_task(
        smart_task,
        &state.capacity_by_date,
        search_start,
        search_end,
        &state.config,
    ) else {
        return false;
    };
    let date = day.date;
    let duration = smart_task.effective_estimate_minutes.max(1) as u32;
    let Some(candidate) = capacity::find_best_slot(day, duration, prefer_peak, true) else {
        return false;
    };

    let Some(day_mut) = state.capacity_by_date.get_mut(&date) else {
        return false;
    };
    if capacity::reserve(
        day_mut,
        candidate.start_minute,
        candidate.duration_minutes,
        SlotSource::Task,
        state.config.breaks_between_tasks_minutes,
    )
    .is_err()
    {
        return false;
    }

    push_block(
        state,
        &smart_task.task.id,
        date,
        candidate.start_minute,
        candidate.start_minute + candidate.duration_minutes,
        false,
        "placed by capacity search",
        None,
    );
    true
}

fn try_split_sessions(
    state: &mut SchedulerState,
    smart_task: &SmartTask,
    search_start: NaiveDate,
    search_end: NaiveDate,
    _prefer_peak: bool,
) -> bool {
    let mut remaining = smart_task.effective_estimate_minutes.max(1) as u32;
    let max_session = smart_task
        .maximum_session_minutes
        .max(smart_task.minimum_session_minutes) as u32;
    let transition = state.config.breaks_between_tasks_minutes;
    let mut sessions: Vec<(NaiveDate, u32, u32)> = Vec::new();
    let mut cursor = search_start;

    // Dry-run against a cloned DayCapacity per day so a day's leftover
    // capacity after one session is visible to the next, without mutating
    // `state` until the whole plan is known to fully cover the task.
    while remaining > 0 && cursor <= search_end {
        if let Some(day) = state.capacity_by_date.get(&cursor) {
            let mut simulated = day.clone();
            while remaining > 0 {
                let want_max = remaining.min(max_session);
                let Some(candidate) = capacity::find_session_slot(&simulated, want_max, MIN_SPLIT_SESSION_MINUTES) else {
                    break;
                };
                let take = candidate.duration_minutes.min(remaining);
                sessions.push((cursor, candidate.start_minute, take));
                remaining = remaining.saturating_sub(take);
                if capacity::reserve(&mut simulated, candidate.start_minute, take, SlotSource::Task, transition).is_err() {
                    break;
                }
            }
        }
        cursor = cursor.succ_opt().expect("date arithmetic in range");
    }

    if remaining > 0 || sessions.is_empty() {
        return false;
    }

    let total_sessions = sessions.len() as u32;
    for (session_number, (date, start_minute, duration)) in sessions.into_iter().enumerate() {
        let Some(day_mut) = state.capacity_by_date.get_mut(&date) else {
            continue;
        };
        if capacity::reserve(
            day_mut,
            start_minute,
            duration,
            SlotSource::Task,
            state.config.breaks_between_tasks_minutes,
        )
        .is_err()
        {
            warn!(task_id = %smart_task.task.id, "split session reservation failed after slot search succeeded");
            continue;
        }
        push_block(
            state,
            &smart_task.task.id,
            date,
            start_minute,
            start_minute + duration,
            false,
            "placed as a split session",
            Some(SessionInfo {
                session_number: session_number as u32 + 1,
                total_sessions,
            }),
        );
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn push_block(
    state: &mut SchedulerState,
    task_id: &str,
    date: NaiveDate,
    start_minute: u32,
    end_minute: u32,
    is_locked: bool,
    reasoning: &str,
    session_info: Option<SessionInfo>,
) {
    let block = ScheduledBlock {
        id: Uuid::new_v4().to_string(),
        task_id: task_id.to_string(),
        date,
        start_minute,
        end_minute,
        reasoning: reasoning.to_string(),
        is_locked,
        session_info,
    };
    if let Some(day) = state.capacity_by_date.get_mut(&date) {
        day.scheduled_tasks.push(block.clone());
    }
    state.blocks.push(block);
    state.mark_scheduled(task_id);
}

fn finalize(state: &mut SchedulerState) -> SchedulingResult {
    let (conflicts, warnings) = conflicts::detect_all(state);
    state.conflicts = conflicts.clone();
    state.warnings = warnings.clone();

    let mut dates: Vec<NaiveDate> = state.capacity_by_date.keys().copied().collect();
    dates.sort();

    let previews: Vec<SchedulePreview> = dates
        .iter()
        .map(|date| {
            let day = &state.capacity_by_date[date];
            SchedulePreview {
                date: *date,
                blocks: day.scheduled_tasks.clone(),
                utilization: day.utilization(),
                warnings: warnings
                    .iter()
                    .filter(|w| w.affected_dates.contains(date))
                    .map(|w| w.description.clone())
                    .collect(),
            }
        })
        .collect();

    let total_demand_minutes: i64 = state
        .smart_tasks
        .values()
        .map(|t| t.effective_estimate_minutes)
        .sum();
    let total_capacity_minutes: i64 = state.capacity_by_date.values().map(|d| d.total_minutes).sum();
    let overloaded_days = state.capacity_by_date.values().filter(|d| d.is_overloaded()).count();

    let capacity_summary = CapacitySummary {
        total_days: dates.len(),
        working_days: dates.len(),
        total_capacity_hours: total_capacity_minutes as f64 / 60.0,
        total_demand_hours: total_demand_minutes as f64 / 60.0,
        utilization: if total_capacity_minutes > 0 {
            total_demand_minutes as f64 / total_capacity_minutes as f64 * 100.0
        } else {
            0.0
        },
        overloaded_days,
    };

    info!(
        scheduled = state.scheduled_task_ids.len(),
        unscheduled = state.unscheduled_task_ids.len(),
        "scheduling run complete"
    );

    SchedulingResult {
        success: state.unscheduled_task_ids.is_empty(),
        scheduled_count: state.scheduled_task_ids.len(),
        unscheduled_count: state.unscheduled_task_ids.len(),
        previews,
        conflicts,
        warnings,
        recommendations: state.recommendations.clone(),
        capacity_summary,
        unscheduled_task_ids: state.unscheduled_task_ids.clone(),
        unscheduled_reasons: state.unscheduled_reasons.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ConflictResolutionStrategy, DistributionMode, IntensityMode};
    use crate::models::task::{Priority, TaskStatus};
    use std::collections::{BTreeSet, HashSet};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
            working_days: [1, 2, 3, 4, 5].into_iter().collect::<BTreeSet<u8>>(),
            working_hours_start_minute: 9 * 60,
            working_hours_end_minute: 17 * 60,
            lunch_break: Some((12 * 60, 13 * 60)),
            deadline_buffer_days: 2,
            strict_deadlines: false,
            allow_buffer_reduction: false,
            max_hours_per_day: 8.0,
            target_hours_per_day: 6.0,
            allow_overtime: false,
            max_overtime_hours: 2.0,
            intensity_mode: IntensityMode::Balanced,
            breaks_between_tasks_minutes: 5,
            distribution_mode: DistributionMode::Even,
            batch_similar_tasks: false,
            focus_project_ids: BTreeSet::new(),
            focus_project_ratio: None,
            energy_profile: None,
            schedule_high_focus_in_peak: false,
            auto_resolve_conflicts: false,
            conflict_resolution_strategy: ConflictResolutionStrategy::Conservative,
        }
    }

    fn task(id: &str, estimated_minutes: i64, due_in_days: Option<i64>) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            estimated_minutes,
            due_date: due_in_days.map(|d| NaiveDate::from_ymd_opt(2025, 3, 3).unwrap() + chrono::Duration::days(d)),
            scheduled_start: None,
            project_id: None,
            milestone_id: None,
            tags: BTreeSet::new(),
            blocked_by: Vec::new(),
            blocking: Vec::new(),
            actual_duration_minutes: None,
        }
    }

    #[test]
    fn places_a_simple_single_day_task() {
        let tasks = vec![task("t1", 60, Some(10))];
        let input = SchedulingInput {
            tasks: &tasks,
            projects: &[],
            milestones: &[],
            habits: &[],
            learning: None,
        };
        let result = schedule_all(input, config());
        assert_eq!(result.scheduled_count, 1);
        assert_eq!(result.unscheduled_count, 0);
    }

    #[test]
    fn splits_large_task_across_sessions_when_needed() {
        let mut t = task("big", 600, Some(10));
        t.tags = HashSet::<String>::new().into_iter().collect();
        let tasks = vec![t];
        let input = SchedulingInput {
            tasks: &tasks,
            projects: &[],
            milestones: &[],
            habits: &[],
            learning: None,
        };
        let mut cfg = config();
        cfg.working_hours_start_minute = 9 * 60;
        cfg.working_hours_end_minute = 12 * 60; // 3h/day, forces a split for a 10h task
        cfg.lunch_break = None;
        let result = schedule_all(input, cfg);
        assert_eq!(result.scheduled_count, 1);
    }

    #[test]
    fn unschedulable_task_is_reported_not_errored() {
        let tasks = vec![task("t1", 10_000, Some(1))];
        let input = SchedulingInput {
            tasks: &tasks,
            projects: &[],
            milestones: &[],
            habits: &[],
            learning: None,
        };
        let result = schedule_all(input, config());
        assert_eq!(result.unscheduled_count, 1);
        assert!(result.unscheduled_reasons.contains_key("t1"));
    }
}
