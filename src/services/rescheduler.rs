//! Manual reschedule of a single block (C7, §4.7): reject locked blocks and
//! out-of-range targets, verify capacity, check dependency ordering, then
//! swap the block and re-run conflict detection.

use chrono::NaiveDate;
use tracing::info;

use crate::error::{SchedulerError, SchedulerResult};
use crate::models::capacity::SlotSource;
use crate::models::conflict::Conflict;
use crate::models::insertion::{RescheduleOutcome, RescheduleRequest};
use crate::models::state::SchedulerState;
use crate::services::capacity;
use crate::services::conflicts;

/// Computes the outcome of `request` without mutating `state`.
pub fn preview_reschedule(state: &SchedulerState, request: &RescheduleRequest) -> RescheduleOutcome {
    match check(state, request) {
        Ok(_) => RescheduleOutcome {
            success: true,
            conflicts: Vec::new(),
            block: state.block_by_id(&request.block_id).cloned(),
        },
        Err(err) => RescheduleOutcome {
            success: false,
            conflicts: vec![validation_conflict(&request.block_id, &err.to_string())],
            block: None,
        },
    }
}

/// Moves the block in place. On success, re-runs conflict detection over
/// the whole state and returns it alongside the relocated block.
pub fn reschedule_block(
    state: &mut SchedulerState,
    request: &RescheduleRequest,
) -> SchedulerResult<RescheduleOutcome> {
    check(state, request)?;

    let block = state
        .block_by_id(&request.block_id)
        .cloned()
        .ok_or_else(|| SchedulerError::not_found("block", request.block_id.clone()))?;
    let duration = block.duration_minutes();

    free_slot(state, block.date, block.start_minute, block.end_minute);

    let new_day = state
        .capacity_by_date
        .get_mut(&request.new_date)
        .ok_or_else(|| SchedulerError::not_found("day_capacity", request.new_date.to_string()))?;
    capacity::reserve(
        new_day,
        request.new_start_minute,
        duration,
        SlotSource::Task,
        state.config.breaks_between_tasks_minutes,
    )?;

    move_block(state, &request.block_id, request.new_date, request.new_start_minute, duration);

    let (conflicts, _warnings) = conflicts::detect_all(state);
    info!(block_id = %request.block_id, new_date = %request.new_date, "block rescheduled");

    Ok(RescheduleOutcome {
        success: true,
        conflicts,
        block: state.block_by_id(&request.block_id).cloned(),
    })
}

fn check(state: &SchedulerState, request: &RescheduleRequest) -> SchedulerResult<()> {
    let block = state
        .block_by_id(&request.block_id)
        .ok_or_else(|| SchedulerError::not_found("block", request.block_id.clone()))?;
    if block.is_locked {
        return Err(SchedulerError::conflict(format!(
            "{} is locked and cannot be rescheduled",
            request.block_id
        )));
    }

    let new_day = state
        .capacity_by_date
        .get(&request.new_date)
        .ok_or_else(|| SchedulerError::not_found("day_capacity", request.new_date.to_string()))?;
    let duration = block.duration_minutes();
    let new_end = request.new_start_minute + duration;
    let slot_available = new_day
        .time_slots
        .iter()
        .any(|s| s.available && s.start_minute <= request.new_start_minute && s.end_minute >= new_end)
        || (block.date == request.new_date
            && block.start_minute == request.new_start_minute); // no-op move
    if !slot_available {
        return Err(SchedulerError::conflict(format!(
            "no free slot at {} on {} fits a {}-minute block",
            request.new_start_minute, request.new_date, duration
        )));
    }

    check_dependency_ordering(state, &block.task_id, request.new_date)?;
    Ok(())
}

fn check_dependency_ordering(
    state: &SchedulerState,
    task_id: &str,
    new_date: NaiveDate,
) -> SchedulerResult<()> {
    let Some(smart_task) = state.smart_tasks.get(task_id) else {
        return Ok(());
    };

    for predecessor_id in &smart_task.task.blocked_by {
        if let Some(latest) = state.blocks_for_task(predecessor_id).map(|b| b.date).max() {
            if latest > new_date {
                return Err(SchedulerError::conflict(format!(
                    "{task_id} cannot move before its dependency {predecessor_id} finishes"
                )));
            }
        }
    }
    for dependent_id in &smart_task.blocks {
        if let Some(earliest) = state.blocks_for_task(dependent_id).map(|b| b.date).min() {
            if earliest < new_date {
                return Err(SchedulerError::conflict(format!(
                    "{task_id} cannot move after its dependent {dependent_id} starts"
                )));
            }
        }
    }
    Ok(())
}

fn free_slot(state: &mut SchedulerState, date: NaiveDate, start: u32, end: u32) {
    if let Some(day) = state.capacity_by_date.get_mut(&date) {
        for slot in day.time_slots.iter_mut() {
            if slot.start_minute == start && slot.end_minute == end && !slot.available {
                slot.available = true;
                slot.source = None;
            }
        }
        day.scheduled_minutes -= (end - start) as i64;
        day.available_minutes = day.total_minutes - day.scheduled_minutes;
        day.scheduled_tasks.retain(|b| !(b.start_minute == start && b.end_minute == end));
    }
}

fn move_block(state: &mut SchedulerState, block_id: &str, new_date: NaiveDate, new_start: u32, duration: u32) {
    if let Some(block) = state.blocks.iter_mut().find(|b| b.id == block_id) {
        block.date = new_date;
        block.start_minute = new_start;
        block.end_minute = new_start + duration;
        let relocated = block.clone();
        if let Some(day) = state.capacity_by_date.get_mut(&new_date) {
            day.scheduled_tasks.push(relocated);
        }
    }
}

fn validation_conflict(block_id: &str, message: &str) -> Conflict {
    use crate::models::conflict::{ConflictType, Severity};
    Conflict {
        conflict_type: ConflictType::Collision,
        severity: Severity::Warning,
        affected_task_ids: vec![block_id.to_string()],
        affected_dates: Vec::new(),
        description: message.to_string(),
        auto_resolvable: false,
    }
}
