//! Emergency insertion and ripple planning (C6, §4.6). An incoming task
//! either fits into existing free capacity outright, or displaces
//! already-scheduled, non-locked blocks later the same day (a "ripple"),
//! classified by how far each displaced block had to move.

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{SchedulerError, SchedulerResult};
use crate::models::block::ScheduledBlock;
use crate::models::capacity::SlotSource;
use crate::models::insertion::{EmergencyInsertResult, InsertionPreview, InsertionRequest, RippleEffect, RippleSeverity};
use crate::models::state::SchedulerState;
use crate::services::capacity;
use crate::services::conflicts;

/// Computes what would happen if `request` were inserted, without mutating
/// `state`.
pub fn preview_emergency_insertion(state: &SchedulerState, request: &InsertionRequest) -> InsertionPreview {
    let Some(day) = state.capacity_by_date.get(&request.target_date) else {
        return blocked_preview("target date is outside the scheduling range");
    };

    let duration = request.task.estimated_minutes.max(1) as u32;
    let end_minute = request.target_start_minute + duration;

    if !request.must_complete && slot_is_free(day, request.target_start_minute, end_minute) {
        return InsertionPreview {
            can_insert: true,
            proposed_start_minute: Some(request.target_start_minute),
            proposed_end_minute: Some(end_minute),
            ripple_effects: Vec::new(),
            warnings: Vec::new(),
            total_items_affected: 0,
            summary: "fits into existing free capacity, no ripple needed".to_string(),
        };
    }

    let displaced = blocks_overlapping(day.scheduled_tasks.iter(), request.target_start_minute, end_minute);
    if displaced.iter().any(|b| b.is_locked) {
        return blocked_preview("overlaps a locked block that cannot be moved");
    }

    let ripple_effects = plan_ripples(state, &displaced, request.target_date, end_minute);
    let mut warnings = Vec::new();
    if due_date_would_be_missed(&displaced, state, &ripple_effects) {
        warnings.push("shifting these blocks may push one past its due date".to_string());
    }

    let has_significant_ripple = ripple_effects.iter().any(|r| r.severity == RippleSeverity::Significant);
    let can_insert = request.must_complete || !has_significant_ripple;
    if !can_insert {
        warnings.push("a shifted block would move significantly; use mustComplete to force it".to_string());
    }

    InsertionPreview {
        can_insert,
        proposed_start_minute: Some(request.target_start_minute),
        proposed_end_minute: Some(end_minute),
        total_items_affected: ripple_effects.len(),
        summary: format!(
            "requires shifting {} existing block(s) later in the day",
            ripple_effects.len()
        ),
        ripple_effects,
        warnings,
    }
}

fn blocked_preview(reason: &str) -> InsertionPreview {
    InsertionPreview {
        can_insert: false,
        proposed_start_minute: None,
        proposed_end_minute: None,
        ripple_effects: Vec::new(),
        warnings: vec![reason.to_string()],
        total_items_affected: 0,
        summary: reason.to_string(),
    }
}

fn slot_is_free(day: &crate::models::capacity::DayCapacity, start: u32, end: u32) -> bool {
    day.time_slots
        .iter()
        .any(|s| s.available && s.start_minute <= start && s.end_minute >= end)
}

fn blocks_overlapping<'a>(
    blocks: impl Iterator<Item = &'a ScheduledBlock>,
    start: u32,
    end: u32,
) -> Vec<ScheduledBlock> {
    // `<=` on the end bound so a block that starts exactly when the
    // incoming window ends is still caught — it sits right where the first
    // ripple will land it, so it has to cascade too.
    blocks
        .filter(|b| b.start_minute <= end && start < b.end_minute)
        .cloned()
        .collect()
}

fn plan_ripples(
    state: &SchedulerState,
    displaced: &[ScheduledBlock],
    date: NaiveDate,
    earliest_new_start: u32,
) -> Vec<RippleEffect> {
    let mut ordered = displaced.to_vec();
    ordered.sort_by_key(|b| b.start_minute);

    let transition = state.config.breaks_between_tasks_minutes.max(0) as u32;
    let mut cursor = earliest_new_start + transition;
    let mut effects = Vec::new();

    for block in ordered {
        let duration = block.duration_minutes();
        let new_start = cursor;
        let new_end = new_start + duration;
        let shift_minutes = (new_start as i64) - (block.start_minute as i64);
        effects.push(RippleEffect {
            block_id: block.id.clone(),
            task_id: block.task_id.clone(),
            old_start_minute: block.start_minute,
            old_end_minute: block.end_minute,
            new_start_minute: new_start,
            new_end_minute: new_end,
            severity: RippleSeverity::for_shift_minutes(shift_minutes),
            impact_description: format!(
                "{} moves from {:02}:{:02} to {:02}:{:02} on {}",
                block.task_id,
                block.start_minute / 60,
                block.start_minute % 60,
                new_start / 60,
                new_start % 60,
                date
            ),
        });
        cursor = new_end + transition;
    }
    effects
}

fn due_date_would_be_missed(
    displaced: &[ScheduledBlock],
    state: &SchedulerState,
    ripples: &[RippleEffect],
) -> bool {
    displaced.iter().any(|block| {
        let Some(smart_task) = state.smart_tasks.get(&block.task_id) else {
            return false;
        };
        let Some(due) = smart_task.due_date() else {
            return false;
        };
        let ripple_end_minute = ripples
            .iter()
            .find(|r| r.block_id == block.id)
            .map(|r| r.new_end_minute)
            .unwrap_or(block.end_minute);
        ripple_end_minute > state.config.working_hours_end_minute && block.date >= due
    })
}

/// Whether `preview` represents an insertion that is actually safe to
/// apply — `can_insert` plus no locked-block conflict.
pub fn can_insert(preview: &InsertionPreview) -> bool {
    preview.can_insert
}

/// Applies the ripple plan atomically: every displaced block is moved, then
/// the new task is appended as a locked block. Errors (leaving `state`
/// unmodified) if the preview says the insertion cannot happen, or if any
/// displaced block's new placement no longer fits.
pub fn execute_emergency_insertion(
    state: &mut SchedulerState,
    request: &InsertionRequest,
) -> SchedulerResult<EmergencyInsertResult> {
    let preview = preview_emergency_insertion(state, request);
    if !can_insert(&preview) {
        return Err(SchedulerError::conflict(preview.summary));
    }

    let date = request.target_date;
    for ripple in &preview.ripple_effects {
        relocate_block(state, date, ripple)?;
    }

    let duration = request.task.estimated_minutes.max(1) as u32;
    let start = preview
        .proposed_start_minute
        .ok_or_else(|| SchedulerError::other("preview reported can_insert without a proposed start"))?;

    let day = state
        .capacity_by_date
        .get_mut(&date)
        .ok_or_else(|| SchedulerError::not_found("day_capacity", date.to_string()))?;
    capacity::reserve(day, start, duration, SlotSource::Task, state.config.breaks_between_tasks_minutes)?;

    let new_block = ScheduledBlock {
        id: Uuid::new_v4().to_string(),
        task_id: request.task.id.clone(),
        date,
        start_minute: start,
        end_minute: start + duration,
        reasoning: "emergency insertion".to_string(),
        is_locked: true,
        session_info: None,
    };
    day.scheduled_tasks.push(new_block.clone());
    state.blocks.push(new_block.clone());
    state.mark_scheduled(&request.task.id);

    let (conflicts, _warnings) = conflicts::detect_all(state);
    info!(task_id = %request.task.id, ripples = preview.ripple_effects.len(), "emergency insertion applied");

    Ok(EmergencyInsertResult {
        new_block,
        applied_ripples: preview.ripple_effects,
        conflicts,
    })
}

fn relocate_block(state: &mut SchedulerState, date: NaiveDate, ripple: &RippleEffect) -> SchedulerResult<()> {
    let day = state
        .capacity_by_date
        .get_mut(&date)
        .ok_or_else(|| SchedulerError::not_found("day_capacity", date.to_string()))?;

    free_block_slot(day, ripple.block_id.as_str(), ripple.old_start_minute, ripple.old_end_minute);
    let duration = ripple.new_end_minute - ripple.new_start_minute;
    capacity::reserve(
        day,
        ripple.new_start_minute,
        duration,
        SlotSource::Task,
        state.config.breaks_between_tasks_minutes,
    )?;

    if let Some(block) = day.scheduled_tasks.iter_mut().find(|b| b.id == ripple.block_id) {
        block.start_minute = ripple.new_start_minute;
        block.end_minute = ripple.new_end_minute;
    }
    if let Some(block) = state.blocks.iter_mut().find(|b| b.id == ripple.block_id) {
        block.start_minute = ripple.new_start_minute;
        block.end_minute = ripple.new_end_minute;
    }
    warn!(block_id = %ripple.block_id, "relocated block to make room for an emergency insertion");
    Ok(())
}

fn free_block_slot(day: &mut crate::models::capacity::DayCapacity, block_id: &str, start: u32, end: u32) {
    for slot in day.time_slots.iter_mut() {
        if slot.start_minute == start && slot.end_minute == end && !slot.available {
            slot.available = true;
            slot.source = None;
        }
    }
    day.scheduled_minutes -= (end - start) as i64;
    day.available_minutes = day.total_minutes - day.scheduled_minutes;
    let _ = block_id;
}

/// Convenience form: insert `request.task` as early as possible today,
/// forcing `mustComplete` so a displacing ripple never blocks it.
pub fn quick_insert_today(
    state: &mut SchedulerState,
    mut request: InsertionRequest,
) -> SchedulerResult<EmergencyInsertResult> {
    request.target_date = state.config.start_date;
    request.target_start_minute = state.config.working_hours_start_minute;
    request.must_complete = true;
    execute_emergency_insertion(state, &request)
}

/// Convenience form: find the first day with any free capacity for the
/// task's duration and insert it at the start of that day's earliest slot.
pub fn insert_next_available(
    state: &mut SchedulerState,
    mut request: InsertionRequest,
) -> SchedulerResult<EmergencyInsertResult> {
    let duration = request.task.estimated_minutes.max(1) as u32;
    let mut dates: Vec<NaiveDate> = state.capacity_by_date.keys().copied().collect();
    dates.sort();

    let found = dates.into_iter().find_map(|date| {
        state
            .capacity_by_date
            .get(&date)
            .and_then(|day| capacity::find_best_slot(day, duration, false, false))
            .map(|candidate| (date, candidate.start_minute))
    });

    let (date, start_minute) = found.ok_or_else(|| {
        SchedulerError::conflict("no day in the scheduling range has capacity for this task".to_string())
    })?;
    request.target_date = date;
    request.target_start_minute = start_minute;
    execute_emergency_insertion(state, &request)
}
