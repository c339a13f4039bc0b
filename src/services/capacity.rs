//! Capacity modeling (C3, §4.3): builds the per-day `time_slots` tiling,
//! reserves a slot for a placed block, and finds the best slot/day for a
//! task given its flexibility and energy preferences.

use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::error::{SchedulerError, SchedulerResult};
use crate::models::capacity::{DayCapacity, EnergyProfile, SlotSource, TimeSlot};
use crate::models::config::SchedulerConfig;
use crate::models::smart_task::SmartTask;
use crate::models::task::Habit;

/// A fixed interval already occupying part of a day before any task
/// placement begins — an active habit occurrence or an external calendar
/// event.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    pub start_minute: u32,
    pub end_minute: u32,
    pub source: SlotSource,
}

/// Builds the initial `DayCapacity` for `date`: the working window tiled
/// into one big available slot, then clipped by `fixed` intervals (lunch,
/// active habits, external calendar events) sorted and merged by start time.
pub fn build_day(
    date: NaiveDate,
    config: &SchedulerConfig,
    energy_profile: Option<&EnergyProfile>,
    mut fixed: Vec<FixedInterval>,
) -> DayCapacity {
    if let Some((lunch_start, lunch_end)) = config.lunch_break {
        fixed.push(FixedInterval {
            start_minute: lunch_start,
            end_minute: lunch_end,
            source: SlotSource::Lunch,
        });
    }
    fixed.sort_by_key(|f| f.start_minute);

    let work_start = config.working_hours_start_minute;
    let work_end = config.working_hours_end_minute;
    let mut slots = Vec::new();
    let mut cursor = work_start;

    for interval in &fixed {
        let start = interval.start_minute.max(work_start);
        let end = interval.end_minute.min(work_end);
        if end <= start || start < cursor {
            continue;
        }
        if start > cursor {
            slots.push(make_slot(cursor, start, true, None, energy_profile));
        }
        slots.push(make_slot(start, end, false, Some(interval.source), energy_profile));
        cursor = end;
    }
    if cursor < work_end {
        slots.push(make_slot(cursor, work_end, true, None, energy_profile));
    }

    let total_minutes = (work_end as i64 - work_start as i64).max(0);
    let scheduled_minutes: i64 = slots
        .iter()
        .filter(|s| !s.available)
        .map(|s| s.duration_minutes() as i64)
        .sum();

    DayCapacity {
        date,
        work_start_minute: work_start,
        work_end_minute: work_end,
        total_minutes,
        scheduled_minutes,
        available_minutes: total_minutes - scheduled_minutes,
        time_slots: slots,
        scheduled_tasks: Vec::new(),
    }
}

fn make_slot(
    start: u32,
    end: u32,
    available: bool,
    source: Option<SlotSource>,
    energy_profile: Option<&EnergyProfile>,
) -> TimeSlot {
    TimeSlot {
        start_minute: start,
        end_minute: end,
        available,
        source,
        is_peak_energy: energy_profile.is_some_and(|p| p.is_peak(start)),
        is_low_energy: energy_profile.is_some_and(|p| p.is_low(start)),
    }
}

/// Whether `habit` occurs on `date` and, if so, the fixed interval it
/// contributes (`None` for informational-only habits with no scheduled
/// time).
pub fn habit_interval(habit: &Habit, date: NaiveDate) -> Option<FixedInterval> {
    use chrono::Datelike;
    if !habit.active || !habit.frequency.matches(date.weekday()) {
        return None;
    }
    let start = habit.scheduled_time_minutes?;
    Some(FixedInterval {
        start_minute: start,
        end_minute: start + habit.duration_minutes.max(0) as u32,
        source: SlotSource::Habit,
    })
}

/// Splits the available slot covering `[start, start+duration)` into up to
/// three pieces: a leading gap, the newly blocked interval, and a trailing
/// gap shortened by the configured inter-task transition break. Errors with
/// `SchedulerError::Conflict` if no single available slot covers the range.
pub fn reserve(
    day: &mut DayCapacity,
    start: u32,
    duration: u32,
    source: SlotSource,
    transition_break_minutes: i64,
) -> SchedulerResult<()> {
    let end = start + duration;
    let index = day
        .time_slots
        .iter()
        .position(|s| s.available && s.start_minute <= start && s.end_minute >= end)
        .ok_or_else(|| {
            SchedulerError::conflict(format!(
                "no available slot covers [{start}, {end}) on {}",
                day.date
            ))
        })?;

    let slot = day.time_slots[index].clone();
    let mut replacement = Vec::new();

    if slot.start_minute < start {
        replacement.push(TimeSlot {
            start_minute: slot.start_minute,
            end_minute: start,
            ..slot.clone()
        });
    }

    replacement.push(TimeSlot {
        start_minute: start,
        end_minute: end,
        available: false,
        source: Some(source),
        is_peak_energy: slot.is_peak_energy,
        is_low_energy: slot.is_low_energy,
    });

    let trailing_start = if transition_break_minutes > 0 && end < slot.end_minute {
        let break_end = (end as i64 + transition_break_minutes) as u32;
        let break_end = break_end.min(slot.end_minute);
        replacement.push(TimeSlot {
            start_minute: end,
            end_minute: break_end,
            available: false,
            source: Some(SlotSource::TransitionBreak),
            is_peak_energy: false,
            is_low_energy: false,
        });
        break_end
    } else {
        end
    };

    if trailing_start < slot.end_minute {
        replacement.push(TimeSlot {
            start_minute: trailing_start,
            end_minute: slot.end_minute,
            ..slot
        });
    }

    day.time_slots.splice(index..=index, replacement);
    day.scheduled_minutes += duration as i64;
    day.available_minutes = day.total_minutes - day.scheduled_minutes;
    trace!(date = %day.date, start, duration, "reserved slot");
    Ok(())
}

/// Candidate placement returned by `find_best_slot`.
#[derive(Debug, Clone, Copy)]
pub struct SlotCandidate {
    pub start_minute: u32,
    pub duration_minutes: u32,
}

/// Picks the best available slot on `day` that can fit `duration_minutes`,
/// honoring `prefer_peak`/`avoid_low` when the day carries an energy
/// profile, falling back to the earliest available slot otherwise.
pub fn find_best_slot(
    day: &DayCapacity,
    duration_minutes: u32,
    prefer_peak: bool,
    avoid_low: bool,
) -> Option<SlotCandidate> {
    let mut fitting: Vec<&TimeSlot> = day
        .time_slots
        .iter()
        .filter(|s| s.available && s.duration_minutes() >= duration_minutes)
        .collect();
    if fitting.is_empty() {
        return None;
    }

    fitting.sort_by_key(|s| s.start_minute);

    if prefer_peak {
        if let Some(slot) = fitting.iter().find(|s| s.is_peak_energy) {
            return Some(SlotCandidate {
                start_minute: slot.start_minute,
                duration_minutes,
            });
        }
    }
    if avoid_low {
        if let Some(slot) = fitting.iter().find(|s| !s.is_low_energy) {
            return Some(SlotCandidate {
                start_minute: slot.start_minute,
                duration_minutes,
            });
        }
    }
    fitting.first().map(|slot| SlotCandidate {
        start_minute: slot.start_minute,
        duration_minutes,
    })
}

/// Finds the largest available slot on `day` that is at least `min_minutes`
/// long, capped to `max_minutes`. Unlike `find_best_slot`, the returned
/// duration reflects what the day can actually give this session — smaller
/// than `max_minutes` when no slot is that big — so a caller splitting a
/// task across days fills each day's leftover capacity instead of wasting
/// it on a fixed-size chunk.
pub fn find_session_slot(day: &DayCapacity, max_minutes: u32, min_minutes: u32) -> Option<SlotCandidate> {
    let mut fitting: Vec<&TimeSlot> = day
        .time_slots
        .iter()
        .filter(|s| s.available && s.duration_minutes() >= min_minutes)
        .collect();
    if fitting.is_empty() {
        return None;
    }
    fitting.sort_by(|a, b| b.duration_minutes().cmp(&a.duration_minutes()).then(a.start_minute.cmp(&b.start_minute)));
    let slot = fitting[0];
    Some(SlotCandidate {
        start_minute: slot.start_minute,
        duration_minutes: slot.duration_minutes().min(max_minutes),
    })
}

/// Finds the working day in `[search_start, search_end]` closest to
/// `smart_task.ideal_completion_date` that has capacity for
/// `duration_minutes`, falling back to the day with the most available
/// overtime capacity when `allow_overtime` is set and no day has headroom
/// within normal hours.
pub fn find_best_day_for_task<'a>(
    smart_task: &SmartTask,
    capacity_by_date: &'a std::collections::HashMap<NaiveDate, DayCapacity>,
    search_start: NaiveDate,
    search_end: NaiveDate,
    config: &SchedulerConfig,
) -> Option<&'a DayCapacity> {
    let ideal = smart_task
        .ideal_completion_date
        .unwrap_or(search_start)
        .clamp(search_start, search_end);
    let duration = smart_task.effective_estimate_minutes.max(1) as u32;

    let mut candidates: Vec<&DayCapacity> = capacity_by_date
        .values()
        .filter(|d| d.date >= search_start && d.date <= search_end)
        .collect();
    candidates.sort_by_key(|d| (d.date - ideal).num_days().abs());

    if let Some(day) = candidates
        .iter()
        .find(|d| find_best_slot(d, duration, false, false).is_some())
    {
        return Some(day);
    }

    if config.allow_overtime {
        let max_overtime = config.max_overtime_minutes();
        return candidates
            .into_iter()
            .filter(|d| d.overtime_minutes() < max_overtime)
            .max_by_key(|d| d.available_minutes);
    }

    debug!(task_id = %smart_task.task.id, "no day in range has capacity for task");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ConflictResolutionStrategy, DistributionMode, IntensityMode};
    use std::collections::BTreeSet;

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            start_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
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
            focus_project_ids: Default::default(),
            focus_project_ratio: None,
            energy_profile: None,
            schedule_high_focus_in_peak: false,
            auto_resolve_conflicts: false,
            conflict_resolution_strategy: ConflictResolutionStrategy::Conservative,
        }
    }

    #[test]
    fn build_day_clips_around_lunch() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let day = build_day(date, &config(), None, Vec::new());
        assert_eq!(day.total_minutes, 8 * 60);
        assert_eq!(day.scheduled_minutes, 60);
        assert!(day
            .time_slots
            .iter()
            .any(|s| !s.available && s.source == Some(SlotSource::Lunch)));
    }

    #[test]
    fn reserve_splits_slot_and_adds_transition_break() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let mut day = build_day(date, &config(), None, Vec::new());
        reserve(&mut day, 9 * 60, 60, SlotSource::Task, 5).unwrap();
        assert!(day
            .time_slots
            .iter()
            .any(|s| s.source == Some(SlotSource::TransitionBreak)));
        assert_eq!(day.scheduled_minutes, 60 + 60); // lunch + task
    }

    #[test]
    fn reserve_fails_when_no_slot_covers_range() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let mut day = build_day(date, &config(), None, Vec::new());
        let result = reserve(&mut day, 11 * 60 + 30, 60, SlotSource::Task, 5);
        assert!(result.is_err());
    }

    #[test]
    fn find_best_slot_returns_earliest_fit() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let day = build_day(date, &config(), None, Vec::new());
        let candidate = find_best_slot(&day, 30, false, false).unwrap();
        assert_eq!(candidate.start_minute, 9 * 60);
    }
}
