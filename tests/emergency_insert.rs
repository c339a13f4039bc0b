//! Emergency insertion and ripple planning (§8): an urgent task either slots
//! into free capacity, or displaces later unlocked blocks with a classified
//! ripple, never a locked one.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use dayplan_scheduler::models::block::ScheduledBlock;
use dayplan_scheduler::models::config::{
    ConflictResolutionStrategy, DistributionMode, IntensityMode, SchedulerConfig,
};
use dayplan_scheduler::models::insertion::InsertionRequest;
use dayplan_scheduler::models::state::SchedulerState;
use dayplan_scheduler::models::task::{Priority, Task, TaskStatus};
use dayplan_scheduler::services::packer::SchedulingInput;
use dayplan_scheduler::Scheduler;

fn config(start: NaiveDate, end: NaiveDate) -> SchedulerConfig {
    SchedulerConfig {
        start_date: start,
        end_date: end,
        working_days: [1, 2, 3, 4, 5].into_iter().collect::<BTreeSet<u8>>(),
        working_hours_start_minute: 9 * 60,
        working_hours_end_minute: 17 * 60,
        lunch_break: None,
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

fn urgent_task(id: &str, estimated_minutes: i64) -> Task {
    Task {
        id: id.to_string(),
        title: id.to_string(),
        status: TaskStatus::Pending,
        priority: Priority::Urgent,
        estimated_minutes,
        due_date: None,
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
fn inserting_into_an_empty_day_needs_no_ripple() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let tasks: Vec<Task> = Vec::new();
    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let (scheduler, _) = Scheduler::schedule(input, config(start, end));

    let request = InsertionRequest {
        task: urgent_task("fire-drill", 60),
        target_date: start,
        target_start_minute: 9 * 60,
        must_complete: false,
    };
    let preview = scheduler.preview_emergency_insertion(&request);
    assert!(preview.can_insert);
    assert!(preview.ripple_effects.is_empty());
}

#[test]
fn inserting_over_an_existing_block_ripples_it_later_in_the_day() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let existing = urgent_task("already-planned", 60);
    let tasks = vec![existing.clone()];
    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let (mut scheduler, result) = Scheduler::schedule(input, config(start, end));
    assert_eq!(result.scheduled_count, 1);
    let existing_block: ScheduledBlock = scheduler
        .state()
        .blocks
        .iter()
        .find(|b| b.task_id == "already-planned")
        .cloned()
        .expect("the only task should have been scheduled");

    let request = InsertionRequest {
        task: urgent_task("fire-drill", 30),
        target_date: start,
        target_start_minute: existing_block.start_minute,
        must_complete: false,
    };
    let outcome = scheduler
        .execute_emergency_insertion(&request)
        .expect("unlocked block should ripple out of the way");
    assert_eq!(outcome.applied_ripples.len(), 1);
    assert_eq!(outcome.applied_ripples[0].block_id, existing_block.id);
    assert!(outcome.applied_ripples[0].new_start_minute >= existing_block.start_minute);
}

#[test]
fn two_back_to_back_blocks_cascade_per_the_worked_example() {
    // Mirrors the spec's worked scenario: a day already has B1 10:00-11:00
    // and B2 11:00-12:00, both movable. Inserting a 60-minute urgent task at
    // 10:00 with mustComplete should push B1 to 11:05-12:05 and B2 to
    // 12:10-13:10, with both counted as affected.
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let cfg = config(start, end);

    let mut day = dayplan_scheduler::services::capacity::build_day(start, &cfg, None, Vec::new());
    dayplan_scheduler::services::capacity::reserve(
        &mut day,
        10 * 60,
        60,
        dayplan_scheduler::models::capacity::SlotSource::Task,
        5,
    )
    .unwrap();
    dayplan_scheduler::services::capacity::reserve(
        &mut day,
        11 * 60,
        60,
        dayplan_scheduler::models::capacity::SlotSource::Task,
        5,
    )
    .unwrap();
    day.scheduled_tasks.push(ScheduledBlock {
        id: "b1".to_string(),
        task_id: "b1-task".to_string(),
        date: start,
        start_minute: 10 * 60,
        end_minute: 11 * 60,
        reasoning: String::new(),
        is_locked: false,
        session_info: None,
    });
    day.scheduled_tasks.push(ScheduledBlock {
        id: "b2".to_string(),
        task_id: "b2-task".to_string(),
        date: start,
        start_minute: 11 * 60,
        end_minute: 12 * 60,
        reasoning: String::new(),
        is_locked: false,
        session_info: None,
    });

    let mut state = SchedulerState::new(cfg, None);
    state.capacity_by_date.insert(start, day);

    let request = InsertionRequest {
        task: urgent_task("fire-drill", 60),
        target_date: start,
        target_start_minute: 10 * 60,
        must_complete: true,
    };
    let preview = dayplan_scheduler::services::emergency::preview_emergency_insertion(&state, &request);
    assert!(preview.can_insert);
    assert_eq!(preview.total_items_affected, 2);

    let b1 = preview.ripple_effects.iter().find(|r| r.block_id == "b1").unwrap();
    let b2 = preview.ripple_effects.iter().find(|r| r.block_id == "b2").unwrap();
    assert_eq!(b1.new_start_minute, 11 * 60 + 5);
    assert_eq!(b1.new_end_minute, 12 * 60 + 5);
    assert_eq!(b2.new_start_minute, 12 * 60 + 10);
    assert_eq!(b2.new_end_minute, 13 * 60 + 10);
}

#[test]
fn locked_block_cannot_be_displaced() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let tasks: Vec<Task> = Vec::new();
    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let (mut scheduler, _) = Scheduler::schedule(input, config(start, end));

    // Lock in a block directly via an emergency insertion, then try to
    // insert right on top of it a second time.
    let first = InsertionRequest {
        task: urgent_task("locked-task", 60),
        target_date: start,
        target_start_minute: 9 * 60,
        must_complete: true,
    };
    scheduler.execute_emergency_insertion(&first).unwrap();

    let second = InsertionRequest {
        task: urgent_task("conflicting-task", 30),
        target_date: start,
        target_start_minute: 9 * 60,
        must_complete: false,
    };
    let preview = scheduler.preview_emergency_insertion(&second);
    assert!(!preview.can_insert);
}
