//! Manual reschedule (§8): a free block can move to any day with room, a
//! locked block never moves, and dependency ordering still has to hold
//! after the move.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use dayplan_scheduler::models::config::{
    ConflictResolutionStrategy, DistributionMode, IntensityMode, SchedulerConfig,
};
use dayplan_scheduler::models::insertion::RescheduleRequest;
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

fn plain_task(id: &str, estimated_minutes: i64) -> Task {
    Task {
        id: id.to_string(),
        title: id.to_string(),
        status: TaskStatus::Pending,
        priority: Priority::Medium,
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
fn unlocked_block_can_be_moved_to_another_working_day() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    let tasks = vec![plain_task("slide-deck", 60)];
    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let (mut scheduler, result) = Scheduler::schedule(input, config(start, end));
    assert_eq!(result.scheduled_count, 1);
    let block = scheduler
        .state()
        .blocks
        .iter()
        .find(|b| b.task_id == "slide-deck")
        .cloned()
        .unwrap();
    assert!(!block.is_locked);

    let target_date = if block.date == start {
        start + chrono::Duration::days(1)
    } else {
        start
    };
    let request = RescheduleRequest {
        block_id: block.id.clone(),
        new_date: target_date,
        new_start_minute: 9 * 60,
    };

    let preview = scheduler.preview_reschedule(&request);
    assert!(preview.success);

    let outcome = scheduler.reschedule_block(&request).expect("move should succeed");
    assert!(outcome.success);
    let moved = outcome.block.expect("a moved block is returned on success");
    assert_eq!(moved.date, target_date);
    assert_eq!(moved.start_minute, 9 * 60);
}

#[test]
fn locked_block_from_an_emergency_insertion_cannot_be_rescheduled() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
    let tasks: Vec<Task> = Vec::new();
    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let (mut scheduler, _) = Scheduler::schedule(input, config(start, end));

    let block = scheduler
        .quick_insert_today(plain_task("hotfix", 45))
        .expect("empty day has room")
        .new_block;
    assert!(block.is_locked);

    let request = RescheduleRequest {
        block_id: block.id.clone(),
        new_date: start + chrono::Duration::days(1),
        new_start_minute: 9 * 60,
    };
    let preview = scheduler.preview_reschedule(&request);
    assert!(!preview.success);
    let result = scheduler.reschedule_block(&request);
    assert!(result.is_err());
}

#[test]
fn dependent_cannot_be_rescheduled_before_its_predecessor_finishes() {
    let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

    let mut predecessor = plain_task("spec", 60);
    let mut dependent = plain_task("build", 60);
    dependent.blocked_by = vec![predecessor.id.clone()];
    predecessor.blocking = vec![dependent.id.clone()];
    let tasks = vec![predecessor, dependent];

    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let (mut scheduler, result) = Scheduler::schedule(input, config(start, end));
    assert_eq!(result.scheduled_count, 2);

    let predecessor_block = scheduler
        .state()
        .blocks
        .iter()
        .find(|b| b.task_id == "spec")
        .cloned()
        .unwrap();
    let dependent_block = scheduler
        .state()
        .blocks
        .iter()
        .find(|b| b.task_id == "build")
        .cloned()
        .unwrap();

    // Trying to move the dependent before its predecessor's own placement
    // must be rejected, whether or not there is free capacity that day.
    let request = RescheduleRequest {
        block_id: dependent_block.id.clone(),
        new_date: predecessor_block.date - chrono::Duration::days(1),
        new_start_minute: 9 * 60,
    };
    let preview = scheduler.preview_reschedule(&request);
    assert!(!preview.success);
}
