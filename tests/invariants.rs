//! Universal invariants (§8) checked against randomly generated task sets:
//! no two blocks collide, every block sits inside its day's working window,
//! and every input task is accounted for as scheduled or unscheduled, never
//! both and never neither.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use dayplan_scheduler::models::config::{
    ConflictResolutionStrategy, DistributionMode, IntensityMode, SchedulerConfig,
};
use dayplan_scheduler::models::task::{Priority, Task, TaskStatus};
use dayplan_scheduler::services::packer::{schedule_all, SchedulingInput};
use proptest::prelude::*;

const RANGE_START: &str = "2025-03-03"; // a Monday
const RANGE_END: &str = "2025-03-21"; // three working weeks

fn range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::parse_from_str(RANGE_START, "%Y-%m-%d").unwrap(),
        NaiveDate::parse_from_str(RANGE_END, "%Y-%m-%d").unwrap(),
    )
}

fn config() -> SchedulerConfig {
    let (start, end) = range();
    SchedulerConfig {
        start_date: start,
        end_date: end,
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

fn arbitrary_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Urgent),
    ]
}

/// A single independent task: no dependencies, no due date, so the packer
/// is free to place it anywhere in range — keeps the property about
/// collision/window-containment from being entangled with deadline logic.
fn arbitrary_task() -> impl Strategy<Value = Task> {
    (
        1usize..40,
        15i64..300,
        arbitrary_priority(),
    )
        .prop_map(|(index, estimated_minutes, priority)| Task {
            id: format!("task-{index}"),
            title: format!("task-{index}"),
            status: TaskStatus::Pending,
            priority,
            estimated_minutes,
            due_date: None,
            scheduled_start: None,
            project_id: None,
            milestone_id: None,
            tags: BTreeSet::new(),
            blocked_by: Vec::new(),
            blocking: Vec::new(),
            actual_duration_minutes: None,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scheduled_blocks_never_overlap_within_a_day(tasks in prop::collection::vec(arbitrary_task(), 0..12)) {
        // de-duplicate ids so distinct generated tasks don't collide by name
        let mut seen = HashSet::new();
        let tasks: Vec<Task> = tasks.into_iter().filter(|t| seen.insert(t.id.clone())).collect();

        let input = SchedulingInput {
            tasks: &tasks,
            projects: &[],
            milestones: &[],
            habits: &[],
            learning: None,
        };
        let result = schedule_all(input, config());

        for preview in &result.previews {
            let mut blocks = preview.blocks.clone();
            blocks.sort_by_key(|b| b.start_minute);
            for pair in blocks.windows(2) {
                prop_assert!(
                    pair[0].end_minute <= pair[1].start_minute,
                    "blocks {:?} and {:?} overlap on {}",
                    pair[0].task_id,
                    pair[1].task_id,
                    preview.date
                );
            }
        }
    }

    #[test]
    fn every_scheduled_block_lies_within_its_days_working_window(tasks in prop::collection::vec(arbitrary_task(), 0..12)) {
        let mut seen = HashSet::new();
        let tasks: Vec<Task> = tasks.into_iter().filter(|t| seen.insert(t.id.clone())).collect();
        let cfg = config();

        let input = SchedulingInput {
            tasks: &tasks,
            projects: &[],
            milestones: &[],
            habits: &[],
            learning: None,
        };
        let result = schedule_all(input, cfg.clone());

        for preview in &result.previews {
            for block in &preview.blocks {
                prop_assert!(block.start_minute >= cfg.working_hours_start_minute);
                prop_assert!(block.end_minute <= cfg.working_hours_end_minute);
                if let Some((lunch_start, lunch_end)) = cfg.lunch_break {
                    let overlaps_lunch = block.start_minute < lunch_end && lunch_start < block.end_minute;
                    prop_assert!(!overlaps_lunch, "block for {} overlaps lunch", block.task_id);
                }
            }
        }
    }

    #[test]
    fn every_task_ends_up_scheduled_xor_unscheduled_exactly_once(tasks in prop::collection::vec(arbitrary_task(), 0..12)) {
        let mut seen = HashSet::new();
        let tasks: Vec<Task> = tasks.into_iter().filter(|t| seen.insert(t.id.clone())).collect();
        let total = tasks.len();

        let input = SchedulingInput {
            tasks: &tasks,
            projects: &[],
            milestones: &[],
            habits: &[],
            learning: None,
        };
        let result = schedule_all(input, config());

        prop_assert_eq!(result.scheduled_count + result.unscheduled_count, total);

        let scheduled_ids: HashSet<&str> = result
            .previews
            .iter()
            .flat_map(|p| p.blocks.iter())
            .map(|b| b.task_id.as_str())
            .collect();
        for task in &tasks {
            let appears_scheduled = scheduled_ids.contains(task.id.as_str());
            let appears_unscheduled = result.unscheduled_task_ids.iter().any(|id| id == &task.id);
            prop_assert!(
                appears_scheduled != appears_unscheduled,
                "task {} must be exactly one of scheduled/unscheduled",
                task.id
            );
        }
    }
}

#[test]
fn scheduler_config_round_trips_through_json() {
    let cfg = config();
    let json = serde_json::to_string(&cfg).expect("config should serialize");
    let decoded: SchedulerConfig = serde_json::from_str(&json).expect("config should deserialize");
    assert_eq!(cfg, decoded);
}

#[test]
fn scheduling_result_round_trips_through_json() {
    let tasks = vec![Task {
        id: "round-trip".to_string(),
        title: "round-trip".to_string(),
        status: TaskStatus::Pending,
        priority: Priority::Medium,
        estimated_minutes: 90,
        due_date: None,
        scheduled_start: None,
        project_id: None,
        milestone_id: None,
        tags: BTreeSet::new(),
        blocked_by: Vec::new(),
        blocking: Vec::new(),
        actual_duration_minutes: None,
    }];
    let input = SchedulingInput {
        tasks: &tasks,
        projects: &[],
        milestones: &[],
        habits: &[],
        learning: None,
    };
    let result = schedule_all(input, config());
    let json = serde_json::to_string(&result).expect("result should serialize");
    let decoded: dayplan_scheduler::models::result::SchedulingResult =
        serde_json::from_str(&json).expect("result should deserialize");
    assert_eq!(result, decoded);
}
