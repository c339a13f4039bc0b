//! Task analyzer (C2, §4.2): derives a `SmartTask` from a raw `Task` plus
//! its project/milestone/sibling context.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::capacity::EnergyProfile;
use crate::models::config::SchedulerConfig;
use crate::models::learning::LearningData;
use crate::models::smart_task::{Flexibility, SmartTask, TimeOfDay, DEFAULT_MIN_SESSION_MINUTES};
use crate::models::task::{Milestone, Priority, Project, Task};
use crate::services::learning::adjust_estimate;
use crate::services::time;

const FIXED_TAGS: [&str; 4] = ["meeting", "call", "appointment", "fixed"];
const DELEGATABLE_TAGS: [&str; 2] = ["delegatable", "optional"];
const NO_SPLIT_TAGS: [&str; 3] = ["no-split", "meeting", "call"];
const HIGH_FOCUS_TAGS: [&str; 7] = [
    "deep-work",
    "focus",
    "creative",
    "coding",
    "writing",
    "design",
    "analysis",
];

/// Everything the analyzer needs beyond the `Task` itself. One context is
/// built per scheduling run and reused across all tasks in a project.
pub struct AnalysisContext<'a> {
    pub today: NaiveDate,
    pub working_days: &'a std::collections::BTreeSet<u8>,
    pub project: Option<&'a Project>,
    pub milestone: Option<&'a Milestone>,
    /// All tasks in the same project (including `task` itself), used to
    /// build the dependency graph and impute milestone-order edges.
    pub sibling_tasks: &'a [Task],
    pub milestones: &'a [Milestone],
    /// Known completion times of already-scheduled predecessors.
    pub predecessor_completions: &'a HashMap<String, NaiveDateTime>,
    pub learning: Option<&'a LearningData>,
    pub config: &'a SchedulerConfig,
}

pub fn analyze(task: &Task, ctx: &AnalysisContext) -> SmartTask {
    debug!(task_id = %task.id, "analyzing task");

    let effective_estimate_minutes = match ctx.learning {
        Some(learning) => adjust_estimate(task, learning).adjusted_minutes,
        None => task.estimated_minutes,
    };

    let criticality = score_criticality(task, ctx);
    let flexibility = classify_flexibility(task, effective_estimate_minutes);
    let can_be_split = is_splittable(task, effective_estimate_minutes);
    let buffer_days = compute_buffer_days(task, effective_estimate_minutes);

    let graph = DependencyGraph::build(ctx.sibling_tasks, ctx.milestones);
    let dependency_depth = graph.depth(&task.id);
    let blocks = graph.transitive_dependents(&task.id);

    let earliest_start = compute_earliest_start(task, ctx, &graph);
    let latest_end = task.due_date.map(time::end_of_day);
    let ideal_completion_date = task
        .due_date
        .map(|due| time::add_working_days(due, -(buffer_days as i64), ctx.working_days));

    let requires_high_focus = requires_high_focus(task, effective_estimate_minutes);
    let preferred_time_of_day = preferred_time_of_day(&ctx.config.energy_profile);

    SmartTask {
        task: task.clone(),
        criticality,
        flexibility,
        earliest_start,
        latest_end,
        ideal_completion_date,
        buffer_days,
        requires_high_focus,
        preferred_time_of_day,
        can_be_split,
        minimum_session_minutes: DEFAULT_MIN_SESSION_MINUTES,
        maximum_session_minutes: effective_estimate_minutes.max(DEFAULT_MIN_SESSION_MINUTES),
        dependency_depth,
        blocks,
        effective_estimate_minutes,
    }
}

fn score_criticality(task: &Task, ctx: &AnalysisContext) -> u32 {
    let mut score = 0i64;

    score += match task.priority {
        Priority::Urgent => 40,
        Priority::High => 30,
        Priority::Medium => 15,
        Priority::Low => 5,
    };

    score += deadline_urgency_points(task.due_date, ctx.today);
    score += project_behind_schedule_points(ctx.project, ctx.today);
    score += milestone_order_points(ctx.milestone);

    let blocking_count = task.blocking.len() as i64;
    score += (2 * blocking_count).min(5);

    score.clamp(0, 100) as u32
}

fn deadline_urgency_points(due_date: Option<NaiveDate>, today: NaiveDate) -> i64 {
    let Some(due) = due_date else {
        return 0;
    };
    let days = (due - today).num_days();
    if days < 0 {
        30
    } else if days == 0 {
        28
    } else if days <= 1 {
        25
    } else if days <= 3 {
        20
    } else if days <= 7 {
        15
    } else if days <= 14 {
        10
    } else if days <= 30 {
        5
    } else {
        0
    }
}

fn project_behind_schedule_points(project: Option<&Project>, today: NaiveDate) -> i64 {
    let Some(project) = project else {
        return 0;
    };
    let (Some(start), Some(deadline)) = (project.start_date, project.deadline) else {
        return 0;
    };
    if deadline <= start {
        return 0;
    }
    let total = (deadline - start).num_days().max(1) as f64;
    let elapsed = (today - start).num_days().max(0) as f64;
    let expected_progress = (elapsed / total * 100.0).clamp(0.0, 100.0);
    let behind_by = expected_progress - project.progress as f64;

    if behind_by > 20.0 {
        15
    } else if behind_by > 10.0 {
        10
    } else if behind_by > 0.0 {
        5
    } else {
        0
    }
}

fn milestone_order_points(milestone: Option<&Milestone>) -> i64 {
    match milestone.map(|m| m.order) {
        Some(1) => 10,
        Some(2) => 7,
        Some(3) | Some(4) => 4,
        _ => 0,
    }
}

fn has_any_tag(task: &Task, candidates: &[&str]) -> bool {
    candidates
        .iter()
        .any(|candidate| task.tags.contains(*candidate))
}

fn classify_flexibility(task: &Task, effective_estimate_minutes: i64) -> Flexibility {
    if has_any_tag(task, &FIXED_TAGS) {
        Flexibility::Fixed
    } else if has_any_tag(task, &DELEGATABLE_TAGS) {
        Flexibility::Delegatable
    } else if is_splittable(task, effective_estimate_minutes) {
        Flexibility::Splittable
    } else {
        Flexibility::Movable
    }
}

fn is_splittable(task: &Task, effective_estimate_minutes: i64) -> bool {
    effective_estimate_minutes >= 120 && !has_any_tag(task, &NO_SPLIT_TAGS)
}

fn compute_buffer_days(task: &Task, effective_estimate_minutes: i64) -> u32 {
    let mut days = 2u32;
    if task.priority == Priority::Urgent {
        days += 1;
    }
    if task.priority == Priority::High {
        days += 1;
    }
    if effective_estimate_minutes >= 240 {
        days += 1;
    }
    if effective_estimate_minutes >= 480 {
        days += 1;
    }
    if task.priority == Priority::Urgent {
        days += 1;
    }
    days.min(5)
}

fn requires_high_focus(task: &Task, effective_estimate_minutes: i64) -> bool {
    matches!(task.priority, Priority::Urgent | Priority::High)
        || effective_estimate_minutes >= 60
        || has_any_tag(task, &HIGH_FOCUS_TAGS)
}

fn preferred_time_of_day(energy_profile: &Option<EnergyProfile>) -> Option<TimeOfDay> {
    let profile = energy_profile.as_ref()?;
    let (first_peak_start, _) = *profile.peak_hours.first()?;
    Some(if first_peak_start < 12 * 60 {
        TimeOfDay::Morning
    } else if first_peak_start < 17 * 60 {
        TimeOfDay::Afternoon
    } else {
        TimeOfDay::Evening
    })
}

fn compute_earliest_start(
    task: &Task,
    ctx: &AnalysisContext,
    graph: &DependencyGraph,
) -> NaiveDateTime {
    let mut earliest = time::start_of_day(ctx.today);

    for predecessor_id in graph.direct_predecessors(&task.id) {
        if let Some(completion) = ctx.predecessor_completions.get(predecessor_id) {
            earliest = earliest.max(*completion);
        }
    }

    if let Some(scheduled_start) = task.scheduled_start {
        earliest = earliest.max(scheduled_start);
    }

    earliest
}

/// Ordering helper (§4.2): descending criticality, ascending dependency
/// depth, ascending due date (nulls last), ascending milestone order.
pub fn sort_smart_tasks(tasks: &mut [SmartTask]) {
    tasks.sort_by(compare_smart_tasks);
}

fn compare_smart_tasks(a: &SmartTask, b: &SmartTask) -> Ordering {
    b.criticality
        .cmp(&a.criticality)
        .then_with(|| a.dependency_depth.cmp(&b.dependency_depth))
        .then_with(|| compare_due_date_nulls_last(a.due_date(), b.due_date()))
        .then_with(|| a.task.id.cmp(&b.task.id))
}

fn compare_due_date_nulls_last(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Per-project dependency graph from explicit `blockedBy` edges plus an
/// implicit edge from the first task of milestone `k+1` to every task of
/// milestone `k`. Depth and transitive-dependent computation both use a
/// cycle-safe DFS with a `visited` guard (§4.2): a malformed `blockedBy`
/// cycle stops the walk instead of recursing forever.
struct DependencyGraph {
    /// task_id -> ids it directly depends on (must finish before it starts).
    predecessors: HashMap<String, Vec<String>>,
    /// task_id -> ids that directly depend on it.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    fn build(tasks: &[Task], milestones: &[Milestone]) -> Self {
        let mut predecessors: HashMap<String, Vec<String>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        for task in tasks {
            predecessors.entry(task.id.clone()).or_default();
            dependents.entry(task.id.clone()).or_default();
            for dep in &task.blocked_by {
                predecessors
                    .entry(task.id.clone())
                    .or_default()
                    .push(dep.clone());
                dependents.entry(dep.clone()).or_default().push(task.id.clone());
            }
        }

        let mut ordered_milestones: Vec<&Milestone> = milestones.iter().collect();
        ordered_milestones.sort_by_key(|m| m.order);

        for window in ordered_milestones.windows(2) {
            let (earlier, later) = (window[0], window[1]);
            let earlier_task_ids: Vec<&String> = tasks
                .iter()
                .filter(|t| t.milestone_id.as_deref() == Some(earlier.id.as_str()))
                .map(|t| &t.id)
                .collect();
            let Some(first_later_task) = tasks
                .iter()
                .find(|t| t.milestone_id.as_deref() == Some(later.id.as_str()))
            else {
                continue;
            };
            for earlier_id in earlier_task_ids {
                predecessors
                    .entry(first_later_task.id.clone())
                    .or_default()
                    .push(earlier_id.clone());
                dependents
                    .entry(earlier_id.clone())
                    .or_default()
                    .push(first_later_task.id.clone());
            }
        }

        DependencyGraph {
            predecessors,
            dependents,
        }
    }

    fn direct_predecessors(&self, task_id: &str) -> &[String] {
        self.predecessors
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Longest path length to a root (a node with no predecessors), cycle-safe.
    fn depth(&self, task_id: &str) -> u32 {
        let mut visiting = HashSet::new();
        self.depth_dfs(task_id, &mut visiting)
    }

    fn depth_dfs(&self, task_id: &str, visiting: &mut HashSet<String>) -> u32 {
        if !visiting.insert(task_id.to_string()) {
            return 0;
        }
        let preds = self.direct_predecessors(task_id);
        let result = if preds.is_empty() {
            0
        } else {
            1 + preds
                .iter()
                .map(|p| self.depth_dfs(p, visiting))
                .max()
                .unwrap_or(0)
        };
        visiting.remove(task_id);
        result
    }

    /// All transitive dependents, cycle-safe.
    fn transitive_dependents(&self, task_id: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<String> = self
            .dependents
            .get(task_id)
            .cloned()
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if !visited.insert(next.clone()) {
                continue;
            }
            out.push(next.clone());
            if let Some(further) = self.dependents.get(&next) {
                stack.extend(further.iter().cloned());
            }
        }
        out
    }
}
