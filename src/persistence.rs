//! The host-side collaborator boundary (§6). This crate never reads or
//! writes a database itself; a host implements `SchedulerDataSource` over
//! whatever store it already has and hands the loaded slices to
//! `services::packer::schedule_all`. No implementation ships here.

use chrono::NaiveDate;

use crate::error::SchedulerResult;
use crate::models::task::{Habit, Milestone, Project, Task};

/// Synchronous by design: the scheduling core itself does no I/O and never
/// awaits anything (§4.1, §9), so this trait does not require `async-trait`
/// or a `tokio` runtime. A host backed by an async store adapts at its own
/// boundary, not here.
pub trait SchedulerDataSource {
    fn list_tasks(&self, range_start: NaiveDate, range_end: NaiveDate) -> SchedulerResult<Vec<Task>>;
    fn list_milestones(&self, project_id: &str) -> SchedulerResult<Vec<Milestone>>;
    fn list_projects(&self) -> SchedulerResult<Vec<Project>>;
    fn list_active_habits(&self) -> SchedulerResult<Vec<Habit>>;
    fn update_task_schedule(
        &self,
        task_id: &str,
        scheduled_start: Option<chrono::NaiveDateTime>,
    ) -> SchedulerResult<()>;
}
