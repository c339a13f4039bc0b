//! Personal-productivity scheduling engine: task analysis, capacity
//! modeling, multi-pass packing, conflict detection, emergency insertion
//! and ripple planning, and estimate calibration from completion history.
//!
//! This crate does no I/O. A host loads tasks/projects/milestones/habits
//! through its own store, builds a [`SchedulerConfig`](models::config::SchedulerConfig),
//! calls [`Scheduler::schedule`], and inspects the returned
//! [`SchedulingResult`](models::result::SchedulingResult) to decide what (if
//! anything) to write back via [`persistence::SchedulerDataSource`].

pub mod error;
pub mod models;
pub mod persistence;
pub mod services;

pub use error::{SchedulerError, SchedulerResult};

use models::config::SchedulerConfig;
use models::insertion::{EmergencyInsertResult, InsertionPreview, InsertionRequest, RescheduleOutcome, RescheduleRequest};
use models::learning::{CompletionRecord, EstimateAdjustment, LearningData};
use models::result::SchedulingResult;
use models::state::SchedulerState;
use models::task::Task;
use services::packer::SchedulingInput;

/// A completed scheduling run, kept alive so emergency insertions and
/// manual reschedules can continue to operate against the same capacity
/// map and conflict state without re-running the packer from scratch.
pub struct Scheduler {
    state: SchedulerState,
}

impl Scheduler {
    /// Runs the four-pass packer (C5) over `input` under `config` and
    /// returns both the live scheduler and the result the host should
    /// inspect.
    pub fn schedule(input: SchedulingInput<'_>, config: SchedulerConfig) -> (Scheduler, SchedulingResult) {
        let (state, result) = services::packer::run(input, config);
        (Scheduler { state }, result)
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Computes what inserting `request` right now would do, without
    /// mutating anything (C6).
    pub fn preview_emergency_insertion(&self, request: &InsertionRequest) -> InsertionPreview {
        services::emergency::preview_emergency_insertion(&self.state, request)
    }

    /// Applies `request`, shifting any displaced blocks and re-running
    /// conflict detection (C6).
    pub fn execute_emergency_insertion(
        &mut self,
        request: &InsertionRequest,
    ) -> SchedulerResult<EmergencyInsertResult> {
        services::emergency::execute_emergency_insertion(&mut self.state, request)
    }

    /// Inserts `task` as early as possible today, forcing `mustComplete` so
    /// it lands even if it has to ripple other blocks out of the way (C6).
    pub fn quick_insert_today(&mut self, task: Task) -> SchedulerResult<EmergencyInsertResult> {
        let request = InsertionRequest {
            task,
            target_date: self.state.config.start_date,
            target_start_minute: self.state.config.working_hours_start_minute,
            must_complete: true,
        };
        services::emergency::quick_insert_today(&mut self.state, request)
    }

    /// Inserts `task` into the first day with any free capacity (C6).
    pub fn insert_next_available(&mut self, task: Task) -> SchedulerResult<EmergencyInsertResult> {
        let request = InsertionRequest {
            task,
            target_date: self.state.config.start_date,
            target_start_minute: self.state.config.working_hours_start_minute,
            must_complete: false,
        };
        services::emergency::insert_next_available(&mut self.state, request)
    }

    /// Computes what moving a block to `request`'s target would do, without
    /// mutating anything (C7).
    pub fn preview_reschedule(&self, request: &RescheduleRequest) -> RescheduleOutcome {
        services::rescheduler::preview_reschedule(&self.state, request)
    }

    /// Moves a single non-locked block (C7).
    pub fn reschedule_block(&mut self, request: &RescheduleRequest) -> SchedulerResult<RescheduleOutcome> {
        services::rescheduler::reschedule_block(&mut self.state, request)
    }
}

/// Records one completed task against `learning` and recalibrates every
/// derived multiplier and productivity curve in place (C8).
pub fn record_completion(learning: &mut LearningData, record: CompletionRecord) {
    services::learning::record_completion(learning, record);
}

/// Blends global/tag/project multipliers into a learning-adjusted estimate
/// for `task` (C8). Call this before `Scheduler::schedule` to size tasks
/// with calibrated durations rather than raw `estimated_minutes`.
pub fn adjust_estimate(task: &Task, learning: &LearningData) -> EstimateAdjustment {
    services::learning::adjust_estimate(task, learning)
}
