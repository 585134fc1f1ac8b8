//! Per-agent, per-channel schedule execution.
//!
//! Each channel of an agent is an independent state machine:
//!
//! ```text
//! NO_SCHEDULE -> NEW_TASK -> RUNNING_TASK -> (COMPLETE | FAILED) -> NEW_TASK | NO_SCHEDULE
//! ```
//!
//! [`BehaviorEngine::maintain_schedule`] drives one channel for one tick. It
//! advances finished tasks, checks that the running schedule is still valid
//! (tasks left, no pending failure, no interrupt condition asserted), selects
//! a replacement when it is not, and starts or runs the current task. The
//! loop repeats so zero-duration tasks chain within a tick, bounded by
//! `engine.max_tasks_run`.
//!
//! A failed task is handled on the next validity check: the channel's
//! fail-schedule override wins, then the behavior module's
//! [`BehaviorModule::select_fail_schedule`], then one call to the generic
//! [`BehaviorModule::select_schedule`], then the configured idle schedule.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, trace_span, warn};

use crate::context::SchedulingContext;
use crate::error::{Result, SchedzError};
use crate::id_space::{ClassId, Id};
use crate::metrics::{spans, Counter};
use crate::namespace::{GlobalId, SymbolKind};
use crate::schedule::{ConditionBits, Schedule};
use crate::task::{Task, TaskFailure, TaskStatus};

// ---------------------------------------------------------------------------
// Channel State
// ---------------------------------------------------------------------------

/// Runtime state of one behavior channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelScheduleState {
    active: bool,
    schedule: Option<Arc<Schedule>>,
    schedule_signature: u64,
    task_index: usize,
    task_status: TaskStatus,
    failure: Option<TaskFailure>,
    ideal_schedule: Option<Id>,
    fail_schedule: Option<Id>,
    pending_schedule: Option<Id>,
    schedule_started_at: f64,
    task_started_at: f64,
    interrupted: bool,
    consecutive_failures: u32,
}

impl ChannelScheduleState {
    /// Whether the channel is ticked.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Schedule currently installed.
    #[must_use]
    pub fn schedule(&self) -> Option<&Arc<Schedule>> {
        self.schedule.as_ref()
    }

    /// Index of the current task.
    #[must_use]
    pub fn task_index(&self) -> usize {
        self.task_index
    }

    /// Current task, if the index is in range.
    #[must_use]
    pub fn current_task(&self) -> Option<&Task> {
        self.schedule.as_ref()?.task(self.task_index)
    }

    /// Progress of the current task.
    #[must_use]
    pub fn task_status(&self) -> TaskStatus {
        self.task_status
    }

    /// Pending failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    /// Most recently selected ideal schedule.
    #[must_use]
    pub fn ideal_schedule(&self) -> Option<Id> {
        self.ideal_schedule
    }

    /// Explicit fail-schedule override.
    #[must_use]
    pub fn fail_schedule(&self) -> Option<Id> {
        self.fail_schedule
    }

    /// When the current schedule was installed.
    #[must_use]
    pub fn schedule_started_at(&self) -> f64 {
        self.schedule_started_at
    }

    /// When the current task started.
    #[must_use]
    pub fn task_started_at(&self) -> f64 {
        self.task_started_at
    }

    /// Whether the last schedule was abandoned rather than installed fresh.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Failed schedules in a row.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the current task reported completion.
    #[must_use]
    pub fn is_task_complete(&self) -> bool {
        self.task_status == TaskStatus::Complete
    }

    /// Drop the running schedule and return to `NO_SCHEDULE`.
    pub fn clear_schedule(&mut self, reason: &str) {
        if let Some(s) = &self.schedule {
            debug!(schedule = s.name(), reason, "Schedule cleared");
        }
        self.schedule_started_at = 0.0;
        self.task_started_at = 0.0;
        self.interrupted = true;
        self.task_status = TaskStatus::New;
        self.ideal_schedule = None;
        self.schedule = None;
        self.task_index = 0;
        self.pending_schedule = None;
    }

    /// Serializable view for reports.
    #[must_use]
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            active: self.active,
            schedule: self.schedule.as_ref().map(|s| s.name().to_string()),
            task_index: self.task_index,
            task_status: self.task_status,
            failure: self.failure.as_ref().map(ToString::to_string),
            interrupted: self.interrupted,
            consecutive_failures: self.consecutive_failures,
        }
    }

    fn install(&mut self, schedule: Arc<Schedule>, signature: u64, now: f64) {
        self.schedule = Some(schedule);
        self.schedule_signature = signature;
        self.schedule_started_at = now;
        self.task_started_at = now;
        self.interrupted = false;
        self.task_index = 0;
        self.task_status = TaskStatus::New;
        self.fail_schedule = None;
        self.pending_schedule = None;
    }
}

/// Plain-data view of a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    /// Whether the channel is ticked.
    pub active: bool,
    /// Running schedule name.
    pub schedule: Option<String>,
    /// Current task index.
    pub task_index: usize,
    /// Current task status.
    pub task_status: TaskStatus,
    /// Pending failure text.
    pub failure: Option<String>,
    /// Interrupted flag.
    pub interrupted: bool,
    /// Failed schedules in a row.
    pub consecutive_failures: u32,
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// All behavior channels of one agent, ticked in index order.
#[derive(Debug, Clone, Default)]
pub struct BehaviorChannels {
    channels: Vec<ChannelScheduleState>,
}

impl BehaviorChannels {
    /// No channels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `channel`, growing the list as needed.
    pub fn start_channel(&mut self, channel: usize) {
        if channel >= self.channels.len() {
            self.channels
                .resize_with(channel + 1, ChannelScheduleState::default);
        }
        self.channels[channel].active = true;
    }

    /// Deactivate `channel` and reset it to `NO_SCHEDULE`.
    ///
    /// # Errors
    /// `InvalidChannel` for an index never started.
    pub fn stop_channel(&mut self, channel: usize) -> Result<()> {
        let state = self.channel_mut(channel)?;
        state.active = false;
        state.failure = None;
        state.clear_schedule("channel stopped");
        Ok(())
    }

    /// Borrow a channel.
    ///
    /// # Errors
    /// `InvalidChannel` for an index never started.
    pub fn channel(&self, channel: usize) -> Result<&ChannelScheduleState> {
        self.channels.get(channel).ok_or_else(|| {
            error!(channel, "Bad schedule channel");
            SchedzError::InvalidChannel(channel)
        })
    }

    /// Mutably borrow a channel.
    ///
    /// # Errors
    /// `InvalidChannel` for an index never started.
    pub fn channel_mut(&mut self, channel: usize) -> Result<&mut ChannelScheduleState> {
        self.channels.get_mut(channel).ok_or_else(|| {
            error!(channel, "Bad schedule channel");
            SchedzError::InvalidChannel(channel)
        })
    }

    /// Run `f` on a channel. An invalid index is a caller bug: it asserts in
    /// debug builds and is a logged no-op otherwise.
    pub fn with_channel<R>(
        &mut self,
        channel: usize,
        f: impl FnOnce(&mut ChannelScheduleState) -> R,
    ) -> Option<R> {
        debug_assert!(channel < self.channels.len(), "bad schedule channel {channel}");
        self.channel_mut(channel).ok().map(f)
    }

    /// Number of channels ever started.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel was ever started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of active channels.
    #[must_use]
    pub fn num_active(&self) -> usize {
        self.channels.iter().filter(|c| c.active).count()
    }

    /// Channels in tick order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelScheduleState> {
        self.channels.iter()
    }
}

// ---------------------------------------------------------------------------
// Behavior Modules
// ---------------------------------------------------------------------------

/// Schedule selection policy for one agent class.
///
/// Returning `None` from a selector means "no opinion"; the engine then moves
/// on to the next fallback.
pub trait BehaviorModule<A> {
    /// Class ID space this module's schedules are authored in.
    fn class(&self) -> Option<ClassId>;

    /// Pick the ideal schedule for `channel`.
    fn select_schedule(&self, channel: usize, agent: &A) -> Option<Id>;

    /// Pick a schedule in response to a failure.
    ///
    /// The engine asks once per failure. A derived module that wants its
    /// parent's answer should call the parent explicitly.
    fn select_fail_schedule(
        &self,
        channel: usize,
        agent: &A,
        failed_schedule: Option<Id>,
        failed_task: Option<Id>,
        failure: &TaskFailure,
    ) -> Option<Id> {
        let _ = (channel, agent, failed_schedule, failed_task, failure);
        None
    }

    /// Map a requested schedule to the one this class actually runs.
    fn translate_schedule(&self, channel: usize, schedule: Id) -> Id {
        let _ = channel;
        schedule
    }

    /// Called when the running schedule is abandoned.
    fn on_schedule_change(&self, channel: usize, agent: &mut A) {
        let _ = (channel, agent);
    }

    /// Called before the first task of a schedule starts.
    fn on_start_schedule(&self, channel: usize, agent: &mut A, schedule: &Schedule) {
        let _ = (channel, agent, schedule);
    }
}

// ---------------------------------------------------------------------------
// Task Handlers
// ---------------------------------------------------------------------------

/// What a task handler sees while it runs.
pub struct TaskContext<'c, A> {
    agent: &'c mut A,
    state: &'c mut ChannelScheduleState,
    ctx: &'c SchedulingContext,
    channel: usize,
    now: f64,
}

impl<'c, A> TaskContext<'c, A> {
    /// The agent.
    pub fn agent(&self) -> &A {
        &*self.agent
    }

    /// The agent, mutably.
    pub fn agent_mut(&mut self) -> &mut A {
        &mut *self.agent
    }

    /// Channel being ticked.
    #[must_use]
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Current simulation time (seconds).
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Seconds since the current task started.
    #[must_use]
    pub fn task_elapsed(&self) -> f64 {
        self.now - self.state.task_started_at
    }

    /// Seconds since the current schedule was installed.
    #[must_use]
    pub fn schedule_elapsed(&self) -> f64 {
        self.now - self.state.schedule_started_at
    }

    /// Channel state (read-only).
    #[must_use]
    pub fn state(&self) -> &ChannelScheduleState {
        &*self.state
    }

    /// Shared scheduling context.
    #[must_use]
    pub fn scheduling(&self) -> &SchedulingContext {
        self.ctx
    }

    /// Mark the task complete unless a failure is pending.
    pub fn task_complete(&mut self) {
        if self.state.failure.is_none() {
            self.finish();
        }
    }

    /// Mark the task complete and drop any pending failure.
    pub fn task_complete_ignoring_failure(&mut self) {
        self.state.failure = None;
        self.finish();
    }

    fn finish(&mut self) {
        if self.state.task_status != TaskStatus::Complete {
            self.ctx.record(Counter::TasksCompleted);
        }
        self.state.task_status = TaskStatus::Complete;
    }

    /// Record a failure; the schedule is replaced on the next validity check.
    pub fn task_fail(&mut self, failure: TaskFailure) {
        debug!(
            channel = self.channel,
            code = failure.code().unwrap_or(-1),
            "TaskFail -> {failure}"
        );
        self.ctx.record(Counter::TasksFailed);
        self.state.failure = Some(failure);
    }

    /// Switch between the running sub-states.
    pub fn set_task_status(&mut self, status: TaskStatus) {
        self.state.task_status = status;
    }

    /// Schedule to use if this schedule fails; cleared when a new one is installed.
    pub fn set_fail_schedule(&mut self, schedule: Option<Id>) {
        self.state.fail_schedule = schedule;
    }

    /// Ask the engine to switch to `schedule` once the handler returns.
    ///
    /// Returns `false` (and changes nothing) if the schedule is not loaded.
    pub fn change_schedule(&mut self, schedule: Id) -> bool {
        let loaded = self
            .ctx
            .resolve_schedule(schedule)
            .is_some_and(|g| self.ctx.repository().contains(g));
        if loaded {
            self.state.pending_schedule = Some(schedule);
        }
        loaded
    }
}

/// Start/run entry points for one task kind.
pub trait TaskHandler<A> {
    /// Called once when the task becomes current.
    fn start(&self, cx: &mut TaskContext<'_, A>, task: &Task);

    /// Called every tick while the task is running. Does nothing unless
    /// overridden, so tasks that finish in `start` need not implement it.
    fn run(&self, cx: &mut TaskContext<'_, A>, task: &Task) {
        let _ = (cx, task);
    }
}

/// Signature of a plain-function task entry point.
pub type TaskFn<A> = fn(&mut TaskContext<'_, A>, &Task);

struct FnHandler<A> {
    start: TaskFn<A>,
    run: TaskFn<A>,
}

impl<A> TaskHandler<A> for FnHandler<A> {
    fn start(&self, cx: &mut TaskContext<'_, A>, task: &Task) {
        (self.start)(cx, task);
    }

    fn run(&self, cx: &mut TaskContext<'_, A>, task: &Task) {
        (self.run)(cx, task);
    }
}

struct Unimplemented;

impl<A> TaskHandler<A> for Unimplemented {
    fn start(&self, cx: &mut TaskContext<'_, A>, task: &Task) {
        let name = task
            .global_id()
            .map_or("<placeholder>", |g| cx.scheduling().task_name(g));
        error!(task = name, channel = cx.channel(), "No handler for task");
        cx.task_fail(TaskFailure::Unimplemented);
    }

    fn run(&self, cx: &mut TaskContext<'_, A>, task: &Task) {
        self.start(cx, task);
    }
}

/// Task ID -> handler dispatch table for one agent class.
pub struct TaskHandlerTable<A> {
    handlers: HashMap<GlobalId, Arc<dyn TaskHandler<A>>>,
    unimplemented: Arc<dyn TaskHandler<A>>,
}

impl<A: 'static> TaskHandlerTable<A> {
    /// Empty table; every task fails as unimplemented.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            unimplemented: Arc::new(Unimplemented),
        }
    }

    /// Copy in every handler of `parent` this table does not override.
    pub fn inherit(&mut self, parent: &Self) {
        for (id, handler) in &parent.handlers {
            self.handlers
                .entry(*id)
                .or_insert_with(|| Arc::clone(handler));
        }
    }

    /// Bind a handler.
    pub fn insert(&mut self, task: GlobalId, handler: impl TaskHandler<A> + 'static) {
        self.handlers.insert(task, Arc::new(handler));
    }

    /// Bind a pair of plain functions.
    pub fn insert_fn(&mut self, task: GlobalId, start: TaskFn<A>, run: TaskFn<A>) {
        self.insert(task, FnHandler { start, run });
    }

    /// Handler for a task; unknown IDs get the unimplemented handler.
    #[must_use]
    pub fn get(&self, task: GlobalId) -> &dyn TaskHandler<A> {
        self.handlers
            .get(&task)
            .unwrap_or(&self.unimplemented)
            .as_ref()
    }

    /// Whether a handler is bound.
    #[must_use]
    pub fn contains(&self, task: GlobalId) -> bool {
        self.handlers.contains_key(&task)
    }

    /// Number of bound handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<A: 'static> Default for TaskHandlerTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for TaskHandlerTable<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandlerTable")
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Why a schedule stopped being runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleBreak {
    /// No schedule installed.
    NoSchedule,
    /// Installed schedule has no tasks.
    NoTasks,
    /// Every task ran.
    Exhausted,
    /// A task failed.
    Failed,
    /// An interrupt condition is asserted.
    Interrupted(GlobalId),
}

/// Drives channels of agents of one behavior class.
pub struct BehaviorEngine<'a, A> {
    ctx: &'a SchedulingContext,
    module: &'a dyn BehaviorModule<A>,
    handlers: &'a TaskHandlerTable<A>,
}

impl<'a, A: 'static> BehaviorEngine<'a, A> {
    /// Bind a context, a selection policy and a handler table.
    #[must_use]
    pub fn new(
        ctx: &'a SchedulingContext,
        module: &'a dyn BehaviorModule<A>,
        handlers: &'a TaskHandlerTable<A>,
    ) -> Self {
        Self {
            ctx,
            module,
            handlers,
        }
    }

    /// Tick every active channel of one agent, in index order.
    pub fn maintain_channel_schedules(
        &self,
        channels: &mut BehaviorChannels,
        agent: &mut A,
        conditions: &ConditionBits,
        now: f64,
    ) {
        for (channel, state) in channels.channels.iter_mut().enumerate() {
            if state.active {
                self.maintain_schedule(channel, state, agent, conditions, now);
            }
        }
    }

    /// Tick one channel.
    pub fn maintain_schedule(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        agent: &mut A,
        conditions: &ConditionBits,
        now: f64,
    ) {
        if !state.active {
            return;
        }
        let _span = trace_span!(spans::MAINTAIN_SCHEDULE, channel).entered();
        self.refresh_after_reload(state);

        let budget = self.ctx.config().engine.max_tasks_run;
        let mut steps = 0;
        let mut stop = false;

        while steps < budget && !stop {
            steps += 1;

            if state.task_status == TaskStatus::Complete {
                state.task_index += 1;
                state.task_status = TaskStatus::New;
            }

            if let Some(reason) = self.schedule_break(state, conditions) {
                self.reselect(channel, state, agent, reason, now);
            }

            let Some(schedule) = state.schedule.clone() else {
                return;
            };
            if schedule.num_tasks() == 0 {
                return;
            }
            let Some(task) = schedule.task(state.task_index) else {
                return;
            };

            if state.task_status == TaskStatus::New {
                if state.task_index == 0 {
                    self.module.on_start_schedule(channel, agent, &schedule);
                }
                state.task_status = TaskStatus::RunMoveAndTask;
                state.failure = None;
                state.task_started_at = now;
                self.start_task(channel, state, agent, task, now);
                self.apply_pending_schedule(channel, state, now);
            }

            if state.task_status != TaskStatus::Complete && state.task_status != TaskStatus::New {
                if state.task_status != TaskStatus::RunMove && state.failure.is_none() {
                    self.run_task(channel, state, agent, task, now);
                    self.apply_pending_schedule(channel, state, now);
                    if state.task_status != TaskStatus::Complete
                        && state.task_status != TaskStatus::New
                    {
                        stop = true;
                    }
                } else {
                    stop = true;
                }
            }
        }

        if !stop {
            self.ctx.record(Counter::BudgetExhausted);
            debug!(channel, budget, "Task budget used up, deferring to next tick");
        }
    }

    /// Whether the installed schedule may keep running under `conditions`.
    #[must_use]
    pub fn is_schedule_valid(
        &self,
        state: &ChannelScheduleState,
        conditions: &ConditionBits,
    ) -> bool {
        self.schedule_break(state, conditions).is_none()
    }

    /// Why the installed schedule may not keep running, if it may not.
    #[must_use]
    pub fn schedule_break(
        &self,
        state: &ChannelScheduleState,
        conditions: &ConditionBits,
    ) -> Option<ScheduleBreak> {
        let Some(schedule) = &state.schedule else {
            return Some(ScheduleBreak::NoSchedule);
        };
        if schedule.num_tasks() == 0 {
            return Some(ScheduleBreak::NoTasks);
        }
        if state.task_index >= schedule.num_tasks() {
            return Some(ScheduleBreak::Exhausted);
        }
        if state.failure.is_some() {
            return Some(ScheduleBreak::Failed);
        }
        let hit = schedule.interrupt_mask().and(conditions);
        let first = hit.iter().next();
        first
            .and_then(|bit| u32::try_from(bit).ok())
            .map(|bit| ScheduleBreak::Interrupted(GlobalId::new(bit)))
    }

    /// Install a schedule by ID, through the module's translation.
    ///
    /// Returns `false` and clears the channel when the schedule cannot be
    /// found.
    pub fn set_schedule_by_id(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        schedule: Id,
        now: f64,
    ) -> bool {
        match self.resolve(channel, schedule) {
            Some(global) => self.set_schedule(state, global, now),
            None => {
                state.clear_schedule("schedule not found");
                false
            }
        }
    }

    /// Whether `schedule` is running on the channel, or (with `ideal`) is
    /// the channel's ideal schedule.
    #[must_use]
    pub fn is_cur_schedule(
        &self,
        channel: usize,
        state: &ChannelScheduleState,
        schedule: Id,
        ideal: bool,
    ) -> bool {
        let Some(wanted) = self.resolve(channel, schedule) else {
            return false;
        };
        let running = state.schedule.as_ref().is_some_and(|s| s.id() == wanted);
        let is_ideal = ideal
            && state
                .ideal_schedule
                .and_then(|id| self.resolve(channel, id))
                .is_some_and(|g| g == wanted);
        running || is_ideal
    }

    // -- internals ----------------------------------------------------------

    fn resolve(&self, channel: usize, schedule: Id) -> Option<GlobalId> {
        let translated = self.module.translate_schedule(channel, schedule);
        let global = self.ctx.resolve_schedule(translated);
        if global.is_none() {
            warn!(channel, schedule = %translated, "Couldn't resolve schedule");
        }
        global
    }

    fn set_schedule(&self, state: &mut ChannelScheduleState, global: GlobalId, now: f64) -> bool {
        let repo = self.ctx.repository();
        let Some(schedule) = repo.get_schedule_from_id(global) else {
            state.clear_schedule("schedule not found");
            return false;
        };
        debug!(schedule = schedule.name(), "Schedule installed");
        state.install(schedule, repo.load_signature(), now);
        true
    }

    fn refresh_after_reload(&self, state: &mut ChannelScheduleState) {
        let repo = self.ctx.repository();
        if state.schedule_signature == repo.load_signature() {
            return;
        }
        let Some(id) = state.schedule.as_ref().map(|s| s.id()) else {
            state.schedule_signature = repo.load_signature();
            return;
        };
        match repo.get(id) {
            Some(fresh) => {
                state.schedule = Some(Arc::clone(fresh));
                state.schedule_signature = repo.load_signature();
            }
            None => state.clear_schedule("schedule unloaded"),
        }
    }

    fn reselect(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        agent: &mut A,
        reason: ScheduleBreak,
        now: f64,
    ) {
        match reason {
            ScheduleBreak::Interrupted(cond) => {
                self.ctx.record(Counter::Interrupts);
                debug!(
                    channel,
                    schedule = state.schedule.as_ref().map_or("-", |s| s.name()),
                    condition = self.ctx.condition_name(cond),
                    "Schedule interrupted"
                );
            }
            ScheduleBreak::Exhausted => state.consecutive_failures = 0,
            _ => {}
        }

        state.interrupted = true;
        self.module.on_schedule_change(channel, agent);

        let next = match state.failure.clone() {
            Some(failure) => self.select_after_failure(channel, state, agent, &failure),
            None => self.select_ideal(channel, state, agent),
        };

        match next {
            Some(global) => {
                self.set_schedule(state, global, now);
            }
            None => state.clear_schedule("no schedule available"),
        }
    }

    fn select_ideal(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        agent: &A,
    ) -> Option<GlobalId> {
        if let Some(id) = self.module.select_schedule(channel, agent) {
            if let Some(global) = self.resolve(channel, id) {
                state.ideal_schedule = Some(id);
                self.ctx.record(Counter::SchedulesSelected);
                return Some(global);
            }
        }
        self.idle(channel, "no schedule selected")
    }

    fn select_after_failure(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        agent: &A,
        failure: &TaskFailure,
    ) -> Option<GlobalId> {
        let class = self.module.class();
        let failed_schedule = state
            .schedule
            .as_ref()
            .and_then(|s| self.ctx.classes().localize(class, SymbolKind::Schedule, s.id()));
        let failed_task = state.current_task().and_then(Task::id);

        if state.consecutive_failures >= self.ctx.config().engine.max_consecutive_failures {
            state.consecutive_failures = 0;
            return self.idle(channel, "too many consecutive failures");
        }
        state.consecutive_failures += 1;

        if let Some(global) = state.fail_schedule.and_then(|id| self.resolve(channel, id)) {
            self.ctx.record(Counter::FailSchedulesSelected);
            return Some(global);
        }
        let chosen = self
            .module
            .select_fail_schedule(channel, agent, failed_schedule, failed_task, failure);
        if let Some(global) = chosen.and_then(|id| self.resolve(channel, id)) {
            self.ctx.record(Counter::FailSchedulesSelected);
            return Some(global);
        }
        self.select_ideal(channel, state, agent)
    }

    fn idle(&self, channel: usize, why: &str) -> Option<GlobalId> {
        let idle = self.ctx.idle_schedule_id();
        warn!(channel, reason = why, "Falling back to idle schedule");
        self.ctx.record(Counter::FallbackToIdle);
        idle
    }

    fn start_task(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        agent: &mut A,
        task: &Task,
        now: f64,
    ) {
        self.ctx.record(Counter::TasksStarted);
        let Some(global) = task.global_id() else {
            debug!(channel, index = state.task_index, "Skipping placeholder task");
            state.task_status = TaskStatus::Complete;
            return;
        };
        debug!(channel, task = self.ctx.task_name(global), "Task started");
        let mut cx = TaskContext {
            agent,
            state,
            ctx: self.ctx,
            channel,
            now,
        };
        self.handlers.get(global).start(&mut cx, task);
    }

    fn run_task(
        &self,
        channel: usize,
        state: &mut ChannelScheduleState,
        agent: &mut A,
        task: &Task,
        now: f64,
    ) {
        let Some(global) = task.global_id() else {
            state.task_status = TaskStatus::Complete;
            return;
        };
        let mut cx = TaskContext {
            agent,
            state,
            ctx: self.ctx,
            channel,
            now,
        };
        self.handlers.get(global).run(&mut cx, task);
    }

    fn apply_pending_schedule(&self, channel: usize, state: &mut ChannelScheduleState, now: f64) {
        if let Some(next) = state.pending_schedule.take() {
            self.set_schedule_by_id(channel, state, next, now);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::config::SchedzConfig;
    use crate::task::{ParamKind, TaskParamCheck};

    #[derive(Default)]
    struct Probe {
        log: Vec<String>,
    }

    struct Policy {
        ideal: Option<Id>,
        fail: Option<Id>,
        calls: RefCell<Vec<String>>,
    }

    impl BehaviorModule<Probe> for Policy {
        fn class(&self) -> Option<ClassId> {
            None
        }

        fn select_schedule(&self, _channel: usize, _agent: &Probe) -> Option<Id> {
            self.calls.borrow_mut().push("select".into());
            self.ideal
        }

        fn select_fail_schedule(
            &self,
            _channel: usize,
            _agent: &Probe,
            _failed_schedule: Option<Id>,
            _failed_task: Option<Id>,
            failure: &TaskFailure,
        ) -> Option<Id> {
            self.calls.borrow_mut().push(format!("fail:{failure}"));
            self.fail
        }
    }

    struct World {
        ctx: SchedulingContext,
        table: TaskHandlerTable<Probe>,
    }

    fn world(src: &str) -> World {
        let mut ctx = SchedulingContext::new(SchedzConfig::default());
        ctx.init();
        for s in ["SCHED_IDLE_STAND", "SCHED_A", "SCHED_B"] {
            ctx.add_schedule(s).expect("schedule");
        }
        let instant = ctx.add_task("TASK_INSTANT", TaskParamCheck::none()).expect("task");
        let hold = ctx.add_task("TASK_HOLD", TaskParamCheck::none()).expect("task");
        let fail = ctx.add_task("TASK_FAIL", TaskParamCheck::none()).expect("task");
        ctx.add_task("TASK_GOTO", TaskParamCheck::single(ParamKind::ScheduleId))
            .expect("task");
        ctx.add_task("TASK_MISSING", TaskParamCheck::none()).expect("task");
        ctx.add_condition("COND_K").expect("cond");
        ctx.load_schedules_with("test", src, true).expect("load");

        let mut table = TaskHandlerTable::<Probe>::new();
        table.insert_fn(
            instant,
            |cx, _| {
                cx.agent_mut().log.push("instant".into());
                cx.task_complete();
            },
            |_, _| {},
        );
        table.insert_fn(hold, |cx, _| cx.agent_mut().log.push("hold".into()), |_, _| {});
        table.insert_fn(fail, |cx, _| cx.task_fail(TaskFailure::NoTarget), |_, _| {});
        let goto = ctx.namespaces().task_symbol_to_id("TASK_GOTO").expect("goto");
        table.insert_fn(
            goto,
            |cx, task| {
                let target = task.arg(0).as_schedule_id();
                if target.is_some_and(|id| cx.change_schedule(id)) {
                    cx.task_complete();
                } else {
                    cx.task_fail(TaskFailure::ScheduleNotFound);
                }
            },
            |_, _| {},
        );
        World { ctx, table }
    }

    fn sched(w: &World, name: &str) -> Option<Id> {
        w.ctx.schedule_id(None, name)
    }

    #[test]
    fn instant_tasks_chain_within_budget() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_INSTANT TASK_INSTANT TASK_INSTANT TASK_HOLD } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &ConditionBits::new(), 0.0);
        assert_eq!(agent.log, ["instant", "instant", "instant", "hold"]);
        let state = channels.channel(0).expect("channel");
        assert_eq!(state.task_index(), 3);
        assert!(state.task_status().is_running());
    }

    #[test]
    fn budget_bounds_instant_loops() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_INSTANT } }
             SCHED_A { Tasks { TASK_INSTANT } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &ConditionBits::new(), 0.0);
        assert!(agent.log.len() <= 10);
        assert_eq!(w.ctx.counters().snapshot().budget_exhausted, 1);
    }

    #[test]
    fn failure_consults_fail_selector_then_generic_once() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_INSTANT TASK_FAIL } }
             SCHED_B { Tasks { TASK_HOLD } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();
        let none = ConditionBits::new();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &none, 0.0);
        assert_eq!(policy.calls.borrow().as_slice(), ["select"]);
        assert!(channels.channel(0).expect("channel").failure().is_some());

        engine.maintain_channel_schedules(&mut channels, &mut agent, &none, 0.1);
        let calls = policy.calls.borrow();
        assert_eq!(calls[1], "fail:No Target");
        assert_eq!(calls[2], "select");
    }

    #[test]
    fn fail_override_wins() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_FAIL } }
             SCHED_B { Tasks { TASK_HOLD } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();
        let none = ConditionBits::new();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &none, 0.0);
        let b = sched(&w, "SCHED_B").expect("b");
        channels.with_channel(0, |s| s.fail_schedule = Some(b));
        engine.maintain_channel_schedules(&mut channels, &mut agent, &none, 0.1);

        let state = channels.channel(0).expect("channel");
        assert_eq!(state.schedule().map(|s| s.name()), Some("SCHED_B"));
        assert!(state.fail_schedule().is_none());
        assert!(!policy.calls.borrow().iter().any(|c| c.starts_with("fail:")));
    }

    #[test]
    fn interrupt_forces_reselection() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_HOLD } Interrupts { COND_K } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &ConditionBits::new(), 0.0);
        engine.maintain_channel_schedules(&mut channels, &mut agent, &ConditionBits::new(), 0.1);
        assert_eq!(policy.calls.borrow().len(), 1);

        let k = w.ctx.namespaces().condition_symbol_to_id("COND_K").expect("k");
        let mut asserted = ConditionBits::new();
        asserted.set_condition(k);
        engine.maintain_channel_schedules(&mut channels, &mut agent, &asserted, 0.2);
        assert_eq!(policy.calls.borrow().len(), 2);
        assert_eq!(w.ctx.counters().snapshot().interrupts, 1);
    }

    #[test]
    fn unimplemented_task_fails() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_MISSING } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &ConditionBits::new(), 0.0);
        assert_eq!(
            channels.channel(0).expect("channel").failure(),
            Some(&TaskFailure::Unimplemented)
        );
    }

    #[test]
    fn task_can_switch_schedule() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_GOTO SCHED_B TASK_HOLD } }
             SCHED_B { Tasks { TASK_INSTANT TASK_HOLD } }",
        );
        let policy = Policy { ideal: sched(&w, "SCHED_A"), fail: None, calls: RefCell::default() };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();

        engine.maintain_channel_schedules(&mut channels, &mut agent, &ConditionBits::new(), 0.0);
        let state = channels.channel(0).expect("channel");
        assert_eq!(state.schedule().map(|s| s.name()), Some("SCHED_B"));
        assert_eq!(agent.log, ["instant", "hold"]);
        let b = sched(&w, "SCHED_B").expect("b");
        assert!(engine.is_cur_schedule(0, state, b, false));
        let a = sched(&w, "SCHED_A").expect("a");
        assert!(engine.is_cur_schedule(0, state, a, true));
        assert!(!engine.is_cur_schedule(0, state, a, false));
    }

    #[test]
    fn repeated_failures_degrade_to_idle() {
        let w = world(
            "SCHED_IDLE_STAND { Tasks { TASK_HOLD } }
             SCHED_A { Tasks { TASK_FAIL } }",
        );
        let policy = Policy {
            ideal: sched(&w, "SCHED_A"),
            fail: sched(&w, "SCHED_A"),
            calls: RefCell::default(),
        };
        let engine = BehaviorEngine::new(&w.ctx, &policy, &w.table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut agent = Probe::default();

        for tick in 0..10u32 {
            engine.maintain_channel_schedules(
                &mut channels,
                &mut agent,
                &ConditionBits::new(),
                f64::from(tick),
            );
            if channels.channel(0).expect("channel").schedule().map(|s| s.name())
                == Some("SCHED_IDLE_STAND")
            {
                break;
            }
        }
        assert_eq!(
            channels.channel(0).expect("channel").schedule().map(|s| s.name()),
            Some("SCHED_IDLE_STAND")
        );
        assert!(w.ctx.counters().snapshot().fallback_to_idle >= 1);
    }

    #[test]
    fn stop_channel_resets_and_invalid_channel_errors() {
        let mut channels = BehaviorChannels::new();
        channels.start_channel(2);
        assert_eq!(channels.len(), 3);
        assert_eq!(channels.num_active(), 1);
        channels.stop_channel(2).expect("stop");
        assert_eq!(channels.num_active(), 0);
        assert!(matches!(channels.stop_channel(7), Err(SchedzError::InvalidChannel(7))));
    }
}
