//! Generic tasks shared by every NPC class, and their handlers.
//!
//! Handlers are plain functions bound through
//! [`TaskHandlerTable::insert_fn`]. A handler that finishes in `start` has a
//! no-op `run`; a handler that waits checks its exit condition in `run`.

use rand::Rng;
use schedz_core::engine::{TaskContext, TaskHandlerTable};
use schedz_core::task::{ParamKind, Task, TaskFailure, TaskParamCheck};
use schedz_core::types::Activity;
use tracing::{debug, error};

use crate::agent::NpcAgent;
use crate::vocabulary::{CitizenVocabulary, NpcVocabulary};

/// Tasks declared by the base NPC class, in local ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedTask {
    /// Wait a fixed number of seconds.
    Wait,
    /// Wait a random time up to the given number of seconds.
    WaitRandom,
    /// Never complete; only an interrupt ends it.
    WaitIndefinite,
    /// Replace the running schedule.
    SetSchedule,
    /// Schedule to run if this one fails.
    SetFailSchedule,
    /// Drop the fail-schedule override.
    ClearFailSchedule,
    /// Change the ideal activity.
    SetActivity,
    /// Force the activity to be re-chosen.
    ResetActivity,
    /// Set memory bits.
    Remember,
    /// Clear memory bits.
    Forget,
    /// Propose a new NPC state.
    SuggestState,
    /// Set the movement goal tolerance.
    SetToleranceDistance,
    /// Flag broken schedule data.
    DebugBreak,
}

impl SharedTask {
    /// Every shared task, in local ID order.
    pub const ALL: [Self; 13] = [
        Self::Wait,
        Self::WaitRandom,
        Self::WaitIndefinite,
        Self::SetSchedule,
        Self::SetFailSchedule,
        Self::ClearFailSchedule,
        Self::SetActivity,
        Self::ResetActivity,
        Self::Remember,
        Self::Forget,
        Self::SuggestState,
        Self::SetToleranceDistance,
        Self::DebugBreak,
    ];

    /// Symbol used in schedule text.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Wait => "TASK_WAIT",
            Self::WaitRandom => "TASK_WAIT_RANDOM",
            Self::WaitIndefinite => "TASK_WAIT_INDEFINITE",
            Self::SetSchedule => "TASK_SET_SCHEDULE",
            Self::SetFailSchedule => "TASK_SET_FAIL_SCHEDULE",
            Self::ClearFailSchedule => "TASK_CLEAR_FAIL_SCHEDULE",
            Self::SetActivity => "TASK_SET_ACTIVITY",
            Self::ResetActivity => "TASK_RESET_ACTIVITY",
            Self::Remember => "TASK_REMEMBER",
            Self::Forget => "TASK_FORGET",
            Self::SuggestState => "TASK_SUGGEST_STATE",
            Self::SetToleranceDistance => "TASK_SET_TOLERANCE_DISTANCE",
            Self::DebugBreak => "TASK_DEBUG_BREAK",
        }
    }

    /// Local ID in the base class.
    #[must_use]
    pub fn local(self) -> u32 {
        self as u32
    }

    /// Declared parameter shape.
    #[must_use]
    pub fn params(self) -> TaskParamCheck {
        match self {
            Self::Wait | Self::WaitRandom | Self::SetToleranceDistance => {
                TaskParamCheck::single(ParamKind::Float)
            }
            Self::SetSchedule | Self::SetFailSchedule => {
                TaskParamCheck::single(ParamKind::ScheduleId)
            }
            Self::SetActivity => TaskParamCheck::single(ParamKind::Activity),
            Self::Remember | Self::Forget => TaskParamCheck::single(ParamKind::Memory),
            Self::SuggestState => TaskParamCheck::single(ParamKind::NpcState),
            Self::WaitIndefinite
            | Self::ClearFailSchedule
            | Self::ResetActivity
            | Self::DebugBreak => TaskParamCheck::none(),
        }
    }
}

/// Handler table for the base NPC class.
#[must_use]
pub fn base_task_table(vocabulary: &NpcVocabulary) -> TaskHandlerTable<NpcAgent> {
    let mut table = TaskHandlerTable::new();
    for task in SharedTask::ALL {
        let (start, run) = entry_points(task);
        table.insert_fn(vocabulary.task(task), start, run);
    }
    table
}

/// Handler table for citizens: every base handler plus the greeting.
#[must_use]
pub fn citizen_task_table(
    base: &TaskHandlerTable<NpcAgent>,
    citizen: &CitizenVocabulary,
) -> TaskHandlerTable<NpcAgent> {
    let mut table = TaskHandlerTable::new();
    table.inherit(base);
    table.insert_fn(citizen.greet, start_citizen_greet, noop);
    table
}

type Entry = fn(&mut TaskContext<'_, NpcAgent>, &Task);

fn entry_points(task: SharedTask) -> (Entry, Entry) {
    match task {
        SharedTask::Wait => (start_wait, run_wait),
        SharedTask::WaitRandom => (start_wait_random, run_wait),
        SharedTask::WaitIndefinite => (noop, noop),
        SharedTask::SetSchedule => (start_set_schedule, noop),
        SharedTask::SetFailSchedule => (start_set_fail_schedule, noop),
        SharedTask::ClearFailSchedule => (start_clear_fail_schedule, noop),
        SharedTask::SetActivity => (start_set_activity, run_set_activity),
        SharedTask::ResetActivity => (start_reset_activity, noop),
        SharedTask::Remember => (start_remember, noop),
        SharedTask::Forget => (start_forget, noop),
        SharedTask::SuggestState => (start_suggest_state, noop),
        SharedTask::SetToleranceDistance => (start_set_tolerance_distance, noop),
        SharedTask::DebugBreak => (debug_break, noop),
    }
}

fn noop(_cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {}

// -- waiting ----------------------------------------------------------------

/// Wait length from the first argument, or `None` when it is not finite.
fn wait_seconds(task: &Task) -> Option<f64> {
    let secs = task.arg(0).as_float();
    secs.is_finite().then(|| f64::from(secs.max(0.0)))
}

fn start_wait(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    let Some(secs) = wait_seconds(task) else {
        cx.task_fail(TaskFailure::custom("wait time is not finite"));
        return;
    };
    let until = cx.now() + secs;
    let channel = cx.channel();
    cx.agent_mut().set_wait(channel, until);
    run_wait(cx, task);
}

fn start_wait_random(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    let Some(max) = wait_seconds(task) else {
        cx.task_fail(TaskFailure::custom("wait time is not finite"));
        return;
    };
    let secs = if max > 0.0 {
        rand::thread_rng().gen_range(0.0..=max)
    } else {
        0.0
    };
    let until = cx.now() + secs;
    let channel = cx.channel();
    cx.agent_mut().set_wait(channel, until);
    run_wait(cx, task);
}

fn run_wait(cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {
    if cx.agent().is_wait_finished(cx.channel(), cx.now()) {
        let channel = cx.channel();
        cx.agent_mut().clear_wait(channel);
        cx.task_complete();
    }
}

// -- schedule control -------------------------------------------------------

fn start_set_schedule(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    match task.arg(0).as_schedule_id() {
        Some(id) if cx.change_schedule(id) => cx.task_complete(),
        _ => cx.task_fail(TaskFailure::ScheduleNotFound),
    }
}

fn start_set_fail_schedule(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    cx.set_fail_schedule(task.arg(0).as_schedule_id());
    cx.task_complete();
}

fn start_clear_fail_schedule(cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {
    cx.set_fail_schedule(None);
    cx.task_complete();
}

// -- activity ---------------------------------------------------------------

fn start_set_activity(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    let goal = task.arg(0).as_activity();
    if !goal.is_valid() {
        cx.task_fail(TaskFailure::BadActivity);
        return;
    }
    if goal == Activity::RESET {
        cx.agent_mut().reset_activity();
        cx.task_complete();
        return;
    }
    cx.agent_mut().set_ideal_activity(goal);
    run_set_activity(cx, task);
}

fn run_set_activity(cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {
    if cx.agent().activity() == cx.agent().ideal_activity() {
        cx.task_complete();
    }
}

fn start_reset_activity(cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {
    cx.agent_mut().reset_activity();
    cx.task_complete();
}

// -- memory and state -------------------------------------------------------

fn start_remember(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    cx.agent_mut().remember(task.arg(0).as_memory());
    cx.task_complete();
}

fn start_forget(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    cx.agent_mut().forget(task.arg(0).as_memory());
    cx.task_complete();
}

fn start_suggest_state(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    match task.arg(0).as_npc_state() {
        Some(state) => {
            cx.agent_mut().set_ideal_state(state);
            cx.task_complete();
        }
        None => cx.task_fail(TaskFailure::custom("missing npc state")),
    }
}

fn start_set_tolerance_distance(cx: &mut TaskContext<'_, NpcAgent>, task: &Task) {
    let distance = task.arg(0).as_float();
    cx.agent_mut().set_tolerance_distance(distance);
    cx.task_complete();
}

// -- citizen ----------------------------------------------------------------

fn start_citizen_greet(cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {
    cx.agent_mut().note_greeting();
    debug!(agent = %cx.agent().id(), greetings = cx.agent().greetings(), "Citizen greets");
    cx.task_complete();
}

// -- diagnostics ------------------------------------------------------------

fn debug_break(cx: &mut TaskContext<'_, NpcAgent>, _task: &Task) {
    let schedule = cx
        .state()
        .schedule()
        .map_or("-", |s| s.name())
        .to_string();
    error!(agent = %cx.agent().id(), schedule, "TASK_DEBUG_BREAK reached");
    cx.agent_mut().note_debug_break();
    cx.task_fail(TaskFailure::custom("debug break"));
    debug!(agent = %cx.agent().id(), "Debug break turned into a task failure");
}
