//! Symbol registration for the NPC classes.
//!
//! The base class owns every shared schedule, task and condition as local
//! IDs starting at zero. Derived classes number their own symbols from
//! [`DERIVED_LOCAL_BASE`] so they never collide with the base range.

use schedz_core::SchedulingContext;
use schedz_core::error::Result;
use schedz_core::id_space::{ClassId, Id};
use schedz_core::namespace::GlobalId;
use schedz_core::task::TaskParamCheck;
use tracing::info;

use crate::conditions::Condition;
use crate::schedules::SharedSchedule;
use crate::tasks::SharedTask;

/// Class every NPC derives from.
pub const BASE_CLASS: &str = "npc_base";

/// Citizen class.
pub const CITIZEN_CLASS: &str = "npc_citizen";

/// First local number available to a derived class.
pub const DERIVED_LOCAL_BASE: u32 = 100;

// ---------------------------------------------------------------------------
// Base vocabulary
// ---------------------------------------------------------------------------

/// Global IDs of the shared symbols, in local ID order.
#[derive(Debug, Clone)]
pub struct NpcVocabulary {
    class: ClassId,
    schedules: Vec<GlobalId>,
    tasks: Vec<GlobalId>,
    conditions: Vec<GlobalId>,
}

impl NpcVocabulary {
    /// Register the base class and all of its symbols.
    ///
    /// # Errors
    /// Registration errors from the context, e.g. a second call on the same
    /// context.
    pub fn register(ctx: &mut SchedulingContext) -> Result<Self> {
        let class = ctx.register_class(BASE_CLASS, None)?;
        let schedules = SharedSchedule::ALL
            .iter()
            .map(|s| ctx.add_class_schedule(class, s.name(), s.local()))
            .collect::<Result<Vec<_>>>()?;
        let tasks = SharedTask::ALL
            .iter()
            .map(|t| ctx.add_class_task(class, t.name(), t.local(), t.params()))
            .collect::<Result<Vec<_>>>()?;
        let conditions = Condition::ALL
            .iter()
            .map(|c| ctx.add_class_condition(class, c.name(), c.local()))
            .collect::<Result<Vec<_>>>()?;

        info!(
            class = BASE_CLASS,
            schedules = schedules.len(),
            tasks = tasks.len(),
            conditions = conditions.len(),
            "Registered NPC vocabulary"
        );
        Ok(Self {
            class,
            schedules,
            tasks,
            conditions,
        })
    }

    /// Base class handle.
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Local ID of a shared schedule, as authored in the base class.
    #[must_use]
    pub fn schedule(&self, schedule: SharedSchedule) -> Id {
        Id::local(self.class, schedule.local())
    }

    /// Global ID of a shared schedule.
    #[must_use]
    pub fn schedule_global(&self, schedule: SharedSchedule) -> GlobalId {
        self.schedules[schedule as usize]
    }

    /// Global ID of a shared task.
    #[must_use]
    pub fn task(&self, task: SharedTask) -> GlobalId {
        self.tasks[task as usize]
    }

    /// Global ID of a shared condition.
    #[must_use]
    pub fn condition(&self, condition: Condition) -> GlobalId {
        self.conditions[condition as usize]
    }
}

// ---------------------------------------------------------------------------
// Citizen vocabulary
// ---------------------------------------------------------------------------

/// Symbols the citizen class adds on top of the base.
#[derive(Debug, Clone)]
pub struct CitizenVocabulary {
    class: ClassId,
    /// `SCHED_CITIZEN_PATROL`.
    pub patrol: GlobalId,
    /// `SCHED_CITIZEN_ANSWER_CALL`.
    pub answer_call: GlobalId,
    /// `TASK_CITIZEN_GREET`.
    pub greet: GlobalId,
    /// `COND_CITIZEN_CALLED`.
    pub called: GlobalId,
}

impl CitizenVocabulary {
    /// Local ID of `SCHED_CITIZEN_PATROL`.
    pub const PATROL: u32 = DERIVED_LOCAL_BASE;
    /// Local ID of `SCHED_CITIZEN_ANSWER_CALL`.
    pub const ANSWER_CALL: u32 = DERIVED_LOCAL_BASE + 1;
    /// Local ID of `TASK_CITIZEN_GREET`.
    pub const GREET: u32 = DERIVED_LOCAL_BASE;
    /// Local ID of `COND_CITIZEN_CALLED`.
    pub const CALLED: u32 = DERIVED_LOCAL_BASE;

    /// Register the citizen class under [`BASE_CLASS`].
    ///
    /// # Errors
    /// `UnknownClass` if the base vocabulary was not registered first.
    pub fn register(ctx: &mut SchedulingContext) -> Result<Self> {
        let class = ctx.register_class(CITIZEN_CLASS, Some(BASE_CLASS))?;
        let patrol = ctx.add_class_schedule(class, "SCHED_CITIZEN_PATROL", Self::PATROL)?;
        let answer_call =
            ctx.add_class_schedule(class, "SCHED_CITIZEN_ANSWER_CALL", Self::ANSWER_CALL)?;
        let greet = ctx.add_class_task(
            class,
            "TASK_CITIZEN_GREET",
            Self::GREET,
            TaskParamCheck::none(),
        )?;
        let called = ctx.add_class_condition(class, "COND_CITIZEN_CALLED", Self::CALLED)?;
        info!(class = CITIZEN_CLASS, parent = BASE_CLASS, "Registered citizen vocabulary");
        Ok(Self {
            class,
            patrol,
            answer_call,
            greet,
            called,
        })
    }

    /// Citizen class handle.
    #[must_use]
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Local ID of the patrol schedule.
    #[must_use]
    pub fn patrol_id(&self) -> Id {
        Id::local(self.class, Self::PATROL)
    }

    /// Local ID of the answer-call schedule.
    #[must_use]
    pub fn answer_call_id(&self) -> Id {
        Id::local(self.class, Self::ANSWER_CALL)
    }
}
