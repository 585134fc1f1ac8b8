//! Shared schedules every NPC class inherits, and their default text.

/// Schedules declared by the base NPC class, in local ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SharedSchedule {
    /// Placeholder for "no schedule"; trips a debug break if ever run.
    None,
    /// Stand still and wait for something to happen.
    IdleStand,
    /// Wander between short pauses.
    IdleWander,
    /// Stand alert, scanning.
    AlertStand,
    /// Generic response to a failed task.
    Fail,
    /// Hold until a script releases the NPC.
    WaitForScript,
    /// Installed when schedule data is broken.
    Error,
}

impl SharedSchedule {
    /// Every shared schedule, in local ID order.
    pub const ALL: [Self; 7] = [
        Self::None,
        Self::IdleStand,
        Self::IdleWander,
        Self::AlertStand,
        Self::Fail,
        Self::WaitForScript,
        Self::Error,
    ];

    /// Symbol used in schedule text.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "SCHED_NONE",
            Self::IdleStand => "SCHED_IDLE_STAND",
            Self::IdleWander => "SCHED_IDLE_WANDER",
            Self::AlertStand => "SCHED_ALERT_STAND",
            Self::Fail => "SCHED_FAIL",
            Self::WaitForScript => "SCHED_WAIT_FOR_SCRIPT",
            Self::Error => "SCHED_ERROR",
        }
    }

    /// Local ID in the base class.
    #[must_use]
    pub fn local(self) -> u32 {
        self as u32
    }
}

/// Default definitions of every [`SharedSchedule`].
pub const DEFAULT_SCHEDULES: &str = include_str!("../schedules/default.sched");

/// Schedules of the citizen class.
pub const CITIZEN_SCHEDULES: &str = include_str!("../schedules/citizen.sched");
