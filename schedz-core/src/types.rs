//! Small value vocabularies shared by task arguments and agents.
//!
//! Activities, agent states, memory flags, path kinds and goal kinds are
//! closed sets the schedule text refers to by name (`ACT_IDLE`,
//! `NPC_STATE_ALERT`, `MEMORY_PROVOKED`, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// Animation/posture activity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Activity(pub i32);

/// Built-in activity names, indexed by activity number.
const ACTIVITY_NAMES: &[&str] = &[
    "ACT_RESET",
    "ACT_IDLE",
    "ACT_TRANSITION",
    "ACT_COVER",
    "ACT_COVER_MED",
    "ACT_COVER_LOW",
    "ACT_WALK",
    "ACT_WALK_AIM",
    "ACT_WALK_CROUCH",
    "ACT_RUN",
    "ACT_RUN_AIM",
    "ACT_RUN_CROUCH",
    "ACT_RUN_PROTECTED",
    "ACT_SCRIPT_CUSTOM_MOVE",
    "ACT_RANGE_ATTACK1",
    "ACT_RANGE_ATTACK2",
    "ACT_MELEE_ATTACK1",
    "ACT_MELEE_ATTACK2",
    "ACT_RELOAD",
    "ACT_ARM",
    "ACT_DISARM",
    "ACT_SIGNAL1",
    "ACT_SIGNAL2",
    "ACT_SIGNAL3",
    "ACT_LOOKBACK_RIGHT",
    "ACT_LOOKBACK_LEFT",
    "ACT_COWER",
    "ACT_SMALL_FLINCH",
    "ACT_BIG_FLINCH",
    "ACT_DIESIMPLE",
    "ACT_TURN_LEFT",
    "ACT_TURN_RIGHT",
    "ACT_CROUCH",
    "ACT_CROUCHIDLE",
    "ACT_STAND",
    "ACT_USE",
    "ACT_IDLE_ANGRY",
    "ACT_IDLE_RELAXED",
    "ACT_IDLE_STIMULATED",
    "ACT_IDLE_AGITATED",
    "ACT_WALK_RELAXED",
    "ACT_RUN_RELAXED",
];

impl Activity {
    /// No activity.
    pub const INVALID: Self = Self(-1);
    /// `ACT_RESET`.
    pub const RESET: Self = Self(0);
    /// `ACT_IDLE`.
    pub const IDLE: Self = Self(1);

    /// Look an activity up by its `ACT_*` name (case-insensitive).
    ///
    /// Unknown names yield [`Activity::INVALID`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        ACTIVITY_NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|i| i32::try_from(i).ok())
            .map_or(Self::INVALID, Self)
    }

    /// `ACT_*` name of a built-in activity.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        usize::try_from(self.0)
            .ok()
            .and_then(|i| ACTIVITY_NAMES.get(i))
            .copied()
    }

    /// Whether this is anything but [`Activity::INVALID`].
    #[must_use]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(n) => f.write_str(n),
            None => write!(f, "ACT_{}", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent State
// ---------------------------------------------------------------------------

/// Coarse high-level state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[repr(i32)]
pub enum NpcState {
    /// No state chosen yet.
    #[default]
    None = 0,
    /// Relaxed.
    Idle = 1,
    /// Aware of something, not fighting.
    Alert = 2,
    /// Fighting.
    Combat = 3,
    /// Driven by a script.
    Script = 4,
    /// Faking death.
    PlayDead = 5,
    /// Lying down.
    Prone = 6,
    /// Dead.
    Dead = 7,
}

impl NpcState {
    const ALL: [(Self, &'static str); 8] = [
        (Self::None, "NONE"),
        (Self::Idle, "IDLE"),
        (Self::Alert, "ALERT"),
        (Self::Combat, "COMBAT"),
        (Self::Script, "SCRIPT"),
        (Self::PlayDead, "PLAYDEAD"),
        (Self::Prone, "PRONE"),
        (Self::Dead, "DEAD"),
    ];

    /// Parse a state name without its `NPC_STATE_` prefix (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(s, _)| *s)
    }

    /// Name without prefix.
    #[must_use]
    pub fn name(self) -> &'static str {
        Self::ALL[self as usize].1
    }

    /// Whether the agent is in one of the "awake" states (idle to combat).
    #[must_use]
    pub fn is_awake(self) -> bool {
        (Self::Idle..=Self::Combat).contains(&self)
    }
}

// ---------------------------------------------------------------------------
// Memory Flags
// ---------------------------------------------------------------------------

/// Bit set of short-term agent memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MemoryFlags(pub u32);

impl MemoryFlags {
    /// Was provoked by the player.
    pub const PROVOKED: Self = Self(1 << 0);
    /// Is in cover.
    pub const IN_COVER: Self = Self(1 << 1);
    /// Heard or saw something suspicious.
    pub const SUSPICIOUS: Self = Self(1 << 2);
    /// The last path request failed.
    pub const PATH_FAILED: Self = Self(1 << 3);
    /// Just flinched.
    pub const FLINCHED: Self = Self(1 << 4);
    /// Guiding someone around.
    pub const TOUR_GUIDE: Self = Self(1 << 6);
    /// Holds a hint lock.
    pub const LOCKED_HINT: Self = Self(1 << 8);
    /// Mid-turn.
    pub const TURNING: Self = Self(1 << 13);
    /// Turn override active.
    pub const TURN_HACK: Self = Self(1 << 14);
    /// Class-defined.
    pub const CUSTOM4: Self = Self(1 << 28);
    /// Class-defined.
    pub const CUSTOM3: Self = Self(1 << 29);
    /// Class-defined.
    pub const CUSTOM2: Self = Self(1 << 30);
    /// Class-defined.
    pub const CUSTOM1: Self = Self(1 << 31);

    const NAMED: [(Self, &'static str); 13] = [
        (Self::PROVOKED, "PROVOKED"),
        (Self::IN_COVER, "INCOVER"),
        (Self::SUSPICIOUS, "SUSPICIOUS"),
        (Self::PATH_FAILED, "PATH_FAILED"),
        (Self::FLINCHED, "FLINCHED"),
        (Self::TOUR_GUIDE, "TOURGUIDE"),
        (Self::LOCKED_HINT, "LOCKED_HINT"),
        (Self::TURNING, "TURNING"),
        (Self::TURN_HACK, "TURNHACK"),
        (Self::CUSTOM1, "CUSTOM1"),
        (Self::CUSTOM2, "CUSTOM2"),
        (Self::CUSTOM3, "CUSTOM3"),
        (Self::CUSTOM4, "CUSTOM4"),
    ];

    /// Parse a flag name without its `MEMORY_` prefix (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(f, _)| *f)
    }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether no bit is set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

// ---------------------------------------------------------------------------
// Path & Goal Kinds
// ---------------------------------------------------------------------------

/// How a movement task should build its route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PathType {
    /// Straight travel to the goal.
    Travel = 0,
    /// To a spot with line of sight.
    Los = 1,
    /// Around the target's side.
    Flank = 2,
    /// Flank with line of sight.
    FlankLos = 3,
    /// To cover.
    Cover = 4,
    /// To cover with line of sight.
    CoverLos = 5,
}

impl PathType {
    /// Parse a path name without its `PATH_` prefix (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let found = match name.to_ascii_uppercase().as_str() {
            "TRAVEL" => Self::Travel,
            "LOS" => Self::Los,
            "FLANK" => Self::Flank,
            "FLANK_LOS" => Self::FlankLos,
            "COVER" => Self::Cover,
            "COVER_LOS" => Self::CoverLos,
            _ => return None,
        };
        Some(found)
    }
}

/// What a movement task is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum GoalType {
    /// Current enemy.
    Enemy = 0,
    /// Current target entity.
    Target = 1,
    /// Enemy's last known position.
    EnemyLkp = 2,
    /// A previously saved position.
    SavedPosition = 3,
}

impl GoalType {
    /// Parse a goal name without its `GOAL_` prefix (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let found = match name.to_ascii_uppercase().as_str() {
            "ENEMY" => Self::Enemy,
            "TARGET" => Self::Target,
            "ENEMY_LKP" => Self::EnemyLkp,
            "SAVED_POSITION" => Self::SavedPosition,
            _ => return None,
        };
        Some(found)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_lookup_is_case_insensitive() {
        assert_eq!(Activity::from_name("ACT_IDLE"), Activity::IDLE);
        assert_eq!(Activity::from_name("act_idle"), Activity::IDLE);
        assert_eq!(Activity::from_name("ACT_NOT_REAL"), Activity::INVALID);
        assert_eq!(Activity::IDLE.name(), Some("ACT_IDLE"));
        assert_eq!(Activity::INVALID.name(), None);
        assert_eq!(Activity::default(), Activity::INVALID);
    }

    #[test]
    fn npc_state_names() {
        assert_eq!(NpcState::from_name("alert"), Some(NpcState::Alert));
        assert_eq!(NpcState::from_name("BOGUS"), None);
        assert_eq!(NpcState::Combat.name(), "COMBAT");
        assert!(NpcState::Idle.is_awake());
        assert!(!NpcState::Dead.is_awake());
        assert!(!NpcState::None.is_awake());
    }

    #[test]
    fn memory_flags_set_and_clear() {
        let mut m = MemoryFlags::default();
        m.insert(MemoryFlags::PROVOKED);
        m.insert(MemoryFlags::from_name("incover").expect("known flag"));
        assert!(m.contains(MemoryFlags::PROVOKED));
        assert!(m.contains(MemoryFlags::IN_COVER));
        m.remove(MemoryFlags::PROVOKED);
        assert!(!m.contains(MemoryFlags::PROVOKED));
        assert!(!m.contains(MemoryFlags::default()));
    }

    #[test]
    fn path_and_goal_names() {
        assert_eq!(PathType::from_name("flank_los"), Some(PathType::FlankLos));
        assert_eq!(GoalType::from_name("ENEMY_LKP"), Some(GoalType::EnemyLkp));
        assert_eq!(PathType::from_name("teleport"), None);
    }
}
