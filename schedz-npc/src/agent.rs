//! The NPC agent the reference behaviors drive.

use std::collections::HashMap;
use std::fmt;

use schedz_core::schedule::ConditionBits;
use schedz_core::types::{Activity, MemoryFlags, NpcState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Generate a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which behavior module an agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Base NPC behavior only.
    Generic,
    /// Citizen behavior layered on the base.
    Citizen,
}

/// Everything the behaviors and task handlers read and write about one NPC.
///
/// Activity changes are instantaneous here: setting the ideal activity also
/// sets the current one.
#[derive(Debug, Clone)]
pub struct NpcAgent {
    id: AgentId,
    name: String,
    kind: AgentKind,
    state: NpcState,
    ideal_state: NpcState,
    activity: Activity,
    ideal_activity: Activity,
    memory: MemoryFlags,
    tolerance_distance: f32,
    conditions: ConditionBits,
    waits: HashMap<usize, f64>,
    greetings: u32,
    debug_breaks: u32,
}

impl NpcAgent {
    /// A fresh idle agent.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            kind,
            state: NpcState::Idle,
            ideal_state: NpcState::Idle,
            activity: Activity::IDLE,
            ideal_activity: Activity::IDLE,
            memory: MemoryFlags::default(),
            tolerance_distance: 0.0,
            conditions: ConditionBits::new(),
            waits: HashMap::new(),
            greetings: 0,
            debug_breaks: 0,
        }
    }

    /// Agent ID.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Behavior module the agent runs.
    #[must_use]
    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    // -- state ----------------------------------------------------------------

    /// Current NPC state.
    #[must_use]
    pub fn state(&self) -> NpcState {
        self.state
    }

    /// State the agent will move to on its next schedule change.
    #[must_use]
    pub fn ideal_state(&self) -> NpcState {
        self.ideal_state
    }

    /// Propose a state; applied by [`Self::apply_ideal_state`].
    pub fn set_ideal_state(&mut self, state: NpcState) {
        self.ideal_state = state;
    }

    /// Force the current state, e.g. from outside the schedule system.
    pub fn set_state(&mut self, state: NpcState) {
        self.state = state;
        self.ideal_state = state;
    }

    /// Make the ideal state current. Returns whether it changed.
    pub fn apply_ideal_state(&mut self) -> bool {
        let changed = self.state != self.ideal_state;
        self.state = self.ideal_state;
        changed
    }

    // -- activity ---------------------------------------------------------------

    /// Activity being played.
    #[must_use]
    pub fn activity(&self) -> Activity {
        self.activity
    }

    /// Activity the agent is heading for.
    #[must_use]
    pub fn ideal_activity(&self) -> Activity {
        self.ideal_activity
    }

    /// Switch to `activity`.
    pub fn set_ideal_activity(&mut self, activity: Activity) {
        self.ideal_activity = activity;
        self.activity = activity;
    }

    /// Drop the current activity so the next one is chosen from scratch.
    pub fn reset_activity(&mut self) {
        self.activity = Activity::RESET;
        self.ideal_activity = Activity::RESET;
    }

    // -- memory -----------------------------------------------------------------

    /// Memory bits.
    #[must_use]
    pub fn memory(&self) -> MemoryFlags {
        self.memory
    }

    /// Set memory bits.
    pub fn remember(&mut self, flags: MemoryFlags) {
        self.memory.insert(flags);
    }

    /// Clear memory bits.
    pub fn forget(&mut self, flags: MemoryFlags) {
        self.memory.remove(flags);
    }

    /// Whether every bit of `flags` is remembered.
    #[must_use]
    pub fn has_memory(&self, flags: MemoryFlags) -> bool {
        self.memory.contains(flags)
    }

    // -- movement ---------------------------------------------------------------

    /// Goal tolerance for the next move.
    #[must_use]
    pub fn tolerance_distance(&self) -> f32 {
        self.tolerance_distance
    }

    /// Set the goal tolerance.
    pub fn set_tolerance_distance(&mut self, distance: f32) {
        self.tolerance_distance = distance;
    }

    // -- conditions -------------------------------------------------------------

    /// Conditions gathered this tick.
    #[must_use]
    pub fn conditions(&self) -> &ConditionBits {
        &self.conditions
    }

    pub(crate) fn set_conditions(&mut self, bits: ConditionBits) {
        self.conditions = bits;
    }

    // -- waits ------------------------------------------------------------------

    /// Start a wait on `channel` that ends at `until`.
    pub fn set_wait(&mut self, channel: usize, until: f64) {
        self.waits.insert(channel, until);
    }

    /// Whether the wait on `channel` has run out. No wait counts as finished.
    #[must_use]
    pub fn is_wait_finished(&self, channel: usize, now: f64) -> bool {
        self.waits.get(&channel).is_none_or(|until| now >= *until)
    }

    /// Drop the wait on `channel`.
    pub fn clear_wait(&mut self, channel: usize) {
        self.waits.remove(&channel);
    }

    // -- bookkeeping ------------------------------------------------------------

    /// Times this agent greeted someone.
    #[must_use]
    pub fn greetings(&self) -> u32 {
        self.greetings
    }

    pub(crate) fn note_greeting(&mut self) {
        self.greetings += 1;
    }

    /// Times this agent hit `TASK_DEBUG_BREAK`.
    #[must_use]
    pub fn debug_breaks(&self) -> u32 {
        self.debug_breaks
    }

    pub(crate) fn note_debug_break(&mut self) {
        self.debug_breaks += 1;
    }

    /// Serializable view for reports.
    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            state: self.state,
            activity: self.activity.to_string(),
            memory: self.memory.0,
            greetings: self.greetings,
            debug_breaks: self.debug_breaks,
        }
    }
}

/// Reportable agent state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent ID.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Behavior module.
    pub kind: AgentKind,
    /// NPC state.
    pub state: NpcState,
    /// Current activity name.
    pub activity: String,
    /// Raw memory bits.
    pub memory: u32,
    /// Greetings made.
    pub greetings: u32,
    /// Debug breaks hit.
    pub debug_breaks: u32,
}
