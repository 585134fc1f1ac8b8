//! Schedule selection for the reference NPC classes.
//!
//! [`BaseNpcBehavior`] maps NPC state to a shared schedule. [`CitizenBehavior`]
//! handles what is specific to citizens and hands everything else to the base
//! explicitly; the engine never consults a parent module on its own.

use schedz_core::engine::BehaviorModule;
use schedz_core::id_space::{ClassId, Id};
use schedz_core::schedule::Schedule;
use schedz_core::task::TaskFailure;
use schedz_core::types::NpcState;
use tracing::{debug, trace};

use crate::agent::NpcAgent;
use crate::conditions::Condition;
use crate::schedules::SharedSchedule;
use crate::vocabulary::{CitizenVocabulary, NpcVocabulary};

// ---------------------------------------------------------------------------
// Base NPC
// ---------------------------------------------------------------------------

/// Behavior shared by every NPC.
#[derive(Debug, Clone)]
pub struct BaseNpcBehavior {
    vocabulary: NpcVocabulary,
}

impl BaseNpcBehavior {
    /// Behavior over a registered vocabulary.
    #[must_use]
    pub fn new(vocabulary: NpcVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Vocabulary the behavior selects from.
    #[must_use]
    pub fn vocabulary(&self) -> &NpcVocabulary {
        &self.vocabulary
    }

    fn senses(&self, agent: &NpcAgent, condition: Condition) -> bool {
        agent
            .conditions()
            .has_condition(self.vocabulary.condition(condition))
    }

    /// Whether `id` names `schedule`, however it was expressed.
    ///
    /// Local numbers below the derived range mean the same shared schedule in
    /// every class chained to the base.
    #[must_use]
    pub fn is_shared(&self, id: Id, schedule: SharedSchedule) -> bool {
        match id {
            Id::Local { id, .. } => id == schedule.local(),
            Id::Global(g) => g == self.vocabulary.schedule_global(schedule),
        }
    }

    /// State the agent should move to given this tick's conditions.
    #[must_use]
    pub fn ideal_state(&self, agent: &NpcAgent) -> NpcState {
        let current = agent.ideal_state();
        if matches!(current, NpcState::Dead | NpcState::Script) {
            return current;
        }
        if Condition::ALL
            .iter()
            .any(|c| c.is_enemy_contact() && self.senses(agent, *c))
        {
            return NpcState::Combat;
        }
        let alarmed = Condition::ALL
            .iter()
            .any(|c| c.is_alarming() && self.senses(agent, *c));
        if alarmed && matches!(current, NpcState::None | NpcState::Idle) {
            return NpcState::Alert;
        }
        current
    }
}

impl BehaviorModule<NpcAgent> for BaseNpcBehavior {
    fn class(&self) -> Option<ClassId> {
        Some(self.vocabulary.class())
    }

    fn select_schedule(&self, _channel: usize, agent: &NpcAgent) -> Option<Id> {
        if self.senses(agent, Condition::NpcFreeze) {
            return Some(self.vocabulary.schedule(SharedSchedule::WaitForScript));
        }
        let schedule = match agent.state() {
            NpcState::None | NpcState::Idle | NpcState::PlayDead | NpcState::Prone => {
                SharedSchedule::IdleStand
            }
            NpcState::Alert | NpcState::Combat => SharedSchedule::AlertStand,
            NpcState::Script => SharedSchedule::WaitForScript,
            NpcState::Dead => return None,
        };
        Some(self.vocabulary.schedule(schedule))
    }

    fn select_fail_schedule(
        &self,
        channel: usize,
        agent: &NpcAgent,
        failed_schedule: Option<Id>,
        _failed_task: Option<Id>,
        failure: &TaskFailure,
    ) -> Option<Id> {
        if failed_schedule.is_some_and(|s| self.is_shared(s, SharedSchedule::Fail)) {
            debug!(channel, agent = %agent.id(), %failure, "Fail schedule itself failed");
            return None;
        }
        Some(self.vocabulary.schedule(SharedSchedule::Fail))
    }

    fn on_schedule_change(&self, channel: usize, agent: &mut NpcAgent) {
        let ideal = self.ideal_state(agent);
        agent.set_ideal_state(ideal);
        if agent.apply_ideal_state() {
            debug!(channel, agent = %agent.id(), state = ideal.name(), "NPC state changed");
        }
    }

    fn on_start_schedule(&self, channel: usize, agent: &mut NpcAgent, schedule: &Schedule) {
        trace!(channel, agent = %agent.id(), schedule = schedule.name(), "Schedule starting");
    }
}

// ---------------------------------------------------------------------------
// Citizen
// ---------------------------------------------------------------------------

/// Citizens patrol when idle and answer when called.
#[derive(Debug, Clone)]
pub struct CitizenBehavior {
    base: BaseNpcBehavior,
    citizen: CitizenVocabulary,
}

impl CitizenBehavior {
    /// Citizen behavior layered on `base`.
    #[must_use]
    pub fn new(base: BaseNpcBehavior, citizen: CitizenVocabulary) -> Self {
        Self { base, citizen }
    }

    fn is_patrol(&self, id: Id) -> bool {
        match id {
            Id::Local { id, .. } => id == CitizenVocabulary::PATROL,
            Id::Global(g) => g == self.citizen.patrol,
        }
    }
}

impl BehaviorModule<NpcAgent> for CitizenBehavior {
    fn class(&self) -> Option<ClassId> {
        Some(self.citizen.class())
    }

    fn select_schedule(&self, channel: usize, agent: &NpcAgent) -> Option<Id> {
        if agent.conditions().has_condition(self.citizen.called) {
            return Some(self.citizen.answer_call_id());
        }
        if agent.state() == NpcState::Idle {
            return Some(self.citizen.patrol_id());
        }
        self.base.select_schedule(channel, agent)
    }

    fn select_fail_schedule(
        &self,
        channel: usize,
        agent: &NpcAgent,
        failed_schedule: Option<Id>,
        failed_task: Option<Id>,
        failure: &TaskFailure,
    ) -> Option<Id> {
        if failure.is_path_failure() && failed_schedule.is_some_and(|s| self.is_patrol(s)) {
            return Some(self.base.vocabulary().schedule(SharedSchedule::IdleStand));
        }
        self.base
            .select_fail_schedule(channel, agent, failed_schedule, failed_task, failure)
    }

    fn on_schedule_change(&self, channel: usize, agent: &mut NpcAgent) {
        self.base.on_schedule_change(channel, agent);
    }

    fn on_start_schedule(&self, channel: usize, agent: &mut NpcAgent, schedule: &Schedule) {
        self.base.on_start_schedule(channel, agent, schedule);
    }
}
