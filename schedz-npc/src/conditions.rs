//! Shared conditions and the sensor seam that asserts them each tick.

use schedz_core::namespace::GlobalId;
use schedz_core::schedule::ConditionBits;

use crate::agent::{AgentId, NpcAgent};
use crate::vocabulary::NpcVocabulary;

/// Conditions declared by the base NPC class, in local ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// A player can see the NPC.
    InPvs,
    /// Something worth breaking an idle schedule for.
    IdleInterrupt,
    /// An enemy was just acquired.
    NewEnemy,
    /// The current enemy is visible.
    SeeEnemy,
    /// The current enemy died.
    EnemyDead,
    /// A player is visible.
    SeePlayer,
    /// Took minor damage.
    LightDamage,
    /// Took serious damage.
    HeavyDamage,
    /// Heard a dangerous sound.
    HearDanger,
    /// Heard combat nearby.
    HearCombat,
    /// Heard a player.
    HearPlayer,
    /// Was provoked; also asserted from the `PROVOKED` memory bit.
    Provoked,
    /// A squad or script issued orders.
    ReceivedOrders,
    /// The previous schedule ran to completion.
    ScheduleDone,
    /// The NPC has been frozen from outside.
    NpcFreeze,
}

impl Condition {
    /// Every shared condition, in local ID order.
    pub const ALL: [Self; 15] = [
        Self::InPvs,
        Self::IdleInterrupt,
        Self::NewEnemy,
        Self::SeeEnemy,
        Self::EnemyDead,
        Self::SeePlayer,
        Self::LightDamage,
        Self::HeavyDamage,
        Self::HearDanger,
        Self::HearCombat,
        Self::HearPlayer,
        Self::Provoked,
        Self::ReceivedOrders,
        Self::ScheduleDone,
        Self::NpcFreeze,
    ];

    /// Symbol used in schedule text.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::InPvs => "COND_IN_PVS",
            Self::IdleInterrupt => "COND_IDLE_INTERRUPT",
            Self::NewEnemy => "COND_NEW_ENEMY",
            Self::SeeEnemy => "COND_SEE_ENEMY",
            Self::EnemyDead => "COND_ENEMY_DEAD",
            Self::SeePlayer => "COND_SEE_PLAYER",
            Self::LightDamage => "COND_LIGHT_DAMAGE",
            Self::HeavyDamage => "COND_HEAVY_DAMAGE",
            Self::HearDanger => "COND_HEAR_DANGER",
            Self::HearCombat => "COND_HEAR_COMBAT",
            Self::HearPlayer => "COND_HEAR_PLAYER",
            Self::Provoked => "COND_PROVOKED",
            Self::ReceivedOrders => "COND_RECEIVED_ORDERS",
            Self::ScheduleDone => "COND_SCHEDULE_DONE",
            Self::NpcFreeze => "COND_NPC_FREEZE",
        }
    }

    /// Local ID in the base class.
    #[must_use]
    pub fn local(self) -> u32 {
        self as u32
    }

    /// Whether this condition means an enemy is around.
    #[must_use]
    pub fn is_enemy_contact(self) -> bool {
        matches!(self, Self::NewEnemy | Self::SeeEnemy)
    }

    /// Whether this condition should raise an idle NPC to alert.
    #[must_use]
    pub fn is_alarming(self) -> bool {
        matches!(
            self,
            Self::LightDamage
                | Self::HeavyDamage
                | Self::HearDanger
                | Self::HearCombat
                | Self::Provoked
        )
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Write access to one agent's condition bits for the current tick.
pub struct Sensed<'a> {
    bits: &'a mut ConditionBits,
    vocabulary: &'a NpcVocabulary,
}

impl<'a> Sensed<'a> {
    pub(crate) fn new(bits: &'a mut ConditionBits, vocabulary: &'a NpcVocabulary) -> Self {
        Self { bits, vocabulary }
    }

    /// Assert a shared condition.
    pub fn assert(&mut self, condition: Condition) {
        self.bits.set_condition(self.vocabulary.condition(condition));
    }

    /// Assert a class-specific condition by global ID.
    pub fn assert_id(&mut self, condition: GlobalId) {
        self.bits.set_condition(condition);
    }

    /// Whether a shared condition is already asserted.
    #[must_use]
    pub fn is_asserted(&self, condition: Condition) -> bool {
        self.bits.has_condition(self.vocabulary.condition(condition))
    }

    /// Vocabulary the bits are expressed in.
    #[must_use]
    pub fn vocabulary(&self) -> &NpcVocabulary {
        self.vocabulary
    }
}

/// Produces an agent's conditions once per tick, before any channel runs.
pub trait ConditionSensor {
    /// Assert every condition that currently holds for `agent`.
    fn sense(&mut self, agent: &NpcAgent, now: f64, sensed: &mut Sensed<'_>);
}

impl<F> ConditionSensor for F
where
    F: FnMut(&NpcAgent, f64, &mut Sensed<'_>),
{
    fn sense(&mut self, agent: &NpcAgent, now: f64, sensed: &mut Sensed<'_>) {
        self(agent, now, sensed);
    }
}

/// Senses nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSensor;

impl ConditionSensor for NullSensor {
    fn sense(&mut self, _agent: &NpcAgent, _now: f64, _sensed: &mut Sensed<'_>) {}
}

/// A timeline of condition windows, optionally aimed at one agent.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    events: Vec<ScriptedCondition>,
}

#[derive(Debug, Clone)]
struct ScriptedCondition {
    from: f64,
    until: f64,
    agent: Option<AgentId>,
    condition: Scripted,
}

#[derive(Debug, Clone, Copy)]
enum Scripted {
    Shared(Condition),
    Class(GlobalId),
}

impl ScriptedSensor {
    /// Empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert `condition` for `from <= now < until`; `None` targets every agent.
    #[must_use]
    pub fn with(self, from: f64, until: f64, agent: Option<AgentId>, condition: Condition) -> Self {
        self.push(from, until, agent, Scripted::Shared(condition))
    }

    /// Like [`Self::with`], for a class-specific condition.
    #[must_use]
    pub fn with_id(
        self,
        from: f64,
        until: f64,
        agent: Option<AgentId>,
        condition: GlobalId,
    ) -> Self {
        self.push(from, until, agent, Scripted::Class(condition))
    }

    fn push(mut self, from: f64, until: f64, agent: Option<AgentId>, condition: Scripted) -> Self {
        self.events.push(ScriptedCondition {
            from,
            until,
            agent,
            condition,
        });
        self
    }
}

impl ConditionSensor for ScriptedSensor {
    fn sense(&mut self, agent: &NpcAgent, now: f64, sensed: &mut Sensed<'_>) {
        for e in &self.events {
            let aimed = e.agent.is_none_or(|id| id == agent.id());
            if !aimed || now < e.from || now >= e.until {
                continue;
            }
            match e.condition {
                Scripted::Shared(c) => sensed.assert(c),
                Scripted::Class(id) => sensed.assert_id(id),
            }
        }
    }
}

/// Asserts `HearDanger` at random, for soak runs.
#[derive(Debug, Clone, Copy)]
pub struct RandomSensor {
    danger_rate: f64,
}

impl RandomSensor {
    /// `danger_rate` is the per-agent, per-tick probability, clamped to 0..=1.
    #[must_use]
    pub fn new(danger_rate: f64) -> Self {
        Self {
            danger_rate: danger_rate.clamp(0.0, 1.0),
        }
    }
}

impl ConditionSensor for RandomSensor {
    fn sense(&mut self, _agent: &NpcAgent, _now: f64, sensed: &mut Sensed<'_>) {
        use rand::Rng;
        if rand::thread_rng().gen_bool(self.danger_rate) {
            sensed.assert(Condition::HearDanger);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_prefixed() {
        let mut names: Vec<_> = Condition::ALL.iter().map(|c| c.name()).collect();
        assert!(names.iter().all(|n| n.starts_with("COND_")));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Condition::ALL.len());
    }

    #[test]
    fn local_ids_follow_declaration_order() {
        for (i, c) in Condition::ALL.iter().enumerate() {
            assert_eq!(c.local() as usize, i);
        }
    }

    #[test]
    fn alarm_classes_are_disjoint() {
        for c in Condition::ALL {
            assert!(!(c.is_alarming() && c.is_enemy_contact()), "{c:?}");
        }
    }
}
