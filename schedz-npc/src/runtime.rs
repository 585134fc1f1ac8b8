//! Multi-agent runtime: owns the scheduling context, the behaviors and every
//! agent, and drives them one tick at a time.
//!
//! ## Tick order
//!
//! 1. Conditions are gathered for every agent through the [`ConditionSensor`].
//! 2. Channels are maintained agent by agent, in spawn order, channel by
//!    channel in index order.
//!
//! No agent's channels run before every agent's conditions are in.

use std::path::Path;

use schedz_core::config::SchedzConfig;
use schedz_core::engine::{BehaviorChannels, BehaviorEngine, ChannelSnapshot, TaskHandlerTable};
use schedz_core::error::Result;
use schedz_core::metrics::{spans, CounterSnapshot, TickBudgetMonitor, TickPercentiles};
use schedz_core::parser::LoadReport;
use schedz_core::schedule::ConditionBits;
use schedz_core::types::{MemoryFlags, NpcState};
use schedz_core::SchedulingContext;
use serde::Serialize;
use tracing::{debug, debug_span, info, warn};

use crate::agent::{AgentId, AgentKind, AgentSnapshot, NpcAgent};
use crate::behavior::{BaseNpcBehavior, CitizenBehavior};
use crate::conditions::{Condition, ConditionSensor, Sensed};
use crate::schedules::{CITIZEN_SCHEDULES, DEFAULT_SCHEDULES};
use crate::tasks::{base_task_table, citizen_task_table};
use crate::vocabulary::{CitizenVocabulary, NpcVocabulary, BASE_CLASS, CITIZEN_CLASS};

// ---------------------------------------------------------------------------
// Behaviors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Behaviors {
    base: BaseNpcBehavior,
    citizen: CitizenBehavior,
    base_tasks: TaskHandlerTable<NpcAgent>,
    citizen_tasks: TaskHandlerTable<NpcAgent>,
}

impl Behaviors {
    fn engine<'a>(
        &'a self,
        ctx: &'a SchedulingContext,
        kind: AgentKind,
    ) -> BehaviorEngine<'a, NpcAgent> {
        match kind {
            AgentKind::Generic => BehaviorEngine::new(ctx, &self.base, &self.base_tasks),
            AgentKind::Citizen => BehaviorEngine::new(ctx, &self.citizen, &self.citizen_tasks),
        }
    }
}

struct AgentSlot {
    agent: NpcAgent,
    channels: BehaviorChannels,
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Every agent of a level plus the schedule state they share.
pub struct NpcRuntime {
    ctx: SchedulingContext,
    vocabulary: NpcVocabulary,
    citizen_vocabulary: CitizenVocabulary,
    behaviors: Behaviors,
    agents: Vec<AgentSlot>,
    monitor: TickBudgetMonitor,
    ticks: u64,
}

impl NpcRuntime {
    /// Bring up the context, register both NPC classes and load their
    /// built-in schedules.
    ///
    /// # Errors
    /// Registration errors, or a load error from the built-in schedules in
    /// strict mode.
    pub fn new(config: SchedzConfig) -> Result<Self> {
        let budget = config.telemetry.tick_budget_ms;
        let mut ctx = SchedulingContext::new(config);
        ctx.init();

        let vocabulary = NpcVocabulary::register(&mut ctx)?;
        let citizen_vocabulary = CitizenVocabulary::register(&mut ctx)?;

        let base_tasks = base_task_table(&vocabulary);
        let citizen_tasks = citizen_task_table(&base_tasks, &citizen_vocabulary);
        let base = BaseNpcBehavior::new(vocabulary.clone());
        let citizen = CitizenBehavior::new(base.clone(), citizen_vocabulary.clone());

        let mut runtime = Self {
            ctx,
            vocabulary,
            citizen_vocabulary,
            behaviors: Behaviors {
                base,
                citizen,
                base_tasks,
                citizen_tasks,
            },
            agents: Vec::new(),
            monitor: TickBudgetMonitor::new(budget),
            ticks: 0,
        };
        runtime.load_builtin_schedules()?;
        Ok(runtime)
    }

    /// Load the default and citizen schedule text.
    ///
    /// # Errors
    /// See [`SchedulingContext::load_schedules`].
    pub fn load_builtin_schedules(&mut self) -> Result<()> {
        self.load_schedules(BASE_CLASS, DEFAULT_SCHEDULES)?;
        self.load_schedules(CITIZEN_CLASS, CITIZEN_SCHEDULES)?;
        Ok(())
    }

    /// Load schedule text for a class.
    ///
    /// # Errors
    /// See [`SchedulingContext::load_schedules`].
    pub fn load_schedules(&mut self, class: &str, source: &str) -> Result<LoadReport> {
        self.ctx.load_schedules(class, source)
    }

    /// Load a schedule file for a class.
    ///
    /// # Errors
    /// See [`SchedulingContext::load_schedules_from_file`].
    pub fn load_schedules_from_file(&mut self, class: &str, path: &Path) -> Result<LoadReport> {
        self.ctx.load_schedules_from_file(class, path)
    }

    /// Level teardown: drop every schedule. Running channels notice on their
    /// next tick and clear themselves.
    pub fn teardown(&mut self) {
        self.ctx.clear();
        info!(agents = self.agents.len(), "Schedules torn down");
    }

    // -- accessors ----------------------------------------------------------

    /// Scheduling context.
    #[must_use]
    pub fn context(&self) -> &SchedulingContext {
        &self.ctx
    }

    /// Base vocabulary.
    #[must_use]
    pub fn vocabulary(&self) -> &NpcVocabulary {
        &self.vocabulary
    }

    /// Citizen vocabulary.
    #[must_use]
    pub fn citizen_vocabulary(&self) -> &CitizenVocabulary {
        &self.citizen_vocabulary
    }

    /// Tick timing.
    #[must_use]
    pub fn monitor(&self) -> &TickBudgetMonitor {
        &self.monitor
    }

    /// Ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // -- agents -------------------------------------------------------------

    /// Add an agent with channel 0 started. Agents tick in spawn order.
    pub fn spawn(&mut self, name: impl Into<String>, kind: AgentKind) -> AgentId {
        let agent = NpcAgent::new(name, kind);
        let id = agent.id();
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        debug!(agent = %id, name = agent.name(), ?kind, "Agent spawned");
        self.agents.push(AgentSlot { agent, channels });
        id
    }

    /// Remove an agent. Returns whether it existed.
    pub fn despawn(&mut self, id: AgentId) -> bool {
        let Some(index) = self.agents.iter().position(|s| s.agent.id() == id) else {
            return false;
        };
        self.agents.remove(index);
        true
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether there are no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agents in tick order.
    pub fn agents(&self) -> impl Iterator<Item = &NpcAgent> {
        self.agents.iter().map(|s| &s.agent)
    }

    /// Borrow an agent.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&NpcAgent> {
        self.slot(id).map(|s| &s.agent)
    }

    /// Mutably borrow an agent, e.g. to set its state from outside.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut NpcAgent> {
        self.slot_mut(id).map(|s| &mut s.agent)
    }

    /// Borrow an agent's channels.
    #[must_use]
    pub fn channels(&self, id: AgentId) -> Option<&BehaviorChannels> {
        self.slot(id).map(|s| &s.channels)
    }

    /// Mutably borrow an agent's channels, to start or stop one.
    pub fn channels_mut(&mut self, id: AgentId) -> Option<&mut BehaviorChannels> {
        self.slot_mut(id).map(|s| &mut s.channels)
    }

    /// Install a schedule by name on one channel, as a script would.
    ///
    /// Returns `false` if the agent, the channel or the schedule is unknown.
    pub fn force_schedule(
        &mut self,
        id: AgentId,
        channel: usize,
        schedule: &str,
        now: f64,
    ) -> bool {
        let Some(slot) = self.agents.iter_mut().find(|s| s.agent.id() == id) else {
            return false;
        };
        let engine = self.behaviors.engine(&self.ctx, slot.agent.kind());
        let class = match slot.agent.kind() {
            AgentKind::Generic => self.vocabulary.class(),
            AgentKind::Citizen => self.citizen_vocabulary.class(),
        };
        let Some(schedule_id) = self.ctx.schedule_id(Some(class), schedule) else {
            warn!(agent = %id, schedule, "Couldn't find schedule");
            return false;
        };
        let Ok(state) = slot.channels.channel_mut(channel) else {
            return false;
        };
        engine.set_schedule_by_id(channel, state, schedule_id, now)
    }

    fn slot(&self, id: AgentId) -> Option<&AgentSlot> {
        self.agents.iter().find(|s| s.agent.id() == id)
    }

    fn slot_mut(&mut self, id: AgentId) -> Option<&mut AgentSlot> {
        self.agents.iter_mut().find(|s| s.agent.id() == id)
    }

    // -- ticking ------------------------------------------------------------

    /// Run one simulation tick at time `now` (seconds).
    pub fn tick(&mut self, now: f64, sensor: &mut dyn ConditionSensor) {
        if !self.ctx.config().general.enabled {
            return;
        }
        self.ticks += 1;
        let _span = debug_span!(spans::TICK, tick = self.ticks).entered();
        let _timing = self.monitor.begin_tick();

        {
            let _gather = debug_span!(spans::GATHER_CONDITIONS).entered();
            for slot in &mut self.agents {
                let mut bits = ConditionBits::new();
                let mut sensed = Sensed::new(&mut bits, &self.vocabulary);
                sensor.sense(&slot.agent, now, &mut sensed);
                if slot.agent.has_memory(MemoryFlags::PROVOKED) {
                    sensed.assert(Condition::Provoked);
                }
                slot.agent.set_conditions(bits);
            }
        }

        for slot in &mut self.agents {
            if slot.agent.state() == NpcState::Dead {
                continue;
            }
            let engine = self.behaviors.engine(&self.ctx, slot.agent.kind());
            let conditions = *slot.agent.conditions();
            engine.maintain_channel_schedules(
                &mut slot.channels,
                &mut slot.agent,
                &conditions,
                now,
            );
        }
    }

    /// Run `ticks` ticks of `dt` seconds starting at `start`.
    pub fn run(&mut self, start: f64, dt: f64, ticks: u32, sensor: &mut dyn ConditionSensor) {
        for i in 0..ticks {
            self.tick(start + f64::from(i) * dt, sensor);
        }
    }

    // -- reporting ----------------------------------------------------------

    /// Serializable snapshot of every agent, the counters and tick timing.
    #[must_use]
    pub fn report(&self) -> RuntimeReport {
        RuntimeReport {
            ticks: self.ticks,
            schedules_loaded: self.ctx.repository().len(),
            agents: self
                .agents
                .iter()
                .map(|s| AgentReport {
                    agent: s.agent.snapshot(),
                    channels: s.channels.iter().map(|c| c.snapshot()).collect(),
                })
                .collect(),
            counters: self.ctx.counters().snapshot(),
            tick_timing: self.monitor.percentiles(),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One agent and its channels.
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    /// Agent state.
    pub agent: AgentSnapshot,
    /// Channels in index order.
    pub channels: Vec<ChannelSnapshot>,
}

/// Everything `schedz-sim` prints at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeReport {
    /// Ticks run.
    pub ticks: u64,
    /// Schedules in the repository.
    pub schedules_loaded: usize,
    /// Agents in tick order.
    pub agents: Vec<AgentReport>,
    /// Engine counters.
    pub counters: CounterSnapshot,
    /// Tick wall-time distribution.
    pub tick_timing: TickPercentiles,
}
