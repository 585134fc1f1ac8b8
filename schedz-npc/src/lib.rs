//! # schedz-npc: Reference NPC Integration for schedz
//!
//! Plugs a concrete agent into the game-agnostic `schedz-core` engine: the
//! shared task, condition and schedule vocabulary every NPC class starts
//! from, their handlers, two behavior modules and a runtime that ticks a
//! whole population.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               NpcRuntime                │
//! │  ┌─────────────┐  ┌──────────────────┐  │
//! │  │   Sensors   │  │ Behavior modules │  │
//! │  └──────┬──────┘  └────────┬─────────┘  │
//! │         │                  │            │
//! │         ▼                  ▼            │
//! │    ┌──────────────────────────────┐     │
//! │    │  schedz-core BehaviorEngine  │     │
//! │    └──────────────────────────────┘     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `agent`: the NPC the handlers act on
//! - `schedules` / `tasks` / `conditions`: shared vocabulary, task handlers, sensors
//! - `vocabulary`: class registration (`npc_base`, `npc_citizen`)
//! - `behavior`: schedule selection per class
//! - `runtime`: multi-agent tick loop and reporting

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod behavior;
pub mod conditions;
pub mod runtime;
pub mod schedules;
pub mod tasks;
pub mod vocabulary;

pub use agent::{AgentId, AgentKind, NpcAgent};
pub use conditions::{Condition, ConditionSensor, NullSensor, RandomSensor, ScriptedSensor};
pub use runtime::{NpcRuntime, RuntimeReport};
pub use schedules::SharedSchedule;
pub use tasks::SharedTask;
