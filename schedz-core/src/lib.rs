//! # schedz Core Library
//!
//! Data-driven schedule engine for simulated agents.
//!
//! Behavior is authored as text: named **schedules**, each an ordered list of
//! **tasks** plus an interrupt mask of **conditions**. Everything is resolved
//! to integer IDs at load time, so the per-tick path never touches a string.
//!
//! - [`namespace`]: process-wide name <-> global ID tables
//! - [`id_space`]: per-class local IDs chained to a parent class
//! - [`task`] / [`schedule`]: the immutable data model
//! - [`parser`] / [`repository`]: text loading, additive reload, strict and tolerant modes
//! - [`engine`]: the per-agent, per-channel state machine
//! - [`context`]: owns all of the above with an `init()` / `clear()` lifecycle
//!
//! ## Tick Contract
//!
//! Each channel performs at most `engine.max_tasks_run` task transitions per
//! tick. A task that neither completes nor fails simply resumes next tick.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod id_space;
pub mod metrics;
pub mod namespace;
pub mod parser;
pub mod repository;
pub mod schedule;
pub mod task;
pub mod types;

pub use config::SchedzConfig;
pub use context::SchedulingContext;
pub use engine::{
    BehaviorChannels, BehaviorEngine, BehaviorModule, ChannelScheduleState, TaskContext,
    TaskHandler, TaskHandlerTable,
};
pub use error::{Result, SchedzError};
pub use id_space::{ClassId, Id};
pub use namespace::{GlobalId, SymbolKind};
pub use schedule::{ConditionBits, Schedule};
pub use task::{ParamKind, Task, TaskData, TaskFailure, TaskParamCheck, TaskStatus};
pub use types::*;
