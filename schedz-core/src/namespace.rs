//! Process-wide symbol namespaces.
//!
//! Every schedule, task and condition name maps to exactly one global ID.
//! Global IDs live above [`GLOBAL_IDS_BASE`] when expressed as raw integers,
//! which keeps them distinguishable from the small per-class local IDs that
//! schedule data carries (see [`crate::id_space`]).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedzError};
use crate::schedule::MAX_CONDITIONS;
use crate::task::TaskParamCheck;

/// Raw integer offset of the first global ID.
pub const GLOBAL_IDS_BASE: i32 = 1_000_000_000;

/// Raw "no ID" sentinel shared by local and global IDs.
pub const NO_ID: i32 = -1;

/// Whether a raw ID is global (or the none sentinel).
#[must_use]
pub const fn is_global_raw(raw: i32) -> bool {
    raw >= GLOBAL_IDS_BASE || raw == NO_ID
}

/// Whether a raw ID is local (or the none sentinel).
#[must_use]
pub const fn is_local_raw(raw: i32) -> bool {
    raw < GLOBAL_IDS_BASE || raw == NO_ID
}

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// The three symbol kinds the schedule system names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// `SCHED_*` symbols.
    Schedule,
    /// `TASK_*` symbols.
    Task,
    /// `COND_*` symbols.
    Condition,
}

impl SymbolKind {
    /// Name prefix every symbol of this kind carries in schedule text.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Schedule => "SCHED_",
            Self::Task => "TASK_",
            Self::Condition => "COND_",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Schedule => "schedule",
            Self::Task => "task",
            Self::Condition => "condition",
        })
    }
}

/// A globally unique symbol ID, stored as its ordinal within the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalId(u32);

impl GlobalId {
    /// Wrap a namespace ordinal.
    #[must_use]
    pub const fn new(ordinal: u32) -> Self {
        Self(ordinal)
    }

    /// Position within the namespace (also the condition bit index).
    #[must_use]
    pub const fn ordinal(self) -> u32 {
        self.0
    }

    /// Raw integer form (`GLOBAL_IDS_BASE + ordinal`).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn raw(self) -> i32 {
        GLOBAL_IDS_BASE + self.0 as i32
    }

    /// Parse a raw integer; `None` for local IDs and the sentinel.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_raw(raw: i32) -> Option<Self> {
        if raw >= GLOBAL_IDS_BASE {
            Some(Self((raw - GLOBAL_IDS_BASE) as u32))
        } else {
            None
        }
    }

    /// The ID `n` slots after this one.
    #[must_use]
    pub const fn offset(self, n: u32) -> Self {
        Self(self.0 + n)
    }
}

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

// ---------------------------------------------------------------------------
// Global Namespace
// ---------------------------------------------------------------------------

/// Bidirectional name <-> global ID table for one symbol kind.
#[derive(Debug, Clone)]
pub struct GlobalNamespace {
    kind: SymbolKind,
    by_name: HashMap<String, GlobalId>,
    by_id: HashMap<GlobalId, String>,
    next_base: u32,
}

impl GlobalNamespace {
    /// Create an empty namespace.
    #[must_use]
    pub fn new(kind: SymbolKind) -> Self {
        Self {
            kind,
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            next_base: 0,
        }
    }

    /// Symbol kind this namespace holds.
    #[must_use]
    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Register `name` under an explicit global ID.
    ///
    /// # Errors
    /// `DuplicateSymbol` if the name is already registered, `GlobalIdTaken`
    /// if another name already holds `id`.
    pub fn add_symbol(&mut self, name: &str, id: GlobalId) -> Result<()> {
        if self.by_name.contains_key(name) {
            return Err(SchedzError::DuplicateSymbol {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        if let Some(owner) = self.by_id.get(&id) {
            return Err(SchedzError::GlobalIdTaken {
                kind: self.kind,
                id: id.raw(),
                owner: owner.clone(),
            });
        }
        self.by_name.insert(name.to_string(), id);
        self.by_id.insert(id, name.to_string());
        self.next_base = self.next_base.max(id.ordinal() + 1);
        Ok(())
    }

    /// Register `name` at the next free global ID.
    ///
    /// # Errors
    /// `DuplicateSymbol` if the name is already registered.
    pub fn allocate(&mut self, name: &str) -> Result<GlobalId> {
        let id = self.next_global_base();
        self.add_symbol(name, id)?;
        Ok(id)
    }

    /// First global ID no registration has reached yet.
    #[must_use]
    pub fn next_global_base(&self) -> GlobalId {
        GlobalId::new(self.next_base)
    }

    /// Look up a name.
    #[must_use]
    pub fn symbol_to_id(&self, name: &str) -> Option<GlobalId> {
        self.by_name.get(name).copied()
    }

    /// Look up an ID.
    #[must_use]
    pub fn id_to_symbol(&self, id: GlobalId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Number of registered symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All registered symbols in ID order.
    #[must_use]
    pub fn symbols(&self) -> Vec<(GlobalId, &str)> {
        let mut out: Vec<_> = self.by_id.iter().map(|(id, n)| (*id, n.as_str())).collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Forget every symbol and restart allocation at zero.
    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_id.clear();
        self.next_base = 0;
    }
}

// ---------------------------------------------------------------------------
// Schedule Namespaces
// ---------------------------------------------------------------------------

/// The schedule, task and condition namespaces plus per-task parameter shapes.
#[derive(Debug, Clone)]
pub struct ScheduleNamespaces {
    schedules: GlobalNamespace,
    tasks: GlobalNamespace,
    conditions: GlobalNamespace,
    task_param_checks: HashMap<GlobalId, TaskParamCheck>,
}

impl Default for ScheduleNamespaces {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleNamespaces {
    /// Create three empty namespaces.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schedules: GlobalNamespace::new(SymbolKind::Schedule),
            tasks: GlobalNamespace::new(SymbolKind::Task),
            conditions: GlobalNamespace::new(SymbolKind::Condition),
            task_param_checks: HashMap::new(),
        }
    }

    /// Namespace for one symbol kind.
    #[must_use]
    pub fn namespace(&self, kind: SymbolKind) -> &GlobalNamespace {
        match kind {
            SymbolKind::Schedule => &self.schedules,
            SymbolKind::Task => &self.tasks,
            SymbolKind::Condition => &self.conditions,
        }
    }

    pub(crate) fn namespace_mut(&mut self, kind: SymbolKind) -> &mut GlobalNamespace {
        match kind {
            SymbolKind::Schedule => &mut self.schedules,
            SymbolKind::Task => &mut self.tasks,
            SymbolKind::Condition => &mut self.conditions,
        }
    }

    /// Register a schedule at the next free global ID.
    ///
    /// # Errors
    /// Propagates namespace registration errors.
    pub fn add_schedule(&mut self, name: &str) -> Result<GlobalId> {
        self.schedules.allocate(name)
    }

    /// Register a task and its parameter shape at the next free global ID.
    ///
    /// # Errors
    /// Propagates namespace registration errors.
    pub fn add_task(&mut self, name: &str, check: TaskParamCheck) -> Result<GlobalId> {
        let id = self.tasks.allocate(name)?;
        self.task_param_checks.insert(id, check);
        Ok(id)
    }

    /// Register a condition at the next free global ID.
    ///
    /// # Errors
    /// `ConditionLimit` once every condition bit is taken.
    pub fn add_condition(&mut self, name: &str) -> Result<GlobalId> {
        self.check_condition_room(name, self.conditions.next_global_base())?;
        self.conditions.allocate(name)
    }

    pub(crate) fn check_condition_room(&self, name: &str, id: GlobalId) -> Result<()> {
        if id.ordinal() as usize >= MAX_CONDITIONS {
            return Err(SchedzError::ConditionLimit {
                name: name.to_string(),
                limit: MAX_CONDITIONS,
            });
        }
        Ok(())
    }

    pub(crate) fn set_task_param_check(&mut self, id: GlobalId, check: TaskParamCheck) {
        self.task_param_checks.insert(id, check);
    }

    /// Schedule name -> ID.
    #[must_use]
    pub fn schedule_symbol_to_id(&self, name: &str) -> Option<GlobalId> {
        self.schedules.symbol_to_id(name)
    }

    /// Schedule ID -> name.
    #[must_use]
    pub fn schedule_id_to_symbol(&self, id: GlobalId) -> Option<&str> {
        self.schedules.id_to_symbol(id)
    }

    /// Task name -> ID.
    #[must_use]
    pub fn task_symbol_to_id(&self, name: &str) -> Option<GlobalId> {
        self.tasks.symbol_to_id(name)
    }

    /// Task ID -> name.
    #[must_use]
    pub fn task_id_to_symbol(&self, id: GlobalId) -> Option<&str> {
        self.tasks.id_to_symbol(id)
    }

    /// Condition name -> ID.
    #[must_use]
    pub fn condition_symbol_to_id(&self, name: &str) -> Option<GlobalId> {
        self.conditions.symbol_to_id(name)
    }

    /// Condition ID -> name.
    #[must_use]
    pub fn condition_id_to_symbol(&self, id: GlobalId) -> Option<&str> {
        self.conditions.id_to_symbol(id)
    }

    /// Parameter shape registered for a global task ID.
    #[must_use]
    pub fn task_param_check(&self, id: GlobalId) -> Option<&TaskParamCheck> {
        self.task_param_checks.get(&id)
    }

    /// Number of condition slots in use (highest ordinal + 1).
    #[must_use]
    pub fn num_conditions(&self) -> usize {
        self.conditions.next_global_base().ordinal() as usize
    }

    /// Forget all symbols.
    pub fn clear(&mut self) {
        self.schedules.clear();
        self.tasks.clear();
        self.conditions.clear();
        self.task_param_checks.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
