//! Class-local ID spaces.
//!
//! Each class that contributes schedules, tasks or conditions owns one
//! [`ClassScheduleIdSpace`]. A class numbers its symbols with small local
//! integers; the space claims a contiguous run of global IDs the first time
//! it registers a symbol and maps between the two by offset. Lookups that
//! miss fall through to the parent class, so derived classes see every
//! symbol their ancestors declared.
//!
//! Spaces live in an [`IdSpaceArena`] and reference their parent by
//! [`ClassId`] handle rather than by pointer.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedzError};
use crate::namespace::{GlobalId, GlobalNamespace, ScheduleNamespaces, SymbolKind};
use crate::task::TaskParamCheck;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle to a class ID space inside an [`IdSpaceArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    /// Arena slot of this class.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// A schedule, task or condition reference.
///
/// `Local` IDs are only meaningful through the class they were resolved for;
/// `Global` IDs are unique process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Id {
    /// A class-scoped small integer.
    Local {
        /// Class whose visible range the ID belongs to.
        class: ClassId,
        /// Local number.
        id: u32,
    },
    /// A process-wide ID.
    Global(GlobalId),
}

impl Id {
    /// Build a local ID.
    #[must_use]
    pub const fn local(class: ClassId, id: u32) -> Self {
        Self::Local { class, id }
    }

    /// Raw integer form: the local number, or `GLOBAL_IDS_BASE + ordinal`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn raw(self) -> i32 {
        match self {
            Self::Local { id, .. } => id as i32,
            Self::Global(g) => g.raw(),
        }
    }

    /// Whether this is a class-scoped ID.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local { .. })
    }
}

impl From<GlobalId> for Id {
    fn from(g: GlobalId) -> Self {
        Self::Global(g)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { class, id } => write!(f, "{id}@{class}"),
            Self::Global(g) => write!(f, "{g}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Local ID Space
// ---------------------------------------------------------------------------

/// One class's local-to-global mapping for one symbol kind.
#[derive(Debug, Clone)]
pub struct LocalIdSpace {
    kind: SymbolKind,
    /// `(local_base, global_base)` once the first symbol is registered.
    bases: Option<(u32, GlobalId)>,
    local_top: u32,
}

impl LocalIdSpace {
    /// A space that has not claimed any range yet.
    #[must_use]
    pub fn new(kind: SymbolKind) -> Self {
        Self {
            kind,
            bases: None,
            local_top: 0,
        }
    }

    /// Whether the space has claimed its global range.
    #[must_use]
    pub fn is_global_base_set(&self) -> bool {
        self.bases.is_some()
    }

    /// Inclusive local range this class owns, if any.
    #[must_use]
    pub fn local_range(&self) -> Option<(u32, u32)> {
        self.bases.map(|(lb, _)| (lb, self.local_top))
    }

    /// Map a local ID inside this class's own range.
    #[must_use]
    pub fn own_local_to_global(&self, local: u32) -> Option<GlobalId> {
        let (local_base, global_base) = self.bases?;
        (local_base..=self.local_top)
            .contains(&local)
            .then(|| global_base.offset(local - local_base))
    }

    /// Map a global ID inside this class's own range.
    #[must_use]
    pub fn own_global_to_local(&self, global: GlobalId) -> Option<u32> {
        let (local_base, global_base) = self.bases?;
        let global_top = global_base.offset(self.local_top - local_base);
        (global_base..=global_top)
            .contains(&global)
            .then(|| local_base + (global.ordinal() - global_base.ordinal()))
    }

    /// Register `name` as local ID `local`, claiming the matching global ID.
    ///
    /// # Errors
    /// `LocalIdOutOfOrder`, `DuplicateLocalId`, `IdRangeCollision` or a
    /// namespace `DuplicateSymbol`.
    pub fn add_symbol(
        &mut self,
        ns: &mut GlobalNamespace,
        class: &str,
        name: &str,
        local: u32,
    ) -> Result<GlobalId> {
        let (local_base, global_base) = self
            .bases
            .unwrap_or_else(|| (local, ns.next_global_base()));

        if local < local_base {
            return Err(SchedzError::LocalIdOutOfOrder {
                class: class.to_string(),
                kind: self.kind,
                local,
                base: local_base,
            });
        }

        let global = global_base.offset(local - local_base);
        if self.own_local_to_global(local).is_some() {
            if let Some(existing) = ns.id_to_symbol(global) {
                return Err(SchedzError::DuplicateLocalId {
                    class: class.to_string(),
                    kind: self.kind,
                    local,
                    existing: existing.to_string(),
                });
            }
        }

        // Growing the range must not cover IDs another class already holds.
        let gap_start = self.bases.map_or(local, |_| self.local_top + 1);
        for gap in gap_start..local {
            let id = global_base.offset(gap - local_base);
            if let Some(owner) = ns.id_to_symbol(id) {
                return Err(SchedzError::IdRangeCollision {
                    class: class.to_string(),
                    kind: self.kind,
                    local,
                    global: id.raw(),
                    owner: owner.to_string(),
                });
            }
        }

        ns.add_symbol(name, global).map_err(|e| match e {
            SchedzError::GlobalIdTaken { id, owner, .. } => SchedzError::IdRangeCollision {
                class: class.to_string(),
                kind: self.kind,
                local,
                global: id,
                owner,
            },
            other => other,
        })?;

        match self.bases {
            Some(_) => self.local_top = self.local_top.max(local),
            None => {
                self.bases = Some((local_base, global_base));
                self.local_top = local;
            }
        }
        Ok(global)
    }
}

// ---------------------------------------------------------------------------
// Class Schedule ID Space
// ---------------------------------------------------------------------------

/// The schedule, task and condition local spaces of one class.
#[derive(Debug, Clone)]
pub struct ClassScheduleIdSpace {
    name: String,
    parent: Option<ClassId>,
    schedules: LocalIdSpace,
    tasks: LocalIdSpace,
    conditions: LocalIdSpace,
}

impl ClassScheduleIdSpace {
    fn new(name: &str, parent: Option<ClassId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            schedules: LocalIdSpace::new(SymbolKind::Schedule),
            tasks: LocalIdSpace::new(SymbolKind::Task),
            conditions: LocalIdSpace::new(SymbolKind::Condition),
        }
    }

    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent class, if any.
    #[must_use]
    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }

    /// Local space for one symbol kind.
    #[must_use]
    pub fn space(&self, kind: SymbolKind) -> &LocalIdSpace {
        match kind {
            SymbolKind::Schedule => &self.schedules,
            SymbolKind::Task => &self.tasks,
            SymbolKind::Condition => &self.conditions,
        }
    }

    fn space_mut(&mut self, kind: SymbolKind) -> &mut LocalIdSpace {
        match kind {
            SymbolKind::Schedule => &mut self.schedules,
            SymbolKind::Task => &mut self.tasks,
            SymbolKind::Condition => &mut self.conditions,
        }
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Owner of every class ID space, addressed by [`ClassId`].
#[derive(Debug, Clone, Default)]
pub struct IdSpaceArena {
    classes: Vec<ClassScheduleIdSpace>,
    by_name: HashMap<String, ClassId>,
}

impl IdSpaceArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or fetch) the ID space for `name`, chained to `parent`.
    ///
    /// # Errors
    /// `UnknownClass` if `parent` is not a handle of this arena.
    pub fn register_class(&mut self, name: &str, parent: Option<ClassId>) -> Result<ClassId> {
        if let Some(p) = parent {
            if self.classes.get(p.index()).is_none() {
                return Err(SchedzError::UnknownClass(p.to_string()));
            }
        }
        if let Some(&existing) = self.by_name.get(name) {
            return Ok(existing);
        }
        let id = ClassId(u32::try_from(self.classes.len()).map_err(|_| {
            SchedzError::Config(format!("too many classes registering {name}"))
        })?);
        self.classes.push(ClassScheduleIdSpace::new(name, parent));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Borrow a class space.
    #[must_use]
    pub fn class(&self, id: ClassId) -> Option<&ClassScheduleIdSpace> {
        self.classes.get(id.index())
    }

    /// Find a class by name.
    #[must_use]
    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Class name, or `"<unknown>"` for a stale handle.
    #[must_use]
    pub fn class_name(&self, id: ClassId) -> &str {
        self.class(id).map_or("<unknown>", ClassScheduleIdSpace::name)
    }

    /// Number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no class is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn add_symbol(
        &mut self,
        ns: &mut ScheduleNamespaces,
        class: ClassId,
        kind: SymbolKind,
        name: &str,
        local: u32,
    ) -> Result<GlobalId> {
        let space = self
            .classes
            .get_mut(class.index())
            .ok_or_else(|| SchedzError::UnknownClass(class.to_string()))?;
        let class_name = space.name.clone();
        space
            .space_mut(kind)
            .add_symbol(ns.namespace_mut(kind), &class_name, name, local)
    }

    /// Register a schedule as `local` in `class`.
    ///
    /// # Errors
    /// See [`LocalIdSpace::add_symbol`].
    pub fn add_schedule(
        &mut self,
        ns: &mut ScheduleNamespaces,
        class: ClassId,
        name: &str,
        local: u32,
    ) -> Result<GlobalId> {
        self.add_symbol(ns, class, SymbolKind::Schedule, name, local)
    }

    /// Register a task and its parameter shape as `local` in `class`.
    ///
    /// # Errors
    /// See [`LocalIdSpace::add_symbol`].
    pub fn add_task(
        &mut self,
        ns: &mut ScheduleNamespaces,
        class: ClassId,
        name: &str,
        local: u32,
        check: TaskParamCheck,
    ) -> Result<GlobalId> {
        let id = self.add_symbol(ns, class, SymbolKind::Task, name, local)?;
        ns.set_task_param_check(id, check);
        Ok(id)
    }

    /// Register a condition as `local` in `class`.
    ///
    /// # Errors
    /// `ConditionLimit` if the resulting global ID has no condition bit,
    /// otherwise see [`LocalIdSpace::add_symbol`].
    pub fn add_condition(
        &mut self,
        ns: &mut ScheduleNamespaces,
        class: ClassId,
        name: &str,
        local: u32,
    ) -> Result<GlobalId> {
        let id = self.add_symbol(ns, class, SymbolKind::Condition, name, local)?;
        ns.check_condition_room(name, id)?;
        Ok(id)
    }

    /// Map a class-local ID to its global ID, walking up the parent chain.
    #[must_use]
    pub fn local_to_global(
        &self,
        class: ClassId,
        kind: SymbolKind,
        local: u32,
    ) -> Option<GlobalId> {
        let mut cursor = Some(class);
        while let Some(c) = cursor {
            let space = self.class(c)?;
            if let Some(g) = space.space(kind).own_local_to_global(local) {
                return Some(g);
            }
            cursor = space.parent;
        }
        None
    }

    /// Map a global ID to the local number `class` sees it as.
    #[must_use]
    pub fn global_to_local(
        &self,
        class: ClassId,
        kind: SymbolKind,
        global: GlobalId,
    ) -> Option<u32> {
        let mut cursor = Some(class);
        while let Some(c) = cursor {
            let space = self.class(c)?;
            if let Some(l) = space.space(kind).own_global_to_local(global) {
                return Some(l);
            }
            cursor = space.parent;
        }
        None
    }

    /// Resolve any [`Id`] to its global form.
    #[must_use]
    pub fn resolve(&self, id: Id, kind: SymbolKind) -> Option<GlobalId> {
        match id {
            Id::Global(g) => Some(g),
            Id::Local { class, id } => self.local_to_global(class, kind, id),
        }
    }

    /// Express a global ID the way `class` refers to it.
    ///
    /// Without a class the ID stays global.
    #[must_use]
    pub fn localize(
        &self,
        class: Option<ClassId>,
        kind: SymbolKind,
        global: GlobalId,
    ) -> Option<Id> {
        match class {
            None => Some(Id::Global(global)),
            Some(c) => self
                .global_to_local(c, kind, global)
                .map(|local| Id::local(c, local)),
        }
    }

    /// Whether `class` has claimed a global schedule range.
    #[must_use]
    pub fn is_global_base_set(&self, class: ClassId) -> bool {
        self.class(class)
            .is_some_and(|c| c.space(SymbolKind::Schedule).is_global_base_set())
    }

    /// Drop every class.
    pub fn clear(&mut self) {
        self.classes.clear();
        self.by_name.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ScheduleNamespaces, IdSpaceArena) {
        (ScheduleNamespaces::new(), IdSpaceArena::new())
    }

    #[test]
    fn local_round_trip() {
        let (mut ns, mut arena) = setup();
        let base = arena.register_class("npc_base", None).expect("class");
        let g = arena
            .add_schedule(&mut ns, base, "SCHED_IDLE", 0)
            .expect("schedule");
        assert_eq!(arena.local_to_global(base, SymbolKind::Schedule, 0), Some(g));
        assert_eq!(arena.global_to_local(base, SymbolKind::Schedule, g), Some(0));
        assert_eq!(ns.schedule_symbol_to_id("SCHED_IDLE"), Some(g));
    }

    #[test]
    fn unrelated_classes_reuse_local_zero() {
        let (mut ns, mut arena) = setup();
        let a = arena.register_class("npc_a", None).expect("class");
        let b = arena.register_class("npc_b", None).expect("class");
        let ga = arena.add_task(&mut ns, a, "TASK_A", 0, TaskParamCheck::none()).expect("a");
        let gb = arena.add_task(&mut ns, b, "TASK_B", 0, TaskParamCheck::none()).expect("b");
        assert_ne!(ga, gb);
        assert_eq!(arena.local_to_global(a, SymbolKind::Task, 0), Some(ga));
        assert_eq!(arena.local_to_global(b, SymbolKind::Task, 0), Some(gb));
        assert_eq!(arena.global_to_local(a, SymbolKind::Task, gb), None);
    }

    #[test]
    fn derived_class_falls_through_to_parent() {
        let (mut ns, mut arena) = setup();
        let base = arena.register_class("npc_base", None).expect("class");
        let derived = arena.register_class("npc_derived", Some(base)).expect("class");
        let g_idle = arena.add_schedule(&mut ns, base, "SCHED_IDLE", 0).expect("idle");
        arena.add_schedule(&mut ns, base, "SCHED_FAIL", 1).expect("fail");
        let g_own = arena.add_schedule(&mut ns, derived, "SCHED_PATROL", 2).expect("own");

        assert_eq!(arena.local_to_global(derived, SymbolKind::Schedule, 0), Some(g_idle));
        assert_eq!(arena.local_to_global(derived, SymbolKind::Schedule, 2), Some(g_own));
        assert_eq!(arena.global_to_local(derived, SymbolKind::Schedule, g_idle), Some(0));
        assert_eq!(arena.local_to_global(base, SymbolKind::Schedule, 2), None);
    }

    #[test]
    fn reused_local_id_rejected() {
        let (mut ns, mut arena) = setup();
        let c = arena.register_class("npc", None).expect("class");
        arena.add_condition(&mut ns, c, "COND_A", 0).expect("a");
        let err = arena.add_condition(&mut ns, c, "COND_B", 0).expect_err("dup");
        assert!(matches!(err, SchedzError::DuplicateLocalId { .. }));
    }

    #[test]
    fn out_of_order_local_rejected() {
        let (mut ns, mut arena) = setup();
        let c = arena.register_class("npc", None).expect("class");
        arena.add_schedule(&mut ns, c, "SCHED_A", 5).expect("a");
        let err = arena.add_schedule(&mut ns, c, "SCHED_B", 4).expect_err("below base");
        assert!(matches!(err, SchedzError::LocalIdOutOfOrder { base: 5, .. }));
    }

    #[test]
    fn interleaved_registration_collides() {
        let (mut ns, mut arena) = setup();
        let a = arena.register_class("npc_a", None).expect("class");
        let b = arena.register_class("npc_b", None).expect("class");
        arena.add_schedule(&mut ns, a, "SCHED_A0", 0).expect("a0");
        arena.add_schedule(&mut ns, b, "SCHED_B0", 0).expect("b0");
        let err = arena.add_schedule(&mut ns, a, "SCHED_A1", 1).expect_err("collision");
        assert!(matches!(err, SchedzError::IdRangeCollision { .. }));
    }

    #[test]
    fn range_growth_cannot_cover_another_class() {
        let (mut ns, mut arena) = setup();
        let a = arena.register_class("npc_a", None).expect("class");
        let b = arena.register_class("npc_b", None).expect("class");
        arena.add_schedule(&mut ns, a, "SCHED_A0", 0).expect("a0");
        let gb = arena.add_schedule(&mut ns, b, "SCHED_B0", 0).expect("b0");

        let err = arena.add_schedule(&mut ns, a, "SCHED_A2", 2).expect_err("collision");
        match err {
            SchedzError::IdRangeCollision { local, global, owner, .. } => {
                assert_eq!(local, 2);
                assert_eq!(global, gb.raw());
                assert_eq!(owner, "SCHED_B0");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(arena.global_to_local(a, SymbolKind::Schedule, gb), None);
        assert_eq!(arena.local_to_global(a, SymbolKind::Schedule, 1), None);
        assert!(ns.schedule_symbol_to_id("SCHED_A2").is_none());
    }

    #[test]
    fn localize_and_resolve() {
        let (mut ns, mut arena) = setup();
        let c = arena.register_class("npc", None).expect("class");
        let g = arena.add_schedule(&mut ns, c, "SCHED_A", 3).expect("a");
        let local = arena.localize(Some(c), SymbolKind::Schedule, g).expect("visible");
        assert_eq!(local, Id::local(c, 3));
        assert_eq!(local.raw(), 3);
        assert_eq!(arena.resolve(local, SymbolKind::Schedule), Some(g));
        assert_eq!(arena.localize(None, SymbolKind::Schedule, g), Some(Id::Global(g)));
    }

    #[test]
    fn register_class_is_idempotent() {
        let mut arena = IdSpaceArena::new();
        let a = arena.register_class("npc", None).expect("class");
        let again = arena.register_class("npc", None).expect("class");
        assert_eq!(a, again);
        assert_eq!(arena.len(), 1);
        assert!(!arena.is_global_base_set(a));
    }
}
