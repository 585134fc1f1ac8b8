//! The process-wide set of loaded schedules.
//!
//! Schedules are stored behind `Arc` so channels can hold the one they are
//! running without borrowing the repository. Any change to the stored set
//! bumps the load signature; channels compare signatures and re-fetch their
//! schedule by ID when it moved.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::metrics::spans;
use crate::namespace::GlobalId;
use crate::parser::{parse_schedules, LoadReport, ParseContext, ParsedSchedule};
use crate::schedule::Schedule;

/// Owner of every loaded [`Schedule`], keyed by global ID.
#[derive(Debug, Clone, Default)]
pub struct ScheduleRepository {
    schedules: HashMap<GlobalId, Arc<Schedule>>,
    by_name: HashMap<String, GlobalId>,
    order: Vec<GlobalId>,
    load_signature: u64,
    fallback: Option<GlobalId>,
}

impl ScheduleRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source` and merge every definition it contains.
    ///
    /// A name seen before gets the new tasks appended and the interrupt
    /// masks unioned. In strict mode nothing is merged unless the whole
    /// source is clean.
    ///
    /// # Errors
    /// `ScheduleLoad` in strict mode; see [`parse_schedules`].
    pub fn load_schedules(&mut self, source: &str, cx: ParseContext<'_>) -> Result<LoadReport> {
        let _span = tracing::info_span!(spans::LOAD_SCHEDULES, class = cx.class_name).entered();

        let output = parse_schedules(source, cx)?;
        let report = LoadReport {
            class: cx.class_name.to_string(),
            schedules: output.schedules.len(),
            tasks: output.schedules.iter().map(|s| s.tasks.len()).sum(),
            diagnostics: output.diagnostics,
        };
        for parsed in output.schedules {
            self.merge(parsed);
        }
        if report.schedules > 0 {
            self.load_signature += 1;
        }

        info!(
            class = cx.class_name,
            schedules = report.schedules,
            tasks = report.tasks,
            diagnostics = report.diagnostics.len(),
            "Loaded schedules"
        );
        Ok(report)
    }

    /// Read a file and pass it to [`Self::load_schedules`].
    ///
    /// # Errors
    /// I/O errors, plus everything [`Self::load_schedules`] returns.
    pub fn load_schedules_from_file(
        &mut self,
        path: &Path,
        cx: ParseContext<'_>,
    ) -> Result<LoadReport> {
        let source = std::fs::read_to_string(path)?;
        self.load_schedules(&source, cx)
    }

    fn merge(&mut self, parsed: ParsedSchedule) {
        let ParsedSchedule {
            name,
            id,
            tasks,
            interrupts,
            patched,
            ..
        } = parsed;

        let entry = self.schedules.entry(id).or_insert_with(|| {
            self.order.push(id);
            self.by_name.insert(name.clone(), id);
            Arc::new(Schedule::new(name.clone(), id))
        });
        let schedule = Arc::make_mut(entry);
        let appended = !schedule.tasks().is_empty();
        for task in tasks {
            schedule.push_task(task);
        }
        schedule.merge_interrupts(&interrupts);
        if patched {
            schedule.mark_invalid();
        }
        if appended {
            debug!(schedule = %name, tasks = schedule.num_tasks(), "Appended to existing schedule");
        }
    }

    /// Look a schedule up by ID.
    ///
    /// A miss is logged and answered with the fallback schedule, if one is
    /// set and loaded.
    #[must_use]
    pub fn get_schedule_from_id(&self, id: GlobalId) -> Option<Arc<Schedule>> {
        if let Some(s) = self.schedules.get(&id) {
            return Some(Arc::clone(s));
        }
        warn!(schedule = %id, "Couldn't find schedule");
        self.fallback
            .filter(|f| *f != id)
            .and_then(|f| self.schedules.get(&f))
            .map(Arc::clone)
    }

    /// Look a schedule up by name.
    #[must_use]
    pub fn get_schedule_by_name(&self, name: &str) -> Option<Arc<Schedule>> {
        self.by_name
            .get(name)
            .and_then(|id| self.schedules.get(id))
            .map(Arc::clone)
    }

    /// Quiet lookup: no logging, no fallback.
    #[must_use]
    pub fn get(&self, id: GlobalId) -> Option<&Arc<Schedule>> {
        self.schedules.get(&id)
    }

    /// Whether a schedule with this ID is loaded.
    #[must_use]
    pub fn contains(&self, id: GlobalId) -> bool {
        self.schedules.contains_key(&id)
    }

    /// Drop every schedule. Outstanding `Arc`s stay alive but are stale.
    pub fn delete_all_schedules(&mut self) {
        let _span = tracing::info_span!(spans::DELETE_SCHEDULES).entered();
        let count = self.schedules.len();
        self.schedules.clear();
        self.by_name.clear();
        self.order.clear();
        self.load_signature += 1;
        info!(count, "Deleted all schedules");
    }

    /// Changes whenever the stored set changes.
    #[must_use]
    pub fn load_signature(&self) -> u64 {
        self.load_signature
    }

    /// Schedule answered for lookups that miss.
    pub fn set_fallback_schedule(&mut self, id: Option<GlobalId>) {
        self.fallback = id;
    }

    /// Current fallback schedule ID.
    #[must_use]
    pub fn fallback_schedule(&self) -> Option<GlobalId> {
        self.fallback
    }

    /// Number of schedules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    /// Whether nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Schedules in first-load order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Schedule>> + '_ {
        self.order.iter().filter_map(|id| self.schedules.get(id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoaderConfig;
    use crate::id_space::IdSpaceArena;
    use crate::namespace::ScheduleNamespaces;
    use crate::task::{ParamKind, TaskParamCheck};

    fn namespaces() -> ScheduleNamespaces {
        let mut ns = ScheduleNamespaces::new();
        ns.add_schedule("SCHED_IDLE").expect("schedule");
        ns.add_schedule("SCHED_X").expect("schedule");
        ns.add_task("TASK_STOP", TaskParamCheck::none()).expect("task");
        ns.add_task("TASK_WAIT", TaskParamCheck::single(ParamKind::Float))
            .expect("task");
        ns.add_condition("COND_A").expect("cond");
        ns.add_condition("COND_B").expect("cond");
        ns
    }

    fn cx<'a>(
        ns: &'a ScheduleNamespaces,
        arena: &'a IdSpaceArena,
        limits: &'a LoaderConfig,
        strict: bool,
    ) -> ParseContext<'a> {
        ParseContext {
            class_name: "test",
            class: None,
            namespaces: ns,
            classes: arena,
            limits,
            strict,
        }
    }

    #[test]
    fn additive_load_appends_and_unions() {
        let ns = namespaces();
        let arena = IdSpaceArena::new();
        let limits = LoaderConfig::default();
        let mut repo = ScheduleRepository::new();

        repo.load_schedules(
            "SCHED_X { Tasks { TASK_STOP TASK_WAIT 1 } Interrupts { COND_A } }",
            cx(&ns, &arena, &limits, true),
        )
        .expect("first");
        let before = repo.get_schedule_by_name("SCHED_X").expect("loaded");
        repo.load_schedules(
            "SCHED_X { Tasks { TASK_STOP } Interrupts { COND_B } }",
            cx(&ns, &arena, &limits, true),
        )
        .expect("second");

        let x = repo.get_schedule_by_name("SCHED_X").expect("loaded");
        assert_eq!(repo.len(), 1);
        assert_eq!(x.num_tasks(), 3);
        assert_eq!(x.interrupt_mask().count(), 2);
        // Earlier handles keep the old contents.
        assert_eq!(before.num_tasks(), 2);
    }

    #[test]
    fn strict_failure_merges_nothing() {
        let ns = namespaces();
        let arena = IdSpaceArena::new();
        let limits = LoaderConfig::default();
        let mut repo = ScheduleRepository::new();
        let sig = repo.load_signature();
        let err = repo.load_schedules(
            "SCHED_IDLE { Tasks { TASK_STOP } } SCHED_X { Tasks { TASK_NOPE } }",
            cx(&ns, &arena, &limits, true),
        );
        assert!(err.is_err());
        assert!(repo.is_empty());
        assert_eq!(repo.load_signature(), sig);
    }

    #[test]
    fn tolerant_load_marks_patched_schedules_invalid() {
        let ns = namespaces();
        let arena = IdSpaceArena::new();
        let limits = LoaderConfig::default();
        let mut repo = ScheduleRepository::new();
        let report = repo
            .load_schedules(
                "SCHED_IDLE { Tasks { TASK_STOP } } SCHED_X { Tasks { TASK_NOPE TASK_STOP } }",
                cx(&ns, &arena, &limits, false),
            )
            .expect("tolerant");
        assert_eq!(report.schedules, 2);
        assert_eq!(report.tasks, 3);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(repo.get_schedule_by_name("SCHED_IDLE").expect("idle").is_valid());
        assert!(!repo.get_schedule_by_name("SCHED_X").expect("x").is_valid());
    }

    #[test]
    fn missing_id_falls_back_and_delete_bumps_signature() {
        let ns = namespaces();
        let arena = IdSpaceArena::new();
        let limits = LoaderConfig::default();
        let mut repo = ScheduleRepository::new();
        repo.load_schedules("SCHED_IDLE { Tasks { TASK_STOP } }", cx(&ns, &arena, &limits, true))
            .expect("load");
        let idle = ns.schedule_symbol_to_id("SCHED_IDLE").expect("idle");
        let x = ns.schedule_symbol_to_id("SCHED_X").expect("x");

        assert!(repo.get_schedule_from_id(x).is_none());
        repo.set_fallback_schedule(Some(idle));
        assert_eq!(repo.get_schedule_from_id(x).map(|s| s.id()), Some(idle));

        let sig = repo.load_signature();
        repo.delete_all_schedules();
        assert!(repo.is_empty());
        assert!(repo.get_schedule_from_id(idle).is_none());
        assert_ne!(repo.load_signature(), sig);
    }

    #[test]
    fn loads_from_file() {
        let ns = namespaces();
        let arena = IdSpaceArena::new();
        let limits = LoaderConfig::default();
        let mut repo = ScheduleRepository::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("idle.sched");
        std::fs::write(&path, "SCHED_IDLE { Tasks { TASK_WAIT 0.5 } }").expect("write");
        repo.load_schedules_from_file(&path, cx(&ns, &arena, &limits, true))
            .expect("load");
        assert_eq!(repo.iter().count(), 1);
        assert!(repo
            .load_schedules_from_file(&dir.path().join("missing"), cx(&ns, &arena, &limits, true))
            .is_err());
    }
}
