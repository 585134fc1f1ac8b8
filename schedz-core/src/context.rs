//! The scheduling context: every piece of process-wide schedule state in one
//! owned value with an explicit lifecycle.
//!
//! Vocabularies (namespaces and class ID spaces) are registered once when the
//! behavior classes come up. Schedules are loaded per level and torn down with
//! [`SchedulingContext::clear`].

use std::path::Path;

use tracing::info;

use crate::config::SchedzConfig;
use crate::error::{Result, SchedzError};
use crate::id_space::{ClassId, Id, IdSpaceArena};
use crate::metrics::{Counter, EngineCounters};
use crate::namespace::{GlobalId, ScheduleNamespaces, SymbolKind};
use crate::parser::{LoadReport, ParseContext};
use crate::repository::ScheduleRepository;
use crate::task::TaskParamCheck;

/// Namespaces, class ID spaces, loaded schedules, configuration and counters.
#[derive(Debug, Default)]
pub struct SchedulingContext {
    namespaces: ScheduleNamespaces,
    classes: IdSpaceArena,
    repository: ScheduleRepository,
    config: SchedzConfig,
    counters: EngineCounters,
    initialized: bool,
}

impl SchedulingContext {
    /// Create an uninitialized context.
    #[must_use]
    pub fn new(config: SchedzConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Reset every registry and mark the context ready for registration.
    pub fn init(&mut self) {
        self.namespaces.clear();
        self.classes.clear();
        self.repository = ScheduleRepository::new();
        self.initialized = true;
        info!("Scheduling context initialized");
    }

    /// Level teardown: drop every loaded schedule, keep the vocabularies.
    pub fn clear(&mut self) {
        self.repository.delete_all_schedules();
    }

    /// Whether [`Self::init`] has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SchedzError::Config(
                "scheduling context used before init()".to_string(),
            ))
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Global namespaces.
    #[must_use]
    pub fn namespaces(&self) -> &ScheduleNamespaces {
        &self.namespaces
    }

    /// Class ID spaces.
    #[must_use]
    pub fn classes(&self) -> &IdSpaceArena {
        &self.classes
    }

    /// Loaded schedules.
    #[must_use]
    pub fn repository(&self) -> &ScheduleRepository {
        &self.repository
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &SchedzConfig {
        &self.config
    }

    /// Engine counters.
    #[must_use]
    pub fn counters(&self) -> &EngineCounters {
        &self.counters
    }

    /// Count an event when metrics are enabled.
    pub fn record(&self, which: Counter) {
        if self.config.telemetry.metrics_enabled {
            self.counters.incr(which);
        }
    }

    // -- registration -------------------------------------------------------

    /// Register a class ID space, optionally chained to a parent by name.
    ///
    /// # Errors
    /// `UnknownClass` for an unregistered parent; `Config` before `init()`.
    pub fn register_class(&mut self, name: &str, parent: Option<&str>) -> Result<ClassId> {
        self.ensure_initialized()?;
        let parent = parent
            .map(|p| {
                self.classes
                    .class_by_name(p)
                    .ok_or_else(|| SchedzError::UnknownClass(p.to_string()))
            })
            .transpose()?;
        self.classes.register_class(name, parent)
    }

    /// Register a schedule name shared by every class.
    ///
    /// # Errors
    /// Namespace registration errors; `Config` before `init()`.
    pub fn add_schedule(&mut self, name: &str) -> Result<GlobalId> {
        self.ensure_initialized()?;
        self.namespaces.add_schedule(name)
    }

    /// Register a task shared by every class.
    ///
    /// # Errors
    /// Namespace registration errors; `Config` before `init()`.
    pub fn add_task(&mut self, name: &str, check: TaskParamCheck) -> Result<GlobalId> {
        self.ensure_initialized()?;
        self.namespaces.add_task(name, check)
    }

    /// Register a condition shared by every class.
    ///
    /// # Errors
    /// Namespace registration errors; `Config` before `init()`.
    pub fn add_condition(&mut self, name: &str) -> Result<GlobalId> {
        self.ensure_initialized()?;
        self.namespaces.add_condition(name)
    }

    /// Register a schedule local to `class`.
    ///
    /// # Errors
    /// See [`IdSpaceArena::add_schedule`].
    pub fn add_class_schedule(
        &mut self,
        class: ClassId,
        name: &str,
        local: u32,
    ) -> Result<GlobalId> {
        self.ensure_initialized()?;
        self.classes.add_schedule(&mut self.namespaces, class, name, local)
    }

    /// Register a task local to `class`.
    ///
    /// # Errors
    /// See [`IdSpaceArena::add_task`].
    pub fn add_class_task(
        &mut self,
        class: ClassId,
        name: &str,
        local: u32,
        check: TaskParamCheck,
    ) -> Result<GlobalId> {
        self.ensure_initialized()?;
        self.classes.add_task(&mut self.namespaces, class, name, local, check)
    }

    /// Register a condition local to `class`.
    ///
    /// # Errors
    /// See [`IdSpaceArena::add_condition`].
    pub fn add_class_condition(
        &mut self,
        class: ClassId,
        name: &str,
        local: u32,
    ) -> Result<GlobalId> {
        self.ensure_initialized()?;
        self.classes.add_condition(&mut self.namespaces, class, name, local)
    }

    // -- loading ------------------------------------------------------------

    /// Load schedule text for a class, honoring `loader.strict`.
    ///
    /// A class name with no registered ID space loads against the global
    /// namespaces.
    ///
    /// # Errors
    /// See [`ScheduleRepository::load_schedules`]; `Config` before `init()`.
    pub fn load_schedules(&mut self, class_name: &str, source: &str) -> Result<LoadReport> {
        let strict = self.config.loader.strict;
        self.load_schedules_with(class_name, source, strict)
    }

    /// Load schedule text with an explicit strictness.
    ///
    /// # Errors
    /// See [`Self::load_schedules`].
    pub fn load_schedules_with(
        &mut self,
        class_name: &str,
        source: &str,
        strict: bool,
    ) -> Result<LoadReport> {
        self.ensure_initialized()?;
        let cx = ParseContext {
            class_name,
            class: self.classes.class_by_name(class_name),
            namespaces: &self.namespaces,
            classes: &self.classes,
            limits: &self.config.loader,
            strict,
        };
        let report = self.repository.load_schedules(source, cx)?;
        self.after_load(&report);
        Ok(report)
    }

    /// Load a schedule file for a class, honoring `loader.strict`.
    ///
    /// # Errors
    /// I/O errors plus everything [`Self::load_schedules`] returns.
    pub fn load_schedules_from_file(
        &mut self,
        class_name: &str,
        path: &Path,
    ) -> Result<LoadReport> {
        self.ensure_initialized()?;
        let cx = ParseContext {
            class_name,
            class: self.classes.class_by_name(class_name),
            namespaces: &self.namespaces,
            classes: &self.classes,
            limits: &self.config.loader,
            strict: self.config.loader.strict,
        };
        let report = self.repository.load_schedules_from_file(path, cx)?;
        self.after_load(&report);
        Ok(report)
    }

    fn after_load(&mut self, report: &LoadReport) {
        self.counters
            .add(Counter::SchedulesLoaded, report.schedules as u64);
        self.counters
            .add(Counter::LoadDiagnostics, report.diagnostics.len() as u64);
        let idle = self.idle_schedule_id();
        self.repository.set_fallback_schedule(idle);
    }

    // -- lookups ------------------------------------------------------------

    /// ID of the configured idle schedule.
    #[must_use]
    pub fn idle_schedule_id(&self) -> Option<GlobalId> {
        self.namespaces
            .schedule_symbol_to_id(&self.config.engine.idle_schedule)
    }

    /// ID of the configured generic fail schedule.
    #[must_use]
    pub fn fail_schedule_id(&self) -> Option<GlobalId> {
        self.namespaces
            .schedule_symbol_to_id(&self.config.engine.fail_schedule)
    }

    /// Resolve any schedule reference to its global ID.
    #[must_use]
    pub fn resolve_schedule(&self, id: Id) -> Option<GlobalId> {
        self.classes.resolve(id, SymbolKind::Schedule)
    }

    /// Schedule ID by name, as `class` refers to it.
    #[must_use]
    pub fn schedule_id(&self, class: Option<ClassId>, name: &str) -> Option<Id> {
        let global = self.namespaces.schedule_symbol_to_id(name)?;
        self.classes.localize(class, SymbolKind::Schedule, global)
    }

    /// Schedule name for logging.
    #[must_use]
    pub fn schedule_name(&self, id: GlobalId) -> &str {
        self.namespaces.schedule_id_to_symbol(id).unwrap_or("<unknown>")
    }

    /// Task name for logging.
    #[must_use]
    pub fn task_name(&self, id: GlobalId) -> &str {
        self.namespaces.task_id_to_symbol(id).unwrap_or("<unknown>")
    }

    /// Condition name for logging.
    #[must_use]
    pub fn condition_name(&self, id: GlobalId) -> &str {
        self.namespaces.condition_id_to_symbol(id).unwrap_or("<unknown>")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
