//! Engine counters and tick timing.
//!
//! Counters are plain `AtomicU64`s bumped on the hot path and read when a
//! dashboard or the sim binary asks for a snapshot. Tick timings go through a
//! small ring buffer behind a `parking_lot::Mutex`, which is only contended
//! when percentiles are read.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Engine Counters
// ---------------------------------------------------------------------------

/// Names one of the [`EngineCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// See [`EngineCounters::schedules_selected`].
    SchedulesSelected,
    /// See [`EngineCounters::fail_schedules_selected`].
    FailSchedulesSelected,
    /// See [`EngineCounters::interrupts`].
    Interrupts,
    /// See [`EngineCounters::tasks_started`].
    TasksStarted,
    /// See [`EngineCounters::tasks_completed`].
    TasksCompleted,
    /// See [`EngineCounters::tasks_failed`].
    TasksFailed,
    /// See [`EngineCounters::budget_exhausted`].
    BudgetExhausted,
    /// See [`EngineCounters::fallback_to_idle`].
    FallbackToIdle,
    /// See [`EngineCounters::schedules_loaded`].
    SchedulesLoaded,
    /// See [`EngineCounters::load_diagnostics`].
    LoadDiagnostics,
}

/// Monotonic counters for schedule engine events.
#[derive(Debug)]
pub struct EngineCounters {
    /// Schedules installed through normal (ideal) selection.
    pub schedules_selected: AtomicU64,
    /// Schedules installed in response to a task failure.
    pub fail_schedules_selected: AtomicU64,
    /// Schedules abandoned because an interrupt condition fired.
    pub interrupts: AtomicU64,
    /// Task `start` calls.
    pub tasks_started: AtomicU64,
    /// Tasks that reported completion.
    pub tasks_completed: AtomicU64,
    /// Tasks that reported failure.
    pub tasks_failed: AtomicU64,
    /// Channel ticks that used up the task budget.
    pub budget_exhausted: AtomicU64,
    /// Times a channel fell back to the idle schedule.
    pub fallback_to_idle: AtomicU64,
    /// Schedule definitions loaded (including additive merges).
    pub schedules_loaded: AtomicU64,
    /// Tolerated authoring problems seen while loading.
    pub load_diagnostics: AtomicU64,
}

impl EngineCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            schedules_selected: AtomicU64::new(0),
            fail_schedules_selected: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            tasks_started: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            budget_exhausted: AtomicU64::new(0),
            fallback_to_idle: AtomicU64::new(0),
            schedules_loaded: AtomicU64::new(0),
            load_diagnostics: AtomicU64::new(0),
        }
    }

    fn slot(&self, which: Counter) -> &AtomicU64 {
        match which {
            Counter::SchedulesSelected => &self.schedules_selected,
            Counter::FailSchedulesSelected => &self.fail_schedules_selected,
            Counter::Interrupts => &self.interrupts,
            Counter::TasksStarted => &self.tasks_started,
            Counter::TasksCompleted => &self.tasks_completed,
            Counter::TasksFailed => &self.tasks_failed,
            Counter::BudgetExhausted => &self.budget_exhausted,
            Counter::FallbackToIdle => &self.fallback_to_idle,
            Counter::SchedulesLoaded => &self.schedules_loaded,
            Counter::LoadDiagnostics => &self.load_diagnostics,
        }
    }

    /// Add one.
    pub fn incr(&self, which: Counter) {
        self.add(which, 1);
    }

    /// Add `n`.
    pub fn add(&self, which: Counter, n: u64) {
        self.slot(which).fetch_add(n, Ordering::Relaxed);
    }

    /// Copy every counter out.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            schedules_selected: get(&self.schedules_selected),
            fail_schedules_selected: get(&self.fail_schedules_selected),
            interrupts: get(&self.interrupts),
            tasks_started: get(&self.tasks_started),
            tasks_completed: get(&self.tasks_completed),
            tasks_failed: get(&self.tasks_failed),
            budget_exhausted: get(&self.budget_exhausted),
            fallback_to_idle: get(&self.fallback_to_idle),
            schedules_loaded: get(&self.schedules_loaded),
            load_diagnostics: get(&self.load_diagnostics),
        }
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Ideal schedules installed.
    pub schedules_selected: u64,
    /// Fail schedules installed.
    pub fail_schedules_selected: u64,
    /// Interrupted schedules.
    pub interrupts: u64,
    /// Tasks started.
    pub tasks_started: u64,
    /// Tasks completed.
    pub tasks_completed: u64,
    /// Tasks failed.
    pub tasks_failed: u64,
    /// Budget-exhausted channel ticks.
    pub budget_exhausted: u64,
    /// Idle fallbacks.
    pub fallback_to_idle: u64,
    /// Schedule definitions loaded.
    pub schedules_loaded: u64,
    /// Load diagnostics.
    pub load_diagnostics: u64,
}

impl CounterSnapshot {
    /// Prometheus text exposition.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 10] = [
            (
                "schedz_schedules_selected_total",
                "Ideal schedules installed",
                self.schedules_selected,
            ),
            (
                "schedz_fail_schedules_selected_total",
                "Fail schedules installed",
                self.fail_schedules_selected,
            ),
            (
                "schedz_interrupts_total",
                "Schedules abandoned on an interrupt condition",
                self.interrupts,
            ),
            ("schedz_tasks_started_total", "Tasks started", self.tasks_started),
            ("schedz_tasks_completed_total", "Tasks completed", self.tasks_completed),
            ("schedz_tasks_failed_total", "Tasks failed", self.tasks_failed),
            (
                "schedz_budget_exhausted_total",
                "Channel ticks that hit the task budget",
                self.budget_exhausted,
            ),
            (
                "schedz_fallback_to_idle_total",
                "Channels forced onto the idle schedule",
                self.fallback_to_idle,
            ),
            ("schedz_schedules_loaded_total", "Schedule definitions loaded", self.schedules_loaded),
            (
                "schedz_load_diagnostics_total",
                "Tolerated schedule authoring problems",
                self.load_diagnostics,
            ),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tick Budget Monitor
// ---------------------------------------------------------------------------

const HISTORY_LEN: usize = 256;

/// Wall-time tracker for whole simulation ticks.
pub struct TickBudgetMonitor {
    budget_ms: f64,
    history: Mutex<TickHistory>,
}

struct TickHistory {
    timings: [f64; HISTORY_LEN],
    next: usize,
    count: u64,
    last_over_budget: bool,
}

impl TickBudgetMonitor {
    /// Monitor with a per-tick budget in milliseconds.
    #[must_use]
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            history: Mutex::new(TickHistory {
                timings: [0.0; HISTORY_LEN],
                next: 0,
                count: 0,
                last_over_budget: false,
            }),
        }
    }

    /// Start timing a tick; the elapsed time is recorded when the guard drops.
    pub fn begin_tick(&self) -> TickGuard<'_> {
        TickGuard {
            monitor: self,
            start: Instant::now(),
        }
    }

    /// Record one tick's duration.
    pub fn record(&self, ms: f64) {
        let mut h = self.history.lock();
        let slot = h.next;
        h.timings[slot] = ms;
        h.next = (slot + 1) % HISTORY_LEN;
        h.count += 1;
        h.last_over_budget = ms > self.budget_ms;
    }

    /// Duration of the most recent tick, `0.0` before any.
    #[must_use]
    pub fn last_tick_ms(&self) -> f64 {
        let h = self.history.lock();
        if h.count == 0 {
            return 0.0;
        }
        h.timings[(h.next + HISTORY_LEN - 1) % HISTORY_LEN]
    }

    /// Whether the most recent tick went over budget.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.history.lock().last_over_budget
    }

    /// Percentiles over the retained history.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn percentiles(&self) -> TickPercentiles {
        let h = self.history.lock();
        let n = usize::try_from(h.count).map_or(HISTORY_LEN, |c| c.min(HISTORY_LEN));
        if n == 0 {
            return TickPercentiles::default();
        }
        let mut sorted = h.timings[..n].to_vec();
        drop(h);
        sorted.sort_by(f64::total_cmp);

        let at = |q: f64| sorted[((n as f64 * q) as usize).min(n - 1)];
        let over = sorted.iter().filter(|t| **t > self.budget_ms).count();
        TickPercentiles {
            p50: at(0.50),
            p95: at(0.95),
            p99: at(0.99),
            max: sorted[n - 1],
            over_budget_ratio: over as f64 / n as f64,
        }
    }

    /// Ticks recorded since creation.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.history.lock().count
    }

    /// Configured budget.
    #[must_use]
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}

/// Records elapsed time into its monitor on drop.
pub struct TickGuard<'a> {
    monitor: &'a TickBudgetMonitor,
    start: Instant,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.monitor.record(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

/// Tick timing distribution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickPercentiles {
    /// Median (ms).
    pub p50: f64,
    /// 95th percentile (ms).
    pub p95: f64,
    /// 99th percentile (ms).
    pub p99: f64,
    /// Slowest retained tick (ms).
    pub max: f64,
    /// Share of ticks over budget, 0.0 to 1.0.
    pub over_budget_ratio: f64,
}

impl TickPercentiles {
    /// One-line summary.
    #[must_use]
    pub fn summary(&self, budget_ms: f64) -> String {
        format!(
            "p50={:.3}ms p95={:.3}ms p99={:.3}ms max={:.3}ms budget={budget_ms:.1}ms over={:.1}%",
            self.p50,
            self.p95,
            self.p99,
            self.max,
            self.over_budget_ratio * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Span Names
// ---------------------------------------------------------------------------

/// Span names passed to `tracing::span!`.
pub mod spans {
    /// One simulation tick over every agent.
    pub const TICK: &str = "schedz::tick";
    /// One channel's schedule maintenance.
    pub const MAINTAIN_SCHEDULE: &str = "schedz::engine::maintain";
    /// Schedule text load.
    pub const LOAD_SCHEDULES: &str = "schedz::repository::load";
    /// Repository teardown.
    pub const DELETE_SCHEDULES: &str = "schedz::repository::delete";
    /// Condition gathering for one agent.
    pub const GATHER_CONDITIONS: &str = "schedz::conditions";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
