//! Tasks and their typed arguments.
//!
//! A [`Task`] is inert data: a task ID plus up to [`TASK_MAX_PARAMETERS`]
//! [`TaskData`] arguments. The engine dispatches on the ID; handlers read the
//! arguments through the `as_*` coercions, which never fail and fall back to
//! a sentinel when the stored kind cannot be converted.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedzError};
use crate::id_space::Id;
use crate::namespace::GlobalId;
use crate::types::{Activity, GoalType, MemoryFlags, NpcState, PathType};

/// Maximum number of arguments a task carries.
pub const TASK_MAX_PARAMETERS: usize = 5;

// ---------------------------------------------------------------------------
// Task Data
// ---------------------------------------------------------------------------

/// One typed task argument.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TaskData {
    /// No value.
    #[default]
    None,
    /// Floating point number.
    Float(f32),
    /// Integer.
    Int(i32),
    /// Boolean.
    Bool(bool),
    /// Short string.
    String(String),
    /// Activity reference.
    Activity(Activity),
    /// Task reference.
    TaskId(Id),
    /// Schedule reference.
    ScheduleId(Id),
    /// Agent state.
    NpcState(NpcState),
    /// Memory flag bits.
    Memory(MemoryFlags),
    /// Path kind.
    Path(PathType),
    /// Goal kind.
    Goal(GoalType),
}

impl TaskData {
    /// Whether [`Self::as_bool`] yields a meaningful value.
    #[must_use]
    pub fn can_be_bool(&self) -> bool {
        matches!(
            self,
            Self::Float(_)
                | Self::Int(_)
                | Self::Bool(_)
                | Self::String(_)
                | Self::Activity(_)
                | Self::NpcState(_)
        )
    }

    /// Truthiness; `false` when the kind has none.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Float(f) => *f > 0.0,
            Self::Int(i) => *i > 0,
            Self::Bool(b) => *b,
            Self::String(s) => {
                if s.eq_ignore_ascii_case("true") {
                    true
                } else if s.eq_ignore_ascii_case("false") {
                    false
                } else {
                    atoi(s) > 0
                }
            }
            Self::Activity(a) => a.is_valid(),
            Self::NpcState(s) => s.is_awake(),
            _ => false,
        }
    }

    /// Every kind has an integer form.
    #[must_use]
    pub fn can_be_int(&self) -> bool {
        true
    }

    /// Integer value; `-1` for [`TaskData::None`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn as_int(&self) -> i32 {
        match self {
            Self::None => -1,
            Self::Float(f) => *f as i32,
            Self::Int(i) => *i,
            Self::Bool(b) => i32::from(*b),
            Self::String(s) => {
                if s.eq_ignore_ascii_case("true") {
                    1
                } else if s.eq_ignore_ascii_case("false") {
                    0
                } else {
                    atoi(s)
                }
            }
            Self::Activity(a) => a.0,
            Self::TaskId(id) | Self::ScheduleId(id) => id.raw(),
            Self::NpcState(s) => *s as i32,
            Self::Memory(m) => m.0 as i32,
            Self::Path(p) => *p as i32,
            Self::Goal(g) => *g as i32,
        }
    }

    /// Whether [`Self::as_float`] yields a meaningful value.
    #[must_use]
    pub fn can_be_float(&self) -> bool {
        matches!(
            self,
            Self::None | Self::Float(_) | Self::Int(_) | Self::Bool(_) | Self::String(_)
        )
    }

    /// Float value; `-1.0` when the kind has none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> f32 {
        match self {
            Self::Float(f) => *f,
            Self::Int(i) => *i as f32,
            Self::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::String(s) => {
                if s.eq_ignore_ascii_case("true") {
                    1.0
                } else if s.eq_ignore_ascii_case("false") {
                    0.0
                } else {
                    atof(s)
                }
            }
            _ => -1.0,
        }
    }

    /// Whether [`Self::as_activity`] yields a meaningful value.
    #[must_use]
    pub fn can_be_activity(&self) -> bool {
        matches!(self, Self::Int(_) | Self::String(_) | Self::Activity(_))
    }

    /// Activity value; [`Activity::INVALID`] when the kind has none.
    #[must_use]
    pub fn as_activity(&self) -> Activity {
        match self {
            Self::Int(i) => Activity(*i),
            Self::String(s) => Activity::from_name(s),
            Self::Activity(a) => *a,
            _ => Activity::INVALID,
        }
    }

    /// String contents, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Task reference, if this is one.
    #[must_use]
    pub fn as_task_id(&self) -> Option<Id> {
        match self {
            Self::TaskId(id) => Some(*id),
            _ => None,
        }
    }

    /// Schedule reference, if this is one.
    #[must_use]
    pub fn as_schedule_id(&self) -> Option<Id> {
        match self {
            Self::ScheduleId(id) => Some(*id),
            _ => None,
        }
    }

    /// Agent state, if this is one.
    #[must_use]
    pub fn as_npc_state(&self) -> Option<NpcState> {
        match self {
            Self::NpcState(s) => Some(*s),
            _ => None,
        }
    }

    /// Memory bits; empty when this is not a memory value.
    #[must_use]
    pub fn as_memory(&self) -> MemoryFlags {
        match self {
            Self::Memory(m) => *m,
            _ => MemoryFlags::default(),
        }
    }

    /// Path kind, if this is one.
    #[must_use]
    pub fn as_path(&self) -> Option<PathType> {
        match self {
            Self::Path(p) => Some(*p),
            _ => None,
        }
    }

    /// Goal kind, if this is one.
    #[must_use]
    pub fn as_goal(&self) -> Option<GoalType> {
        match self {
            Self::Goal(g) => Some(*g),
            _ => None,
        }
    }

    /// Whether this is [`TaskData::None`].
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Leading-integer parse: optional sign then digits; `0` if there are none.
fn atoi(s: &str) -> i32 {
    let t = s.trim_start();
    let (neg, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let mut value: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = (value * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    if neg {
        value = -value;
    }
    i32::try_from(value.clamp(i64::from(i32::MIN), i64::from(i32::MAX))).unwrap_or_default()
}

/// Leading-float parse; `0.0` if no number prefix exists.
fn atof(s: &str) -> f32 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let mut seen_dot = false;
    while let Some(&b) = bytes.get(end) {
        if b.is_ascii_digit() {
            end += 1;
        } else if b == b'.' && !seen_dot {
            seen_dot = true;
            end += 1;
        } else {
            break;
        }
    }
    // Shrink until the prefix parses ("-", "." and "-." do not).
    while end > 0 {
        if let Ok(v) = t[..end].parse::<f32>() {
            return if v.is_finite() { v } else { 0.0 };
        }
        end -= 1;
    }
    0.0
}

impl fmt::Display for TaskData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("Null"),
            Self::Float(v) => write!(f, "Float:{v}"),
            Self::Int(v) => write!(f, "Int:{v}"),
            Self::Bool(v) => write!(f, "Bool:{v}"),
            Self::String(v) => write!(f, "String:\"{v}\""),
            Self::Activity(v) => write!(f, "Activity:{v}"),
            Self::TaskId(v) => write!(f, "Task:{v}"),
            Self::ScheduleId(v) => write!(f, "Schedule:{v}"),
            Self::NpcState(v) => write!(f, "State:{}", v.name()),
            Self::Memory(v) => write!(f, "Memory:{:#x}", v.0),
            Self::Path(v) => write!(f, "Path:{v:?}"),
            Self::Goal(v) => write!(f, "Goal:{v:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter Shapes
// ---------------------------------------------------------------------------

/// Declared kind of one task parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    /// Explicitly empty.
    Null,
    /// Float.
    Float,
    /// Integer.
    Int,
    /// Integer or float, decided by the literal.
    Num,
    /// Boolean.
    Bool,
    /// String.
    String,
    /// `ACT_*` activity.
    Activity,
    /// `TASK_*` reference.
    TaskId,
    /// `SCHED_*` reference.
    ScheduleId,
    /// `NPC_STATE_*` value.
    NpcState,
    /// `MEMORY_*` flag.
    Memory,
    /// `PATH_*` kind.
    Path,
    /// `GOAL_*` kind.
    Goal,
}

impl ParamKind {
    /// Whether a slot of this kind can read `data` meaningfully.
    #[must_use]
    pub fn accepts(self, data: &TaskData) -> bool {
        match self {
            Self::Null => data.is_none(),
            Self::Float => data.can_be_float(),
            Self::Int => data.can_be_int(),
            Self::Num => matches!(data, TaskData::Float(_) | TaskData::Int(_)),
            Self::Bool => data.can_be_bool(),
            Self::String => matches!(data, TaskData::String(_)),
            Self::Activity => data.can_be_activity(),
            Self::TaskId => matches!(data, TaskData::TaskId(_)),
            Self::ScheduleId => matches!(data, TaskData::ScheduleId(_)),
            Self::NpcState => matches!(data, TaskData::NpcState(_)),
            Self::Memory => matches!(data, TaskData::Memory(_)),
            Self::Path => matches!(data, TaskData::Path(_)),
            Self::Goal => matches!(data, TaskData::Goal(_)),
        }
    }
}

/// Declared parameter list of one task.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskParamCheck {
    kinds: Vec<ParamKind>,
}

impl TaskParamCheck {
    /// Build a shape from its slot kinds.
    ///
    /// # Errors
    /// `TooManyParameters` above [`TASK_MAX_PARAMETERS`].
    pub fn new(kinds: &[ParamKind]) -> Result<Self> {
        if kinds.len() > TASK_MAX_PARAMETERS {
            return Err(SchedzError::TooManyParameters {
                found: kinds.len(),
                limit: TASK_MAX_PARAMETERS,
            });
        }
        Ok(Self {
            kinds: kinds.to_vec(),
        })
    }

    /// A task without parameters.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A task with exactly one parameter.
    #[must_use]
    pub fn single(kind: ParamKind) -> Self {
        Self { kinds: vec![kind] }
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the task takes no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// All slot kinds.
    #[must_use]
    pub fn kinds(&self) -> &[ParamKind] {
        &self.kinds
    }

    /// Kind of slot `i`.
    #[must_use]
    pub fn kind(&self, i: usize) -> Option<ParamKind> {
        self.kinds.get(i).copied()
    }

    /// Whether slot `i` can hold `data`.
    #[must_use]
    pub fn accepts(&self, i: usize, data: &TaskData) -> bool {
        self.kind(i).is_some_and(|k| k.accepts(data))
    }

    /// Check a full argument list; returns a message describing the first problem.
    ///
    /// # Errors
    /// A human-readable mismatch description.
    pub fn validate(&self, args: &[TaskData]) -> std::result::Result<(), String> {
        if args.len() != self.kinds.len() {
            return Err(format!(
                "{} parameters are expected but found {}",
                self.kinds.len(),
                args.len()
            ));
        }
        for (i, (kind, arg)) in self.kinds.iter().zip(args).enumerate() {
            if !kind.accepts(arg) {
                return Err(format!("parameter {i} expects {kind:?} but found {arg}"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

static NO_DATA: TaskData = TaskData::None;

/// One schedule step: a task reference plus its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: Option<Id>,
    global: Option<GlobalId>,
    data: Vec<TaskData>,
}

impl Task {
    /// A task referenced by its global ID.
    ///
    /// # Errors
    /// `TooManyParameters` above [`TASK_MAX_PARAMETERS`].
    pub fn new(id: GlobalId, args: Vec<TaskData>) -> Result<Self> {
        Self::resolved(Id::Global(id), id, args)
    }

    /// A task as a class refers to it, with its already-resolved global ID.
    ///
    /// # Errors
    /// `TooManyParameters` above [`TASK_MAX_PARAMETERS`].
    pub fn resolved(id: Id, global: GlobalId, args: Vec<TaskData>) -> Result<Self> {
        if args.len() > TASK_MAX_PARAMETERS {
            return Err(SchedzError::TooManyParameters {
                found: args.len(),
                limit: TASK_MAX_PARAMETERS,
            });
        }
        Ok(Self {
            id: Some(id),
            global: Some(global),
            data: args,
        })
    }

    /// Stand-in for a task that could not be resolved at load time.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            id: None,
            global: None,
            data: Vec::new(),
        }
    }

    /// Task ID as authored (local for class-scoped loads).
    #[must_use]
    pub fn id(&self) -> Option<Id> {
        self.id
    }

    /// Global task ID used for handler dispatch.
    #[must_use]
    pub fn global_id(&self) -> Option<GlobalId> {
        self.global
    }

    /// Whether this is a load-time placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.global.is_none()
    }

    /// Argument `i`, or [`TaskData::None`] past the end.
    #[must_use]
    pub fn arg(&self, i: usize) -> &TaskData {
        self.data.get(i).unwrap_or(&NO_DATA)
    }

    /// All supplied arguments.
    #[must_use]
    pub fn args(&self) -> &[TaskData] {
        &self.data
    }

    /// Number of supplied arguments.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.data.len()
    }
}

// ---------------------------------------------------------------------------
// Failure & Status
// ---------------------------------------------------------------------------

/// Why a task could not proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskFailure {
    /// No target.
    NoTarget,
    /// Weapon owned by someone else.
    WeaponOwned,
    /// Weapon or item doesn't exist.
    ItemNoFind,
    /// Schedule not found.
    ScheduleNotFound,
    /// No enemy.
    NoEnemy,
    /// No back-away node.
    NoBackawayPosition,
    /// No cover.
    NoCover,
    /// No flank position.
    NoFlank,
    /// No shoot position.
    NoShoot,
    /// No route.
    NoRoute,
    /// No route: no goal.
    NoRouteGoal,
    /// No route: blocked.
    NoRouteBlocked,
    /// No route: illegal move.
    NoRouteIllegal,
    /// Couldn't walk to target.
    NoWalk,
    /// Node already locked.
    AlreadyLocked,
    /// No sound present.
    NoSound,
    /// No scent present.
    NoScent,
    /// Bad activity.
    BadActivity,
    /// No goal entity.
    NoGoal,
    /// No player.
    NoPlayer,
    /// Can't reach any nodes.
    NotReachable,
    /// No navigation network.
    NoNavMesh,
    /// Bad position to target.
    BadPosition,
    /// Route destination no longer valid.
    BadPathGoal,
    /// Stuck on top of something.
    StuckOnTop,
    /// Item has been taken.
    ItemTaken,
    /// Too frozen.
    Frozen,
    /// No handler for the task.
    Unimplemented,
    /// Free-form reason.
    Custom(Cow<'static, str>),
}

impl TaskFailure {
    const CODED: [Self; 28] = [
        Self::NoTarget,
        Self::WeaponOwned,
        Self::ItemNoFind,
        Self::ScheduleNotFound,
        Self::NoEnemy,
        Self::NoBackawayPosition,
        Self::NoCover,
        Self::NoFlank,
        Self::NoShoot,
        Self::NoRoute,
        Self::NoRouteGoal,
        Self::NoRouteBlocked,
        Self::NoRouteIllegal,
        Self::NoWalk,
        Self::AlreadyLocked,
        Self::NoSound,
        Self::NoScent,
        Self::BadActivity,
        Self::NoGoal,
        Self::NoPlayer,
        Self::NotReachable,
        Self::NoNavMesh,
        Self::BadPosition,
        Self::BadPathGoal,
        Self::StuckOnTop,
        Self::ItemTaken,
        Self::Frozen,
        Self::Unimplemented,
    ];

    /// Free-form failure with a static reason.
    #[must_use]
    pub const fn custom(reason: &'static str) -> Self {
        Self::Custom(Cow::Borrowed(reason))
    }

    /// Numeric code (1-based); `None` for custom reasons.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        Self::CODED
            .iter()
            .position(|f| f == self)
            .and_then(|i| i32::try_from(i + 1).ok())
    }

    /// Failure for a numeric code.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        let i = usize::try_from(code).ok()?.checked_sub(1)?;
        Self::CODED.get(i).cloned()
    }

    /// Human-readable reason.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::NoTarget => "No Target",
            Self::WeaponOwned => "Weapon owned by someone else",
            Self::ItemNoFind => "Weapon/Item doesn't exist",
            Self::ScheduleNotFound => "Schedule not found",
            Self::NoEnemy => "Don't have an enemy",
            Self::NoBackawayPosition => "Found no backaway node",
            Self::NoCover => "Couldn't find cover",
            Self::NoFlank => "Couldn't find flank",
            Self::NoShoot => "Couldn't find shoot position",
            Self::NoRoute => "Don't have a route",
            Self::NoRouteGoal => "Don't have a route: no goal",
            Self::NoRouteBlocked => "Don't have a route: blocked",
            Self::NoRouteIllegal => "Don't have a route: illegal move",
            Self::NoWalk => "Couldn't walk to target",
            Self::AlreadyLocked => "Node already locked",
            Self::NoSound => "No sound present",
            Self::NoScent => "No scent present",
            Self::BadActivity => "Bad activity",
            Self::NoGoal => "No goal entity",
            Self::NoPlayer => "No player",
            Self::NotReachable => "Can't reach any nodes",
            Self::NoNavMesh => "No AI Network to Use",
            Self::BadPosition => "Bad position to Target",
            Self::BadPathGoal => "Route Destination No Longer Valid",
            Self::StuckOnTop => "Stuck on top of something",
            Self::ItemTaken => "Item has been taken",
            Self::Frozen => "Too frozen",
            Self::Unimplemented => "UNIMPLEMENTED!!!!",
            Self::Custom(reason) => reason,
        }
    }

    /// Whether this is one of the route-building failures.
    #[must_use]
    pub fn is_path_failure(&self) -> bool {
        matches!(
            self,
            Self::NoRoute | Self::NoRouteGoal | Self::NoRouteBlocked | Self::NoRouteIllegal
        )
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Progress of the current task on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started yet.
    #[default]
    New,
    /// Moving and running the task body.
    RunMoveAndTask,
    /// Only the movement part is running.
    RunMove,
    /// Only the task body is running.
    RunTask,
    /// Finished.
    Complete,
}

impl TaskStatus {
    /// Whether the task has started and not finished.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::RunMoveAndTask | Self::RunMove | Self::RunTask)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_coercions() {
        assert!(TaskData::String("TRUE".into()).as_bool());
        assert!(!TaskData::String("false".into()).as_bool());
        assert!(TaskData::String("1".into()).as_bool());
        assert!(!TaskData::String("0".into()).as_bool());
        assert!(TaskData::Int(3).as_bool());
        assert!(!TaskData::Float(0.0).as_bool());
        assert!(!TaskData::None.as_bool());
        assert!(!TaskData::None.can_be_bool());
        assert!(TaskData::NpcState(NpcState::Alert).as_bool());
        assert!(!TaskData::NpcState(NpcState::Dead).as_bool());
    }

    #[test]
    fn int_coercions() {
        assert_eq!(TaskData::None.as_int(), -1);
        assert_eq!(TaskData::Float(2.9).as_int(), 2);
        assert_eq!(TaskData::Bool(true).as_int(), 1);
        assert_eq!(TaskData::String("42abc".into()).as_int(), 42);
        assert_eq!(TaskData::String("  -7".into()).as_int(), -7);
        assert_eq!(TaskData::String("abc".into()).as_int(), 0);
        assert_eq!(TaskData::NpcState(NpcState::Combat).as_int(), 3);
        let g = GlobalId::new(4);
        assert_eq!(TaskData::ScheduleId(Id::Global(g)).as_int(), g.raw());
    }

    #[test]
    fn float_coercions() {
        assert!((TaskData::None.as_float() + 1.0).abs() < f32::EPSILON);
        assert!((TaskData::Int(3).as_float() - 3.0).abs() < f32::EPSILON);
        assert!((TaskData::String("1.5s".into()).as_float() - 1.5).abs() < f32::EPSILON);
        assert!((TaskData::String("true".into()).as_float() - 1.0).abs() < f32::EPSILON);
        assert!((TaskData::String("-".into()).as_float()).abs() < f32::EPSILON);
        assert!((TaskData::String("9".repeat(40)).as_float()).abs() < f32::EPSILON);
        assert!((TaskData::Activity(Activity::IDLE).as_float() + 1.0).abs() < f32::EPSILON);
        assert!(!TaskData::Activity(Activity::IDLE).can_be_float());
    }

    #[test]
    fn activity_coercions() {
        assert_eq!(TaskData::String("ACT_IDLE".into()).as_activity(), Activity::IDLE);
        assert_eq!(TaskData::Int(1).as_activity(), Activity::IDLE);
        assert_eq!(TaskData::Bool(true).as_activity(), Activity::INVALID);
    }

    #[test]
    fn param_check_validates_arity_and_kind() {
        let check = TaskParamCheck::new(&[ParamKind::Float, ParamKind::Bool]).expect("shape");
        assert!(check.validate(&[TaskData::Float(1.0), TaskData::Bool(true)]).is_ok());
        let err = check.validate(&[TaskData::Float(1.0)]).expect_err("arity");
        assert_eq!(err, "2 parameters are expected but found 1");
        assert!(check.validate(&[TaskData::Float(1.0), TaskData::None]).is_err());

        let too_many = [ParamKind::Int; TASK_MAX_PARAMETERS + 1];
        assert!(matches!(
            TaskParamCheck::new(&too_many),
            Err(SchedzError::TooManyParameters { found: 6, limit: 5 })
        ));
    }

    #[test]
    fn task_args_past_end_are_none() {
        let task = Task::new(GlobalId::new(0), vec![TaskData::Float(2.0)]).expect("task");
        assert_eq!(task.arity(), 1);
        assert_eq!(task.arg(3), &TaskData::None);
        assert!(!task.is_placeholder());
        assert!(Task::placeholder().is_placeholder());
    }

    #[test]
    fn failure_codes_round_trip() {
        assert_eq!(TaskFailure::NoTarget.code(), Some(1));
        assert_eq!(TaskFailure::Unimplemented.code(), Some(28));
        assert_eq!(TaskFailure::from_code(10), Some(TaskFailure::NoRoute));
        assert_eq!(TaskFailure::from_code(0), None);
        assert_eq!(TaskFailure::custom("stuck").code(), None);
        assert_eq!(TaskFailure::custom("stuck").to_string(), "stuck");
        assert!(TaskFailure::NoRouteBlocked.is_path_failure());
        assert!(!TaskFailure::NoWalk.is_path_failure());
    }

    #[test]
    fn status_running() {
        assert!(TaskStatus::RunMove.is_running());
        assert!(!TaskStatus::New.is_running());
        assert!(!TaskStatus::Complete.is_running());
    }
}
