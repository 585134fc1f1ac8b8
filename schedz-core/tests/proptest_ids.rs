//! Property-Based Tests for schedz Core
//!
//! Uses `proptest` to check the ID mapping and execution invariants under
//! random vocabularies and schedules.

use proptest::prelude::*;

use schedz_core::config::SchedzConfig;
use schedz_core::engine::{BehaviorChannels, BehaviorEngine, BehaviorModule, TaskHandlerTable};
use schedz_core::id_space::{ClassId, Id, IdSpaceArena};
use schedz_core::namespace::{GlobalId, ScheduleNamespaces, SymbolKind};
use schedz_core::schedule::ConditionBits;
use schedz_core::task::{TaskData, TaskParamCheck};
use schedz_core::types::{Activity, MemoryFlags};
use schedz_core::SchedulingContext;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_names(prefix: &'static str, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[A-Z][A-Z0-9_]{0,12}", 1..max)
        .prop_map(move |set| set.into_iter().map(|s| format!("{prefix}{s}")).collect())
}

fn arb_task_data() -> impl Strategy<Value = TaskData> {
    prop_oneof![
        Just(TaskData::None),
        any::<f32>().prop_map(TaskData::Float),
        any::<i32>().prop_map(TaskData::Int),
        any::<bool>().prop_map(TaskData::Bool),
        ".{0,20}".prop_map(TaskData::String),
        (-5i32..40).prop_map(|a| TaskData::Activity(Activity(a))),
        any::<u32>().prop_map(|m| TaskData::Memory(MemoryFlags(m))),
    ]
}

// ---------------------------------------------------------------------------
// Property: namespace lookups are mutually inverse
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn namespace_is_bijective(names in arb_names("TASK_", 40)) {
        let mut ns = ScheduleNamespaces::new();
        let mut ids = Vec::new();
        for name in &names {
            ids.push(ns.add_task(name, TaskParamCheck::none()).expect("fresh name"));
        }
        for (name, id) in names.iter().zip(&ids) {
            prop_assert_eq!(ns.task_symbol_to_id(name), Some(*id));
            prop_assert_eq!(ns.task_id_to_symbol(*id), Some(name.as_str()));
        }
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn re_adding_any_name_is_rejected(names in arb_names("SCHED_", 20)) {
        let mut ns = ScheduleNamespaces::new();
        for name in &names {
            ns.add_schedule(name).expect("fresh name");
        }
        for name in &names {
            prop_assert!(ns.add_schedule(name).is_err());
        }
    }
}

// ---------------------------------------------------------------------------
// Property: local <-> global round-trip and parent fall-through
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn local_global_round_trip(names in arb_names("SCHED_", 30), first in 0u32..20) {
        let mut ns = ScheduleNamespaces::new();
        let mut arena = IdSpaceArena::new();
        let class = arena.register_class("npc", None).expect("class");

        for (offset, name) in (0u32..).zip(&names) {
            let local = first + offset;
            let global = arena
                .add_schedule(&mut ns, class, name, local)
                .expect("in order");
            prop_assert_eq!(
                arena.local_to_global(class, SymbolKind::Schedule, local),
                Some(global)
            );
            prop_assert_eq!(
                arena.global_to_local(class, SymbolKind::Schedule, global),
                Some(local)
            );
            prop_assert_eq!(
                arena.resolve(Id::local(class, local), SymbolKind::Schedule),
                Some(global)
            );
        }
    }

    #[test]
    fn derived_class_sees_parent_mapping(base_count in 1u32..10, derived_count in 1u32..10) {
        let mut ns = ScheduleNamespaces::new();
        let mut arena = IdSpaceArena::new();
        let base = arena.register_class("npc_base", None).expect("base");
        let derived = arena.register_class("npc_derived", Some(base)).expect("derived");

        let base_ids: Vec<GlobalId> = (0..base_count)
            .map(|l| {
                arena
                    .add_task(&mut ns, base, &format!("TASK_B{l}"), l, TaskParamCheck::none())
                    .expect("base task")
            })
            .collect();
        for l in 0..derived_count {
            arena
                .add_task(
                    &mut ns,
                    derived,
                    &format!("TASK_D{l}"),
                    base_count + l,
                    TaskParamCheck::none(),
                )
                .expect("derived task");
        }

        for (l, g) in (0u32..).zip(&base_ids) {
            prop_assert_eq!(arena.local_to_global(derived, SymbolKind::Task, l), Some(*g));
            prop_assert_eq!(
                arena.local_to_global(derived, SymbolKind::Task, l),
                arena.local_to_global(base, SymbolKind::Task, l)
            );
        }
        let own = arena
            .local_to_global(derived, SymbolKind::Task, base_count)
            .expect("own task");
        prop_assert_eq!(arena.global_to_local(base, SymbolKind::Task, own), None);
    }

    #[test]
    fn sibling_classes_reuse_local_numbers(n in 1u32..8) {
        let mut ns = ScheduleNamespaces::new();
        let mut arena = IdSpaceArena::new();
        let a = arena.register_class("npc_a", None).expect("a");
        let b = arena.register_class("npc_b", None).expect("b");
        for l in 0..n {
            arena.add_condition(&mut ns, a, &format!("COND_A{l}"), l).expect("a cond");
        }
        for l in 0..n {
            arena.add_condition(&mut ns, b, &format!("COND_B{l}"), l).expect("b cond");
        }
        for l in 0..n {
            prop_assert_ne!(
                arena.local_to_global(a, SymbolKind::Condition, l),
                arena.local_to_global(b, SymbolKind::Condition, l)
            );
        }
    }

    #[test]
    fn interleaved_classes_never_see_each_other(
        steps in prop::collection::vec((any::<bool>(), 0u32..4), 1..24)
    ) {
        let mut ns = ScheduleNamespaces::new();
        let mut arena = IdSpaceArena::new();
        let classes = [
            arena.register_class("npc_a", None).expect("a"),
            arena.register_class("npc_b", None).expect("b"),
        ];
        let mut next = [0u32; 2];
        let mut owned: [Vec<GlobalId>; 2] = [Vec::new(), Vec::new()];

        for (i, (pick_b, skip)) in steps.into_iter().enumerate() {
            let who = usize::from(pick_b);
            let local = next[who] + skip;
            if let Ok(g) = arena.add_schedule(&mut ns, classes[who], &format!("SCHED_{i}"), local) {
                owned[who].push(g);
                next[who] = local + 1;
            }
        }

        for who in 0..2 {
            let other = 1 - who;
            for g in &owned[other] {
                prop_assert_eq!(
                    arena.global_to_local(classes[who], SymbolKind::Schedule, *g),
                    None
                );
            }
            for local in 0..next[who] {
                if let Some(g) = arena.local_to_global(classes[who], SymbolKind::Schedule, local) {
                    prop_assert!(!owned[other].contains(&g));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: coercions are total
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn coercions_never_panic(data in arb_task_data()) {
        let _ = data.as_float();
        let _ = data.as_int();
        let _ = data.as_bool();
        let _ = data.as_activity();
        let _ = data.as_memory();
        let _ = data.to_string();
        if !data.can_be_float() {
            prop_assert!((data.as_float() + 1.0).abs() < f32::EPSILON);
        }
        if !data.can_be_bool() {
            prop_assert!(!data.as_bool());
        }
    }

    #[test]
    fn int_strings_coerce_like_ints(n in -100_000i32..100_000) {
        let s = TaskData::String(n.to_string());
        prop_assert!(s.can_be_int());
        prop_assert_eq!(s.as_int(), n);
        prop_assert_eq!(s.as_bool(), n > 0);
    }
}

// ---------------------------------------------------------------------------
// Property: tick-bounded progress
// ---------------------------------------------------------------------------

struct Loop;

impl BehaviorModule<u32> for Loop {
    fn class(&self) -> Option<ClassId> {
        None
    }

    fn select_schedule(&self, _channel: usize, _agent: &u32) -> Option<Id> {
        None
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn instant_tasks_never_exceed_budget(
        len in 1usize..30,
        budget in 1u32..16,
        ticks in 1usize..6,
    ) {
        let mut config = SchedzConfig::default();
        config.engine.max_tasks_run = budget;
        let mut ctx = SchedulingContext::new(config);
        ctx.init();
        ctx.add_schedule("SCHED_IDLE_STAND").expect("idle");
        let instant = ctx.add_task("TASK_INSTANT", TaskParamCheck::none()).expect("task");
        let body = vec!["TASK_INSTANT"; len].join(" ");
        ctx.load_schedules("global", &format!("SCHED_IDLE_STAND {{ Tasks {{ {body} }} }}"))
            .expect("load");

        let mut table = TaskHandlerTable::new();
        table.insert_fn(
            instant,
            |cx, _| {
                *cx.agent_mut() += 1;
                cx.task_complete();
            },
            |_, _| {},
        );
        let engine = BehaviorEngine::new(&ctx, &Loop, &table);
        let mut channels = BehaviorChannels::new();
        channels.start_channel(0);
        let mut started = 0u32;

        for tick in 0..ticks {
            let before = started;
            #[allow(clippy::cast_precision_loss)]
            let now = tick as f64;
            let conditions = ConditionBits::new();
            engine.maintain_channel_schedules(&mut channels, &mut started, &conditions, now);
            prop_assert!(started - before <= budget);
            prop_assert!(started > before, "every tick makes progress");
        }
    }
}
