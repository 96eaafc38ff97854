//! End-to-end synthesis tests over the toy engine.
//!
//! Tests cover plan search, probe verification, result assembly and budgets.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Duration;

use pathsynth::config::Settings;
use pathsynth::expr::{Constraint, Value, Variable};
use pathsynth::model::{Model, ModelArena, ModelId};
use pathsynth::synthesis::{partition, SynthesisStats, Synthesizer};
use pathsynth::test_support::{shared_solver, FooFixture};
use pathsynth::types::Ty;

fn synthesizer(settings: Rc<Settings>, fixture: &FooFixture) -> Synthesizer {
    Synthesizer::new(settings, shared_solver(), fixture.engine.catalog())
}

fn render(result: &pathsynth::synthesis::SynthesisResult, root: usize) -> Option<String> {
    result.models[root].map(|id| result.arena.render(id))
}

// ─── Plans ─────────────────────────────────────────────────────────────────────

#[test]
fn object_with_private_field_built_through_setter() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let root = fixture.target(&mut arena, "p", 5);
    let targets = Rc::new(arena);

    let mut synthesizer = synthesizer(Rc::new(Settings::default()), &fixture);
    let result = synthesizer.synthesize(&mut fixture.engine, &targets, &[root]);

    assert!(result.is_complete());
    assert_eq!(render(&result, 0).as_deref(), Some("Foo.<init>(); Foo.setX(5)"));
    assert!(matches!(result.model(0), Some(Model::Assemble { .. })));
    assert_eq!(synthesizer.stats(), SynthesisStats { attempts: 1, successes: 1 });
}

#[test]
fn constructor_alone_suffices_for_default_state() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let root = fixture.target(&mut arena, "p", 0);
    let targets = Rc::new(arena);

    let mut synthesizer = synthesizer(Rc::new(Settings::default()), &fixture);
    let result = synthesizer.synthesize(&mut fixture.engine, &targets, &[root]);

    assert_eq!(render(&result, 0).as_deref(), Some("Foo.<init>()"));
}

#[test]
fn null_and_primitive_targets() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let null = arena.alloc(Model::Null {
        variable: Variable::param("n", Ty::Object(fixture.class.clone())),
    });
    let v = Variable::param("v", Ty::Int);
    let primitive = arena.alloc(Model::Primitive {
        variable: v.clone(),
        concrete: Value::int(0),
        constraints: BTreeSet::from([Constraint::eq(v, Variable::int(7))]),
    });
    let targets = Rc::new(arena);

    let mut synthesizer = synthesizer(Rc::new(Settings::default()), &fixture);
    let result = synthesizer.synthesize(&mut fixture.engine, &targets, &[null, primitive]);

    assert_eq!(render(&result, 0).as_deref(), Some("null"));
    assert_eq!(render(&result, 1).as_deref(), Some("7"));
    assert_eq!(synthesizer.stats(), SynthesisStats { attempts: 2, successes: 2 });
}

#[test]
fn alias_of_a_root_shares_its_model() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let a = fixture.target(&mut arena, "a", 3);
    let b = arena.alloc(Model::ReferenceTo {
        variable: Variable::param("b", Ty::Object(fixture.class.clone())),
        target: a,
    });
    let targets = Rc::new(arena);
    assert_eq!(partition(&targets, &[a, b]), vec![vec![0, 1]]);

    let mut synthesizer = synthesizer(Rc::new(Settings::default()), &fixture);
    let result = synthesizer.synthesize(&mut fixture.engine, &targets, &[a, b]);

    let (Some(ma), Some(mb)) = (result.models[0], result.models[1]) else {
        panic!("both roots should be synthesized: {:?}", result.models);
    };
    assert!(matches!(result.arena.get(mb), Model::ReferenceTo { .. }));
    assert_eq!(result.arena.deref(mb), ma);
    assert_eq!(result.arena.render(ma), "Foo.<init>(); Foo.setX(3)");
    assert_eq!(synthesizer.stats().attempts, 1);
}

// ─── Budgets ───────────────────────────────────────────────────────────────────

#[test]
fn depth_bound_prunes_longer_plans() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let root = fixture.target(&mut arena, "p", 5);
    let targets = Rc::new(arena);

    let mut synthesizer = synthesizer(Rc::new(Settings::default()), &fixture);
    let result = synthesizer.synthesize_within(&mut fixture.engine, &targets, &[root], 1, Duration::from_secs(30));

    assert_eq!(result.models, vec![None]);
    assert_eq!(synthesizer.stats(), SynthesisStats { attempts: 1, successes: 0 });
}

#[test]
fn exhausted_time_budget_yields_nothing() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let root = fixture.target(&mut arena, "p", 5);
    let targets = Rc::new(arena);

    let mut synthesizer = synthesizer(Rc::new(Settings::default()), &fixture);
    let result = synthesizer.synthesize_within(&mut fixture.engine, &targets, &[root], 4, Duration::ZERO);

    assert_eq!(result.models, vec![None]);
    assert_eq!(synthesizer.stats().successes, 0);
}

#[test]
fn suspended_synthesis_returns_empty_slots() {
    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let roots: Vec<ModelId> = (0..2).map(|i| fixture.target(&mut arena, &format!("p{}", i), i)).collect();
    let targets = Rc::new(arena);

    let settings = Rc::new(Settings::default());
    let mut synthesizer = synthesizer(Rc::clone(&settings), &fixture);
    {
        let _suspended = settings.suspend_synthesis();
        let result = synthesizer.synthesize(&mut fixture.engine, &targets, &roots);
        assert_eq!(result.models, vec![None, None]);
        assert!(!result.is_complete());
    }
    assert!(settings.synthesis_enabled());
    assert_eq!(synthesizer.stats(), SynthesisStats::default());

    let result = synthesizer.synthesize(&mut fixture.engine, &targets, &roots);
    assert!(result.is_complete());
    assert_eq!(synthesizer.stats(), SynthesisStats { attempts: 2, successes: 2 });
}
