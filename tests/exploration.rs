//! Exploration loop tests over the graph-walking engine.
//!
//! Tests cover lazy feasibility checks, stopping, and seeded reproducibility.

use std::ops::ControlFlow;
use std::rc::Rc;

use pathsynth::config::StrategyOption;
use pathsynth::explorer::{ExplorationStats, Explorer};
use pathsynth::expr::{Constraint, Variable};
use pathsynth::graph::ProgramGraph;
use pathsynth::selectors::{
    bfs_selector, build_selector, interleaved_selector, random_path_selector, PathSelector, PathSelectorContext,
    SelectorConfig, SelectorKind,
};
use pathsynth::state::StateStatus;
use pathsynth::test_support::{shared_solver, GraphWalker};
use pathsynth::types::Ty;

fn config(step_limit: usize, seed: u64) -> SelectorConfig {
    SelectorConfig {
        strategy: StrategyOption::Distance,
        step_limit: Some(step_limit),
        seed: Some(seed),
    }
}

/// Complete binary tree with 15 locations; the 8 leaves are exits.
fn tree() -> Rc<ProgramGraph> {
    let edges: Vec<(u32, u32)> = (0..7).flat_map(|i| [(i, 2 * i + 1), (i, 2 * i + 2)]).collect();
    Rc::new(ProgramGraph::from_edges(15, &edges))
}

fn explore(walker: &mut GraphWalker, selector: &mut dyn PathSelector) -> ExplorationStats {
    let mut explorer = Explorer::new(shared_solver());
    let initial = walker.initial(explorer.ids());
    explorer.run(selector, walker, initial, None, &mut |_| ControlFlow::Continue(()))
}

// ─── Feasibility ───────────────────────────────────────────────────────────────

#[test]
fn infeasible_states_dropped_when_picked() {
    let graph = Rc::new(ProgramGraph::from_edges(4, &[(0, 1), (0, 3), (1, 2)]));
    let x = Variable::param("x", Ty::Int);
    let mut walker = GraphWalker::new(Rc::clone(&graph))
        .guard(0, 1, Constraint::eq(x.clone(), Variable::int(1)))
        .guard(1, 2, Constraint::eq(x, Variable::int(2)));

    let mut ctx = PathSelectorContext::new(graph);
    let mut selector = bfs_selector(&mut ctx, &config(100, 0)).expect("bfs builds");
    let stats = explore(&mut walker, &mut selector);

    assert_eq!(stats.steps, 3);
    assert_eq!(stats.forks, 1);
    assert_eq!(stats.terminated, 1);
    assert_eq!(stats.dropped_unsat, 1);
    assert!(selector.is_empty());
}

#[test]
fn terminal_callback_can_stop_exploration() {
    let graph = tree();
    let mut walker = GraphWalker::new(Rc::clone(&graph));
    let mut ctx = PathSelectorContext::new(graph);
    let mut selector = build_selector(SelectorKind::Dfs, &mut ctx, &config(1000, 0)).expect("dfs builds");

    let mut explorer = Explorer::new(shared_solver());
    let initial = walker.initial(explorer.ids());
    let mut returned = Vec::new();
    let stats = explorer.run(selector.as_mut(), &mut walker, initial, None, &mut |state| {
        assert_eq!(state.status, StateStatus::Returned);
        returned.push(state.location);
        ControlFlow::Break(())
    });

    assert_eq!(returned.len(), 1);
    assert_eq!(stats.terminated, 1);
    assert!(!selector.is_empty());
}

#[test]
fn step_limit_stops_exploration() {
    let graph = tree();
    let mut walker = GraphWalker::new(Rc::clone(&graph));
    let mut ctx = PathSelectorContext::new(graph);
    let mut selector = build_selector(SelectorKind::Bfs, &mut ctx, &config(3, 0)).expect("bfs builds");
    let stats = explore(&mut walker, selector.as_mut());

    assert!(selector.should_stop());
    assert!(stats.steps < 15);
    assert_eq!(stats.terminated, 0);
}

#[test]
fn full_exploration_visits_every_location() {
    for kind in [
        SelectorKind::Bfs,
        SelectorKind::Dfs,
        SelectorKind::MinimalDistance,
        SelectorKind::VisitCounting,
        SelectorKind::Random,
        SelectorKind::RandomPath,
        SelectorKind::Rp,
        SelectorKind::Depth,
        SelectorKind::CoveredNew,
    ] {
        let graph = tree();
        let mut walker = GraphWalker::new(Rc::clone(&graph));
        let mut ctx = PathSelectorContext::new(graph);
        let mut selector = build_selector(kind, &mut ctx, &config(1000, 3)).expect("selector builds");
        let stats = explore(&mut walker, selector.as_mut());

        assert_eq!(stats.steps, 15, "{:?}", kind);
        assert_eq!(stats.terminated, 8, "{:?}", kind);
        assert_eq!(stats.forks, 7, "{:?}", kind);
    }
}

// ─── Reproducibility ───────────────────────────────────────────────────────────

fn seeded_run(kind: SelectorKind, seed: u64) -> ExplorationStats {
    let graph = tree();
    let mut walker = GraphWalker::new(Rc::clone(&graph));
    let mut ctx = PathSelectorContext::new(graph);
    let mut selector = build_selector(kind, &mut ctx, &config(1000, seed)).expect("selector builds");
    explore(&mut walker, selector.as_mut())
}

#[test]
fn same_seed_same_exploration() {
    for kind in [
        SelectorKind::Random,
        SelectorKind::RandomPath,
        SelectorKind::Rp,
        SelectorKind::Depth,
        SelectorKind::CoveredNew,
    ] {
        assert_eq!(seeded_run(kind, 7), seeded_run(kind, 7), "{:?}", kind);
    }
}

#[test]
fn interleaved_exploration_is_reproducible() {
    let run = || {
        let graph = tree();
        let mut walker = GraphWalker::new(Rc::clone(&graph));
        let mut ctx = PathSelectorContext::new(graph);
        let config = config(1000, 11);
        let members: Vec<Box<dyn PathSelector>> = vec![
            Box::new(bfs_selector(&mut ctx, &config).expect("bfs builds")),
            Box::new(random_path_selector(&mut ctx, &config).expect("random-path builds")),
        ];
        let mut selector = interleaved_selector(&mut ctx, members).expect("interleaving builds");
        explore(&mut walker, &mut selector)
    };
    let first = run();
    assert_eq!(first.steps, 15);
    assert_eq!(first, run());
}
