//! Choosing, stopping and scoring strategies.
//!
//! Priorities and scores follow one convention everywhere: lower is better and
//! `u64::MAX` is the worst value.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::cache::MemoCache;
use crate::config::Settings;
use crate::graph::GraphListener;
use crate::model::{Model, ModelArena, ModelId};
use crate::resolver::ConstraintResolver;
use crate::solver::{Assignment, SharedSolver, SolverStatus};
use crate::state::{ExecutionState, MemoryState};
use crate::statistics::{DistanceStatistics, EdgeVisitCountingStatistics};
use crate::types::{Edge, StateId};

/// Maps a state to a priority given the current statistics.
pub trait ChoosingStrategy {
    fn priority(&self, state: &ExecutionState) -> u64;
}

/// Prefers states closest to uncovered code.
pub struct DistanceChoosing {
    stats: Rc<RefCell<DistanceStatistics>>,
}

impl DistanceChoosing {
    pub fn new(stats: Rc<RefCell<DistanceStatistics>>) -> Self {
        Self { stats }
    }
}

impl ChoosingStrategy for DistanceChoosing {
    fn priority(&self, state: &ExecutionState) -> u64 {
        self.stats.borrow().distance(state.location)
    }
}

/// Prefers states that arrived through rarely traversed edges.
pub struct VisitCountChoosing {
    stats: Rc<RefCell<EdgeVisitCountingStatistics>>,
}

impl VisitCountChoosing {
    pub fn new(stats: Rc<RefCell<EdgeVisitCountingStatistics>>) -> Self {
        Self { stats }
    }
}

impl ChoosingStrategy for VisitCountChoosing {
    fn priority(&self, state: &ExecutionState) -> u64 {
        state.last_edge.map_or(0, |edge| self.stats.borrow().visits(edge))
    }
}

/// Prefers states with fewer forks behind them.
#[derive(Debug, Default)]
pub struct DepthChoosing;

impl ChoosingStrategy for DepthChoosing {
    fn priority(&self, state: &ExecutionState) -> u64 {
        state.depth() as u64
    }
}

/// Prefers states that arrived through an edge which covered new code,
/// then states closest to uncovered code.
pub struct CoveredNewChoosing {
    stats: Rc<RefCell<DistanceStatistics>>,
}

impl CoveredNewChoosing {
    pub fn new(stats: Rc<RefCell<DistanceStatistics>>) -> Self {
        Self { stats }
    }
}

impl ChoosingStrategy for CoveredNewChoosing {
    fn priority(&self, state: &ExecutionState) -> u64 {
        let stats = self.stats.borrow();
        match state.last_edge {
            Some(edge) if stats.covered_new(edge) => 0,
            _ => stats.distance(state.location).saturating_add(1),
        }
    }
}

/// Halts the overall search.
pub trait StoppingStrategy: GraphListener {
    fn should_stop(&self) -> bool;
}

/// Stops once more than `limit` edges have been traversed.
#[derive(Debug)]
pub struct StepsLimitStoppingStrategy {
    limit: usize,
    steps: usize,
}

impl StepsLimitStoppingStrategy {
    pub fn new(limit: usize) -> Self {
        Self { limit, steps: 0 }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl GraphListener for StepsLimitStoppingStrategy {
    fn on_traverse(&mut self, _edge: Edge) {
        self.steps += 1;
    }
}

impl StoppingStrategy for StepsLimitStoppingStrategy {
    fn should_stop(&self) -> bool {
        self.steps > self.limit
    }
}

/// Outcome of scoring a state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Score {
    Feasible(u64),
    /// The state's constraints are unsatisfiable.
    Infeasible,
}

impl Score {
    pub fn value(self) -> u64 {
        match self {
            Score::Feasible(v) => v,
            Score::Infeasible => u64::MAX,
        }
    }
}

pub trait ScoringStrategy {
    fn score(&mut self, state: &ExecutionState) -> Score;
}

/// A target model to be established in the probe local named `local`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TargetBinding {
    pub target: ModelId,
    pub local: String,
}

/// Scores a state by how far the models of its probe locals are from the
/// target models.
pub struct ModelScoringStrategy {
    solver: SharedSolver,
    resolver: ConstraintResolver,
    targets: Rc<ModelArena>,
    bindings: Vec<TargetBinding>,
    memo: MemoCache<StateId, Score>,
}

impl ModelScoringStrategy {
    pub fn new(settings: Rc<Settings>, solver: SharedSolver, targets: Rc<ModelArena>, bindings: Vec<TargetBinding>) -> Self {
        Self {
            solver,
            resolver: ConstraintResolver::new(settings),
            targets,
            bindings,
            memo: MemoCache::new("scores"),
        }
    }

    fn distance_to_targets(&mut self, state: &ExecutionState, assignment: &Assignment) -> u64 {
        let mut total = 0;
        let mut values = Vec::new();
        let mut bound = Vec::new();
        for binding in &self.bindings {
            match state.local(&binding.local) {
                Some(value) => {
                    values.push(value.clone());
                    bound.push(binding.target);
                }
                None => total += 1,
            }
        }
        let resolved = self.resolver.resolve(state, assignment, MemoryState::Current, &values);
        for (&target, &actual) in bound.iter().zip(&resolved.parameters) {
            total += model_distance(&self.targets, target, &resolved.arena, actual);
            total += violated_constraints(&self.targets, target, &resolved.arena, actual, state, assignment);
        }
        total
    }
}

impl ScoringStrategy for ModelScoringStrategy {
    fn score(&mut self, state: &ExecutionState) -> Score {
        if let Some(score) = self.memo.get(&state.id) {
            return score;
        }
        let status = self.solver.borrow_mut().check(&state.path, false);
        let score = match status {
            SolverStatus::Unsat => Score::Infeasible,
            SolverStatus::Sat(assignment) => Score::Feasible(self.distance_to_targets(state, &assignment)),
        };
        debug!("score of {}: {:?}", state, score);
        self.memo.insert(state.id, score);
        score
    }
}

/// Structural distance between a target model and an actual one.
///
/// Counts one for a kind mismatch, a primitive value mismatch or a container
/// length mismatch.
pub fn model_distance(targets: &ModelArena, target: ModelId, actual_arena: &ModelArena, actual: ModelId) -> u64 {
    let target = targets.get(targets.deref(target));
    let actual = actual_arena.get(actual_arena.deref(actual));
    match (target, actual) {
        (Model::Null { .. }, Model::Null { .. }) => 0,
        (Model::Primitive { concrete: t, .. }, Model::Primitive { concrete: a, .. }) => u64::from(t != a),
        (Model::Object { .. } | Model::Assemble { .. }, Model::Object { .. }) => 0,
        (Model::Array(t), Model::Array(a))
        | (Model::List(t), Model::List(a))
        | (Model::Set(t), Model::Set(a))
        | (Model::Map(t), Model::Map(a)) => {
            let t = targets.get(t.length).concrete();
            let a = actual_arena.get(a.length).concrete();
            u64::from(t != a)
        }
        _ => 1,
    }
}

/// Number of an object target's constraints that are false for `actual` in
/// the current heap of `state`.
fn violated_constraints(
    targets: &ModelArena,
    target: ModelId,
    actual_arena: &ModelArena,
    actual: ModelId,
    state: &ExecutionState,
    assignment: &Assignment,
) -> u64 {
    let target = targets.get(targets.deref(target));
    let Model::Object { variable, constraints } = target else {
        return 0;
    };
    let mapping = [(variable.clone(), actual_arena.get(actual).variable().clone())].into_iter().collect();
    constraints
        .iter()
        .map(|c| state.memory.current_constraint(&c.substitute(&mapping)))
        .filter(|c| assignment.holds(c) == Some(false))
        .count() as u64
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use test_log::test;

    use super::*;
    use crate::expr::{Value, Variable};
    use crate::graph::ProgramGraph;
    use crate::types::{Location, Ty};

    #[test]
    fn test_steps_limit() {
        let mut stopping = StepsLimitStoppingStrategy::new(2);
        let edge = Edge::new(Location::new(0), Location::new(1));
        for _ in 0..2 {
            stopping.on_traverse(edge);
            assert!(!stopping.should_stop());
        }
        stopping.on_traverse(edge);
        assert!(stopping.should_stop());
        assert_eq!(stopping.steps(), 3);
    }

    #[test]
    fn test_choosing_strategies() {
        let graph = Rc::new(ProgramGraph::from_edges(3, &[(0, 1), (1, 2)]));
        let distance = Rc::new(RefCell::new(DistanceStatistics::new(graph)));
        let visits = Rc::new(RefCell::new(EdgeVisitCountingStatistics::new()));
        let edge = Edge::new(Location::new(0), Location::new(1));
        distance.borrow_mut().on_traverse(edge);
        visits.borrow_mut().on_traverse(edge);

        let mut state = ExecutionState::new(StateId::new(0), Location::new(0));
        assert_eq!(DistanceChoosing::new(distance.clone()).priority(&state), 2);
        assert_eq!(VisitCountChoosing::new(visits.clone()).priority(&state), 0);
        state.last_edge = Some(edge);
        assert_eq!(VisitCountChoosing::new(visits).priority(&state), 1);
    }

    #[test]
    fn test_depth_and_covered_new_choosing() {
        let graph = Rc::new(ProgramGraph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]));
        let distance = Rc::new(RefCell::new(DistanceStatistics::new(graph)));
        distance.borrow_mut().on_traverse(Edge::new(Location::new(0), Location::new(1)));
        let covered_new = CoveredNewChoosing::new(distance);

        let root = ExecutionState::new(StateId::new(0), Location::new(0));
        let fresh = root.fork(StateId::new(1), 0, Location::new(1));
        let stale = root.fork(StateId::new(2), 1, Location::new(2));
        assert_eq!(covered_new.priority(&fresh), 0);
        assert_eq!(covered_new.priority(&stale), 1);
        assert_eq!(covered_new.priority(&root), 2);

        let grandchild = fresh.fork(StateId::new(3), 0, Location::new(2));
        assert_eq!(DepthChoosing.priority(&root), 0);
        assert_eq!(DepthChoosing.priority(&grandchild), 2);
    }

    #[test]
    fn test_model_distance() {
        let mut targets = ModelArena::new();
        let five = targets.alloc(Model::Primitive {
            variable: Variable::param("t", Ty::Int),
            concrete: Value::int(5),
            constraints: BTreeSet::new(),
        });
        let null = targets.alloc(Model::Null {
            variable: Variable::null(),
        });
        let mut actual = ModelArena::new();
        let three = actual.alloc(Model::Primitive {
            variable: Variable::param("a", Ty::Int),
            concrete: Value::int(3),
            constraints: BTreeSet::new(),
        });
        let also_five = actual.alloc(Model::Primitive {
            variable: Variable::param("b", Ty::Int),
            concrete: Value::int(5),
            constraints: BTreeSet::new(),
        });
        assert_eq!(model_distance(&targets, five, &actual, three), 1);
        assert_eq!(model_distance(&targets, five, &actual, also_five), 0);
        assert_eq!(model_distance(&targets, null, &actual, also_five), 1);
        assert_eq!(Score::Infeasible.value(), u64::MAX);
    }
}
