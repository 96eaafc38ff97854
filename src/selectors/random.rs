//! Seeded randomized selectors.
//!
//! All of them draw from a [`ChaCha8Rng`] seeded with the configured seed, so
//! equal seeds over equal inputs reproduce the same pick order. An absent seed
//! draws one at random.

use log::{debug, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{Instrumentation, PathSelector};
use crate::state::ExecutionState;
use crate::strategies::ChoosingStrategy;
use crate::types::StateId;

pub(crate) fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    let seed = seed.unwrap_or_else(rand::random);
    debug!("path selector seed: {}", seed);
    ChaCha8Rng::seed_from_u64(seed)
}

fn remove_by_id(frontier: &mut Vec<ExecutionState>, id: StateId) -> Option<ExecutionState> {
    let i = frontier.iter().position(|s| s.id == id)?;
    Some(frontier.remove(i))
}

/// Picks uniformly among the frontier.
pub struct RandomSelector {
    frontier: Vec<ExecutionState>,
    rng: ChaCha8Rng,
    instrumentation: Instrumentation,
}

impl RandomSelector {
    pub fn new(seed: Option<u64>, instrumentation: Instrumentation) -> Self {
        Self {
            frontier: Vec::new(),
            rng: make_rng(seed),
            instrumentation,
        }
    }
}

impl PathSelector for RandomSelector {
    fn name(&self) -> &'static str {
        "random"
    }

    fn push(&mut self, state: ExecutionState) {
        self.frontier.push(state);
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        if self.frontier.is_empty() {
            return None;
        }
        let i = self.rng.gen_range(0..self.frontier.len());
        Some(self.frontier.remove(i))
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        remove_by_id(&mut self.frontier, id)
    }

    fn len(&self) -> usize {
        self.frontier.len()
    }

    fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }
}

/// Walks the fork tree from its root, choosing a branch uniformly at every
/// level, until a single frontier state remains.
///
/// Shallow states are thus far more likely to be picked than deep ones in a
/// bushy subtree.
pub struct RandomPathSelector {
    frontier: Vec<ExecutionState>,
    rng: ChaCha8Rng,
    instrumentation: Instrumentation,
}

impl RandomPathSelector {
    pub fn new(seed: Option<u64>, instrumentation: Instrumentation) -> Self {
        Self {
            frontier: Vec::new(),
            rng: make_rng(seed),
            instrumentation,
        }
    }
}

impl PathSelector for RandomPathSelector {
    fn name(&self) -> &'static str {
        "random-path"
    }

    fn push(&mut self, state: ExecutionState) {
        self.frontier.push(state);
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        let mut candidates: Vec<usize> = (0..self.frontier.len()).collect();
        let mut depth = 0;
        while candidates.len() > 1 {
            // `None` stands for states ending at this node of the tree.
            let mut branches: Vec<Option<u32>> = candidates
                .iter()
                .map(|&i| self.frontier[i].fork_path.get(depth).copied())
                .collect();
            branches.sort_unstable();
            branches.dedup();
            if branches == [None] {
                let k = self.rng.gen_range(0..candidates.len());
                candidates = vec![candidates[k]];
                break;
            }
            let branch = branches[self.rng.gen_range(0..branches.len())];
            candidates.retain(|&i| self.frontier[i].fork_path.get(depth).copied() == branch);
            depth += 1;
        }
        let i = *candidates.first()?;
        Some(self.frontier.remove(i))
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        remove_by_id(&mut self.frontier, id)
    }

    fn len(&self) -> usize {
        self.frontier.len()
    }

    fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }
}

/// Weighted random pick with weight `1 / (1 + priority)`.
///
/// The choosing strategy decides the flavor: distance or visit counts for
/// `rp`, fork depth for `depth`, new coverage for `covered-new`.
pub struct WeightedRandomSelector {
    name: &'static str,
    frontier: Vec<ExecutionState>,
    choosing: Box<dyn ChoosingStrategy>,
    rng: ChaCha8Rng,
    instrumentation: Instrumentation,
}

impl WeightedRandomSelector {
    pub fn new(seed: Option<u64>, choosing: Box<dyn ChoosingStrategy>, instrumentation: Instrumentation) -> Self {
        Self {
            name: "rp",
            frontier: Vec::new(),
            choosing,
            rng: make_rng(seed),
            instrumentation,
        }
    }
}

impl WeightedRandomSelector {
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl PathSelector for WeightedRandomSelector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn push(&mut self, state: ExecutionState) {
        self.frontier.push(state);
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        if self.frontier.is_empty() {
            return None;
        }
        let weights: Vec<f64> = self
            .frontier
            .iter()
            .map(|s| 1.0 / (1.0 + self.choosing.priority(s) as f64))
            .collect();
        let i = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(e) => {
                warn!("falling back to a uniform pick: {}", e);
                self.rng.gen_range(0..self.frontier.len())
            }
        };
        Some(self.frontier.remove(i))
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        remove_by_id(&mut self.frontier, id)
    }

    fn len(&self) -> usize {
        self.frontier.len()
    }

    fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::super::testing::{context, drain};
    use super::super::{build_selector, SelectorConfig, SelectorKind};
    use super::*;
    use crate::config::StrategyOption;
    use crate::types::{Edge, Location, StateIdGen};

    fn states(n: u32) -> Vec<ExecutionState> {
        let mut ids = StateIdGen::new();
        let root = ExecutionState::new(ids.fresh(), Location::new(0));
        (0..n).map(|b| root.fork(ids.fresh(), b, Location::new(1 + b % 3))).collect()
    }

    fn run(kind: SelectorKind, seed: u64) -> Vec<StateId> {
        let mut ctx = context(&[(0, 1), (0, 2), (0, 3)], 4);
        let config = SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: Some(10),
            seed: Some(seed),
        };
        let mut selector = build_selector(kind, &mut ctx, &config).unwrap();
        selector.push_all(states(8));
        drain(selector.as_mut())
    }

    #[test]
    fn test_seeded_selectors_reproduce() {
        for kind in [
            SelectorKind::Random,
            SelectorKind::RandomPath,
            SelectorKind::Rp,
            SelectorKind::Depth,
            SelectorKind::CoveredNew,
        ] {
            let first = run(kind, 7);
            let second = run(kind, 7);
            assert_eq!(first.len(), 8);
            assert_eq!(first, second, "{:?} is not reproducible", kind);
        }
    }

    #[test]
    fn test_random_path_prefers_shallow_states() {
        let mut ids = StateIdGen::new();
        let root = ExecutionState::new(ids.fresh(), Location::new(0));
        let shallow = root.fork(ids.fresh(), 0, Location::new(1));
        let deep_parent = root.fork(ids.fresh(), 1, Location::new(2));
        let deep: Vec<_> = (0..4).map(|b| deep_parent.fork(ids.fresh(), b, Location::new(3))).collect();

        let mut shallow_first = 0;
        for seed in 0..200 {
            let mut ctx = context(&[(0, 1), (0, 2), (2, 3)], 4);
            let config = SelectorConfig {
                strategy: StrategyOption::Distance,
                step_limit: Some(10),
                seed: Some(seed),
            };
            let mut selector = build_selector(SelectorKind::RandomPath, &mut ctx, &config).unwrap();
            selector.push(shallow.clone());
            selector.push_all(deep.clone());
            if selector.pick().map(|s| s.id) == Some(shallow.id) {
                shallow_first += 1;
            }
        }
        // The shallow state is picked with probability 1/2, each deep one with 1/8.
        assert!(shallow_first > 60, "shallow state picked first only {} times", shallow_first);
    }

    #[test]
    fn test_depth_selector_prefers_shallow_states() {
        let mut ids = StateIdGen::new();
        let root = ExecutionState::new(ids.fresh(), Location::new(0));
        let a = root.fork(ids.fresh(), 0, Location::new(1));
        let b = a.fork(ids.fresh(), 0, Location::new(2));
        let deep: Vec<_> = (0..4).map(|i| b.fork(ids.fresh(), i, Location::new(3))).collect();

        let mut root_first = 0;
        for seed in 0..200 {
            let mut ctx = context(&[(0, 1), (1, 2), (2, 3)], 4);
            let config = SelectorConfig {
                strategy: StrategyOption::Distance,
                step_limit: Some(10),
                seed: Some(seed),
            };
            let mut selector = build_selector(SelectorKind::Depth, &mut ctx, &config).unwrap();
            assert_eq!(selector.name(), "depth");
            selector.push(root.clone());
            selector.push_all(deep.clone());
            if selector.pick().map(|s| s.id) == Some(root.id) {
                root_first += 1;
            }
        }
        // Weight 1 for the root against 1/4 for each depth-3 state.
        assert!(root_first > 60, "root picked first only {} times", root_first);
    }

    #[test]
    fn test_covered_new_selector_prefers_new_coverage() {
        // Location 3 stays uncovered and unreachable, so stale states weigh nothing.
        let mut ctx = context(&[(0, 1), (1, 2), (0, 2)], 4);
        let config = SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: Some(10),
            seed: Some(5),
        };
        let mut selector = build_selector(SelectorKind::CoveredNew, &mut ctx, &config).unwrap();
        selector.on_traverse(Edge::new(Location::new(0), Location::new(1)));
        selector.on_traverse(Edge::new(Location::new(1), Location::new(2)));
        selector.on_traverse(Edge::new(Location::new(0), Location::new(2)));

        let mut ids = StateIdGen::new();
        let root = ExecutionState::new(ids.fresh(), Location::new(0));
        let stale = root.fork(ids.fresh(), 1, Location::new(2));
        let middle = root.fork(ids.fresh(), 0, Location::new(1));
        let fresh = middle.fork(ids.fresh(), 0, Location::new(2));
        let fresh_id = fresh.id;
        selector.push(stale);
        selector.push(fresh);
        assert_eq!(selector.pick().map(|s| s.id), Some(fresh_id));
    }
}
