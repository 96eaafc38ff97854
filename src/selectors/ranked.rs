use log::debug;

use super::{Instrumentation, PathSelector};
use crate::state::ExecutionState;
use crate::strategies::ChoosingStrategy;
use crate::types::StateId;

/// Picks the state with the lowest priority, earliest on ties.
///
/// Priorities are recomputed on every pick, so statistics updated by
/// traversals since the push are taken into account.
pub struct RankedSelector {
    name: &'static str,
    frontier: Vec<ExecutionState>,
    choosing: Box<dyn ChoosingStrategy>,
    instrumentation: Instrumentation,
}

impl RankedSelector {
    pub fn new(name: &'static str, choosing: Box<dyn ChoosingStrategy>, instrumentation: Instrumentation) -> Self {
        Self {
            name,
            frontier: Vec::new(),
            choosing,
            instrumentation,
        }
    }
}

impl PathSelector for RankedSelector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn push(&mut self, state: ExecutionState) {
        self.frontier.push(state);
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        let (i, priority) = self
            .frontier
            .iter()
            .enumerate()
            .map(|(i, s)| (i, self.choosing.priority(s)))
            .min_by_key(|&(i, p)| (p, i))?;
        let state = self.frontier.remove(i);
        debug!("{} picked {} with priority {}", self.name, state, priority);
        Some(state)
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        let i = self.frontier.iter().position(|s| s.id == id)?;
        Some(self.frontier.remove(i))
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

    use super::super::testing::{context, state};
    use super::super::{minimal_distance_selector, visit_counting_selector, SelectorConfig};
    use super::*;
    use crate::config::StrategyOption;
    use crate::types::{Edge, Location, StateIdGen};

    fn config() -> SelectorConfig {
        SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: Some(100),
            seed: None,
        }
    }

    #[test]
    fn test_minimal_distance_prefers_frontier_of_coverage() {
        // 0 -> 1 -> 2 -> 3, and 0 -> 4.
        let mut ctx = context(&[(0, 1), (1, 2), (2, 3), (0, 4)], 5);
        let mut selector = minimal_distance_selector(&mut ctx, &config()).unwrap();
        selector.on_traverse(Edge::new(Location::new(0), Location::new(1)));
        selector.on_traverse(Edge::new(Location::new(1), Location::new(2)));

        let mut ids = StateIdGen::new();
        let far = state(&mut ids, 1);
        let near = state(&mut ids, 4);
        let near_id = near.id;
        selector.push(far);
        selector.push(near);
        assert_eq!(selector.pick().map(|s| s.id), Some(near_id));
    }

    #[test]
    fn test_visit_counting_prefers_rare_edges() {
        let mut ctx = context(&[(0, 1), (0, 2)], 3);
        let mut selector = visit_counting_selector(&mut ctx, &config()).unwrap();
        let hot = Edge::new(Location::new(0), Location::new(1));
        let cold = Edge::new(Location::new(0), Location::new(2));
        selector.on_traverse(hot);
        selector.on_traverse(hot);
        selector.on_traverse(cold);

        let mut ids = StateIdGen::new();
        let mut a = state(&mut ids, 1);
        a.last_edge = Some(hot);
        let mut b = state(&mut ids, 2);
        b.last_edge = Some(cold);
        let b_id = b.id;
        selector.push(a);
        selector.push(b);
        assert_eq!(selector.pick().map(|s| s.id), Some(b_id));
        assert_eq!(selector.len(), 1);
    }
}
