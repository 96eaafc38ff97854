use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use super::{Instrumentation, PathSelector};
use crate::state::ExecutionState;
use crate::statistics::DistanceStatistics;
use crate::strategies::{Score, ScoringStrategy};
use crate::types::StateId;

/// Picks the state with the lowest score, then the lowest distance to
/// uncovered code, then the earliest push.
///
/// States are scored when pushed. An infeasible state gets the worst score
/// and stays in the frontier.
pub struct ScoringSelector {
    frontier: Vec<(Score, u64, ExecutionState)>,
    scoring: Box<dyn ScoringStrategy>,
    distance: Rc<RefCell<DistanceStatistics>>,
    seq: u64,
    unsat_count: usize,
    instrumentation: Instrumentation,
}

impl ScoringSelector {
    pub fn new(
        scoring: Box<dyn ScoringStrategy>,
        distance: Rc<RefCell<DistanceStatistics>>,
        instrumentation: Instrumentation,
    ) -> Self {
        Self {
            frontier: Vec::new(),
            scoring,
            distance,
            seq: 0,
            unsat_count: 0,
            instrumentation,
        }
    }

    /// Number of pushed states found infeasible.
    pub fn unsat_count(&self) -> usize {
        self.unsat_count
    }
}

impl PathSelector for ScoringSelector {
    fn name(&self) -> &'static str {
        "scoring"
    }

    fn push(&mut self, state: ExecutionState) {
        let score = self.scoring.score(&state);
        if score == Score::Infeasible {
            self.unsat_count += 1;
            debug!("{} is infeasible ({} so far)", state, self.unsat_count);
        }
        self.frontier.push((score, self.seq, state));
        self.seq += 1;
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        let distance = self.distance.borrow();
        let (i, _) = self
            .frontier
            .iter()
            .enumerate()
            .min_by_key(|(_, (score, seq, state))| (score.value(), distance.distance(state.location), *seq))?;
        drop(distance);
        let (score, _, state) = self.frontier.remove(i);
        debug!("scoring picked {} with {:?}", state, score);
        Some(state)
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        let i = self.frontier.iter().position(|(_, _, s)| s.id == id)?;
        Some(self.frontier.remove(i).2)
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
    use std::collections::HashMap;

    use test_log::test;

    use super::super::testing::{context, drain, state};
    use super::super::{scoring_selector, SelectorConfig};
    use super::*;
    use crate::config::StrategyOption;
    use crate::types::StateIdGen;

    /// Scores looked up by state id.
    struct FixedScores(HashMap<StateId, Score>);

    impl ScoringStrategy for FixedScores {
        fn score(&mut self, state: &ExecutionState) -> Score {
            self.0.get(&state.id).copied().unwrap_or(Score::Infeasible)
        }
    }

    #[test]
    fn test_lowest_score_first_and_unsat_kept() {
        let mut ctx = context(&[(0, 1)], 2);
        let config = SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: Some(10),
            seed: None,
        };
        let mut ids = StateIdGen::new();
        let a = state(&mut ids, 0);
        let b = state(&mut ids, 0);
        let c = state(&mut ids, 1);
        let scores = HashMap::from([(a.id, Score::Feasible(3)), (c.id, Score::Feasible(1))]);
        let order = vec![c.id, a.id, b.id];

        let mut selector = scoring_selector(&mut ctx, &config, Box::new(FixedScores(scores))).unwrap();
        selector.push_all(vec![a, b, c]);
        assert_eq!(selector.unsat_count(), 1);
        assert_eq!(drain(&mut selector), order);
    }
}
