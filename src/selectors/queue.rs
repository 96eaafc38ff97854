use std::collections::VecDeque;

use log::debug;

use super::{Instrumentation, PathSelector};
use crate::state::ExecutionState;
use crate::strategies::ChoosingStrategy;
use crate::types::StateId;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QueueOrder {
    /// Oldest fork batch first.
    Bfs,
    /// Newest fork batch first.
    Dfs,
}

/// Breadth- or depth-first selector.
///
/// States pushed together form one batch. Batches are taken in insertion
/// (BFS) or reverse insertion (DFS) order; within a batch the choosing
/// strategy breaks ties, and equal priorities go to the earlier state.
pub struct QueueSelector {
    order: QueueOrder,
    batches: VecDeque<Vec<ExecutionState>>,
    choosing: Box<dyn ChoosingStrategy>,
    instrumentation: Instrumentation,
}

impl QueueSelector {
    pub fn new(order: QueueOrder, choosing: Box<dyn ChoosingStrategy>, instrumentation: Instrumentation) -> Self {
        Self {
            order,
            batches: VecDeque::new(),
            choosing,
            instrumentation,
        }
    }
}

impl PathSelector for QueueSelector {
    fn name(&self) -> &'static str {
        match self.order {
            QueueOrder::Bfs => "bfs",
            QueueOrder::Dfs => "dfs",
        }
    }

    fn push(&mut self, state: ExecutionState) {
        self.batches.push_back(vec![state]);
    }

    fn push_all(&mut self, states: Vec<ExecutionState>) {
        if !states.is_empty() {
            self.batches.push_back(states);
        }
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        let b = match self.order {
            QueueOrder::Bfs => 0,
            QueueOrder::Dfs => self.batches.len().checked_sub(1)?,
        };
        let batch = self.batches.get_mut(b)?;
        let choosing = &self.choosing;
        let (i, _) = batch
            .iter()
            .enumerate()
            .min_by_key(|&(i, s)| (choosing.priority(s), i))?;
        let state = batch.remove(i);
        if batch.is_empty() {
            self.batches.remove(b);
        }
        debug!("{} picked {}", self.name(), state);
        Some(state)
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        let (b, i) = self
            .batches
            .iter()
            .enumerate()
            .find_map(|(b, batch)| batch.iter().position(|s| s.id == id).map(|i| (b, i)))?;
        let state = self.batches[b].remove(i);
        if self.batches[b].is_empty() {
            self.batches.remove(b);
        }
        Some(state)
    }

    fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::super::testing::{context, drain, state};
    use super::super::{bfs_selector, dfs_selector, PathSelector, SelectorConfig};
    use crate::config::StrategyOption;
    use crate::types::StateIdGen;

    fn config() -> SelectorConfig {
        SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: Some(100),
            seed: None,
        }
    }

    #[test]
    fn test_bfs_takes_oldest_batch() {
        let mut ctx = context(&[(0, 1), (0, 2), (1, 3), (2, 3)], 4);
        let mut selector = bfs_selector(&mut ctx, &config()).unwrap();
        let mut ids = StateIdGen::new();
        let a = state(&mut ids, 1);
        let b = state(&mut ids, 2);
        let c = state(&mut ids, 3);
        let order = vec![a.id, b.id, c.id];
        selector.push_all(vec![a, b]);
        selector.push_all(vec![c]);
        assert_eq!(drain(&mut selector), order);
    }

    #[test]
    fn test_dfs_takes_newest_batch() {
        let mut ctx = context(&[(0, 1), (0, 2), (1, 3), (2, 3)], 4);
        let mut selector = dfs_selector(&mut ctx, &config()).unwrap();
        let mut ids = StateIdGen::new();
        let a = state(&mut ids, 1);
        let b = state(&mut ids, 2);
        let c = state(&mut ids, 3);
        let order = vec![c.id, a.id, b.id];
        selector.push_all(vec![a, b]);
        selector.push_all(vec![c]);
        assert_eq!(drain(&mut selector), order);
        assert!(selector.pick().is_none());
    }

    #[test]
    fn test_remove() {
        let mut ctx = context(&[(0, 1)], 2);
        let mut selector = bfs_selector(&mut ctx, &config()).unwrap();
        let mut ids = StateIdGen::new();
        let a = state(&mut ids, 0);
        let b = state(&mut ids, 1);
        let (a_id, b_id) = (a.id, b.id);
        selector.push_all(vec![a, b]);
        assert_eq!(selector.remove(a_id).map(|s| s.id), Some(a_id));
        assert_eq!(selector.len(), 1);
        assert_eq!(drain(&mut selector), vec![b_id]);
    }
}
