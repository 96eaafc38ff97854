use log::debug;

use super::{Instrumentation, PathSelector};
use crate::state::ExecutionState;
use crate::types::StateId;

/// Round-robins picks across independently ordered members.
///
/// Every member sees every pushed state; a state picked through one member is
/// removed from the others. Traversals are reported once, through the shared
/// instrumentation, not through each member.
pub struct InterleavedSelector {
    members: Vec<Box<dyn PathSelector>>,
    next: usize,
    instrumentation: Instrumentation,
}

impl InterleavedSelector {
    /// `members` must be non-empty; the builder checks it.
    pub(crate) fn new(members: Vec<Box<dyn PathSelector>>, instrumentation: Instrumentation) -> Self {
        Self {
            members,
            next: 0,
            instrumentation,
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &dyn PathSelector> {
        self.members.iter().map(|m| m.as_ref())
    }
}

impl PathSelector for InterleavedSelector {
    fn name(&self) -> &'static str {
        "interleaved"
    }

    fn push(&mut self, state: ExecutionState) {
        for member in &mut self.members {
            member.push(state.clone());
        }
    }

    fn push_all(&mut self, states: Vec<ExecutionState>) {
        for member in &mut self.members {
            member.push_all(states.clone());
        }
    }

    fn pick(&mut self) -> Option<ExecutionState> {
        let n = self.members.len();
        for k in 0..n {
            let i = (self.next + k) % n;
            let Some(state) = self.members[i].pick() else {
                continue;
            };
            for (j, member) in self.members.iter_mut().enumerate() {
                if j != i {
                    member.remove(state.id);
                }
            }
            self.next = (i + 1) % n;
            debug!("interleaved picked {} through {}", state, self.members[i].name());
            return Some(state);
        }
        None
    }

    fn remove(&mut self, id: StateId) -> Option<ExecutionState> {
        let mut removed = None;
        for member in &mut self.members {
            let state = member.remove(id);
            if removed.is_none() {
                removed = state;
            }
        }
        removed
    }

    fn len(&self) -> usize {
        self.members.iter().map(|m| m.len()).max().unwrap_or(0)
    }

    fn instrumentation(&self) -> &Instrumentation {
        &self.instrumentation
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::super::testing::{context, drain, state};
    use super::super::{bfs_selector, dfs_selector, interleaved_selector, SelectorConfig};
    use super::*;
    use crate::config::StrategyOption;
    use crate::types::{Edge, Location, StateIdGen};

    #[test]
    fn test_round_robin_without_duplicates() {
        let mut ctx = context(&[(0, 1), (1, 2)], 3);
        let config = SelectorConfig {
            strategy: StrategyOption::Distance,
            step_limit: Some(1),
            seed: None,
        };
        let bfs = bfs_selector(&mut ctx, &config).unwrap();
        let dfs = dfs_selector(&mut ctx, &config).unwrap();
        let mut selector = interleaved_selector(&mut ctx, vec![Box::new(bfs), Box::new(dfs)]).unwrap();

        let mut ids = StateIdGen::new();
        let a = state(&mut ids, 0);
        let b = state(&mut ids, 1);
        let c = state(&mut ids, 2);
        let expected = vec![a.id, c.id, b.id];
        selector.push(a);
        selector.push(b);
        selector.push(c);
        assert_eq!(selector.len(), 3);
        assert_eq!(drain(&mut selector), expected);

        // One shared stopping strategy, notified once per traversal.
        let edge = Edge::new(Location::new(0), Location::new(1));
        selector.on_traverse(edge);
        assert!(!selector.should_stop());
        selector.on_traverse(edge);
        assert!(selector.should_stop());
        assert!(selector.members().all(|m| m.should_stop()));
    }
}
