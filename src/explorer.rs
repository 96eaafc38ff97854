//! The exploration loop.
//!
//! The engine proper (instruction semantics, forking) is a collaborator behind
//! [`SymbolicEngine`]. The [`Explorer`] owns the loop around it: pick a state,
//! check it if it gained constraints since its last check, hand terminal states
//! to the caller, step the rest and push their children back.

use std::ops::ControlFlow;
use std::time::Instant;

use log::{debug, info};

use crate::selectors::PathSelector;
use crate::solver::{SharedSolver, SolverStatus};
use crate::state::ExecutionState;
use crate::synthesis::ProbeMethod;
use crate::types::{StateId, StateIdGen};

/// Symbolic execution of one state by one step.
pub trait SymbolicEngine {
    /// Executes the next instruction of `state` and returns its successors.
    ///
    /// Children carry their `last_edge` and any constraints they gained; an
    /// empty result ends the path without a terminal state.
    fn step(&mut self, state: &ExecutionState, ids: &mut StateIdGen) -> Vec<ExecutionState>;
}

/// An engine able to execute synthesized probe methods.
pub trait ProbeEngine: SymbolicEngine {
    /// Creates the entry state of `probe`, binding its parameters to fresh
    /// symbolic values.
    fn enter(&mut self, probe: &ProbeMethod, ids: &mut StateIdGen) -> ExecutionState;
}

/// Counters of one [`Explorer::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplorationStats {
    /// States picked and found feasible.
    pub steps: usize,
    /// Steps that produced more than one child.
    pub forks: usize,
    /// States dropped because their constraints were unsatisfiable.
    pub dropped_unsat: usize,
    /// Terminal states handed to the caller.
    pub terminated: usize,
    /// Ids of the feasible picked states, in pick order.
    pub visited: Vec<StateId>,
}

pub struct Explorer {
    solver: SharedSolver,
    ids: StateIdGen,
}

impl Explorer {
    pub fn new(solver: SharedSolver) -> Self {
        Self {
            solver,
            ids: StateIdGen::new(),
        }
    }

    /// Id generator shared with the engine for entry states.
    pub fn ids(&mut self) -> &mut StateIdGen {
        &mut self.ids
    }

    /// Explores from `initial` until the selector stops or runs dry, the
    /// deadline passes, or `on_terminal` breaks.
    pub fn run<E: SymbolicEngine + ?Sized>(
        &mut self,
        selector: &mut dyn PathSelector,
        engine: &mut E,
        initial: ExecutionState,
        deadline: Option<Instant>,
        on_terminal: &mut dyn FnMut(&ExecutionState) -> ControlFlow<()>,
    ) -> ExplorationStats {
        let mut stats = ExplorationStats::default();
        selector.push(initial);

        loop {
            if selector.should_stop() {
                info!("{} selector asked to stop after {} steps", selector.name(), stats.steps);
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("exploration deadline passed after {} steps", stats.steps);
                break;
            }
            let Some(mut state) = selector.pick() else {
                debug!("frontier exhausted after {} steps", stats.steps);
                break;
            };

            if state.pending_check {
                let status = self.solver.borrow_mut().check(&state.path, false);
                if status == SolverStatus::Unsat {
                    stats.dropped_unsat += 1;
                    debug!("dropping infeasible {}", state);
                    continue;
                }
                state.pending_check = false;
            }
            stats.steps += 1;
            stats.visited.push(state.id);

            if state.is_terminal() {
                stats.terminated += 1;
                if on_terminal(&state).is_break() {
                    break;
                }
                continue;
            }

            let children = engine.step(&state, &mut self.ids);
            if children.len() > 1 {
                stats.forks += 1;
            }
            for child in &children {
                if let Some(edge) = child.last_edge {
                    selector.on_traverse(edge);
                }
            }
            selector.push_all(children);
        }

        debug!("exploration finished: {:?}", stats);
        stats
    }
}
