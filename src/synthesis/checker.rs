use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Instant;

use log::{debug, warn};

use crate::config::Settings;
use crate::explorer::{Explorer, ProbeEngine};
use crate::model::{ModelArena, ModelId};
use crate::resolver::ConstraintResolver;
use crate::selectors::{scoring_selector, PathSelectorContext, SelectorConfig};
use crate::solver::{Assignment, SharedSolver, SolverStatus};
use crate::state::{ExecutionState, MemoryState, StateStatus};
use crate::strategies::{ModelScoringStrategy, TargetBinding};

use super::postcondition::PostCondition;
use super::probe::ProbeMethod;
use super::unit::UnitContext;

/// Verifies fully defined plans by executing their probe methods.
pub struct UnitChecker {
    settings: Rc<Settings>,
    solver: SharedSolver,
    next_probe: usize,
}

impl UnitChecker {
    pub fn new(settings: Rc<Settings>, solver: SharedSolver) -> Self {
        Self {
            settings,
            solver,
            next_probe: 0,
        }
    }

    /// Executes the probe of `context` and, if some returned path also
    /// satisfies the target models, assembles one model per root.
    pub fn try_generate<E: ProbeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        context: &UnitContext,
        deadline: Option<Instant>,
    ) -> Option<(ModelArena, Vec<ModelId>)> {
        if !context.is_fully_defined() {
            return None;
        }
        let probe = ProbeMethod::translate(format!("$initializer_{}", self.next_probe), context);
        self.next_probe += 1;

        let targets = context.targets();
        let post = PostCondition::new(Rc::clone(targets), context.roots(), &probe.root_locals);
        let bindings = context
            .roots()
            .iter()
            .zip(&probe.root_locals)
            .map(|(&target, local)| TargetBinding {
                target,
                local: local.clone(),
            })
            .collect();
        let scoring = ModelScoringStrategy::new(
            Rc::clone(&self.settings),
            Rc::clone(&self.solver),
            Rc::clone(targets),
            bindings,
        );
        let mut ctx = PathSelectorContext::new(Rc::new(probe.graph()));
        let config = SelectorConfig::for_probe(&self.settings);
        let mut selector = match scoring_selector(&mut ctx, &config, Box::new(scoring)) {
            Ok(selector) => selector,
            Err(e) => {
                warn!("cannot verify {}: {}", probe.name, e);
                return None;
            }
        };

        let _suspended = self.settings.suspend_synthesis();
        let mut explorer = Explorer::new(Rc::clone(&self.solver));
        let initial = engine.enter(&probe, explorer.ids());
        let solver = Rc::clone(&self.solver);
        let mut accepted: Option<(ExecutionState, Assignment)> = None;
        let stats = explorer.run(&mut selector, engine, initial, deadline, &mut |state| {
            if state.status != StateStatus::Returned {
                return ControlFlow::Continue(());
            }
            let Some(atoms) = post.atoms(state) else {
                return ControlFlow::Continue(());
            };
            let mut checked = state.clone();
            for atom in atoms {
                checked.path.add_hard(atom);
            }
            match solver.borrow_mut().check(&checked.path, false) {
                SolverStatus::Sat(assignment) => {
                    accepted = Some((checked, assignment));
                    ControlFlow::Break(())
                }
                SolverStatus::Unsat => {
                    debug!("{} returned without matching the targets", state);
                    ControlFlow::Continue(())
                }
            }
        });
        debug!(
            "{}: {} steps, {} infeasible states scored",
            probe.name,
            stats.steps,
            selector.unsat_count()
        );

        let (state, assignment) = accepted?;
        let mut resolver = ConstraintResolver::new(Rc::clone(&self.settings));
        let params = resolver.resolve(&state, &assignment, MemoryState::Initial, &state.parameters);
        Some(probe.assemble(&params))
    }
}
