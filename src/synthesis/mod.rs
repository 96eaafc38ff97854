//! Model-directed synthesis.
//!
//! When a target model cannot be established by assigning fields directly, the
//! [`Synthesizer`] searches for a sequence of constructor and method calls that
//! produces it:
//!
//! 1. Targets are [partitioned][partition] into clusters of models that mention
//!    each other; clusters are searched independently.
//! 2. Per cluster, a [`SynthesisQueue`] yields plans ([`UnitContext`]s) by
//!    increasing call count, refining one undefined leaf at a time from the
//!    [`MethodCatalog`].
//! 3. A fully defined plan is translated into a [`ProbeMethod`] and verified by
//!    the [`UnitChecker`], which explores the probe under a scoring selector and
//!    accepts the first returned path satisfying the targets.
//! 4. The accepted path's parameters are resolved and assembled into
//!    [`Model::Assemble`][crate::model::Model::Assemble] results.
//!
//! Failures are never errors: a root without a plan maps to `None`.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::Settings;
use crate::explorer::ProbeEngine;
use crate::model::{Model, ModelArena, ModelId};
use crate::solver::SharedSolver;

mod catalog;
mod checker;
mod postcondition;
mod probe;
mod queue;
mod unit;

pub use catalog::MethodCatalog;
pub use checker::UnitChecker;
pub use postcondition::PostCondition;
pub use probe::{PlanNode, ProbeMethod, ProbeParam, ProbeStmt};
pub use queue::SynthesisQueue;
pub use unit::{ContainerKind, SynthesisUnit, UnitContext};

/// Attempt and success counters of a [`Synthesizer`]. One attempt per cluster.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SynthesisStats {
    pub attempts: usize,
    pub successes: usize,
}

impl SynthesisStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

/// Synthesized models, one slot per requested root.
#[derive(Debug, Clone, Default)]
pub struct SynthesisResult {
    pub arena: ModelArena,
    pub models: Vec<Option<ModelId>>,
}

impl SynthesisResult {
    pub fn model(&self, root: usize) -> Option<&Model> {
        self.models.get(root).copied().flatten().map(|id| self.arena.get(id))
    }

    pub fn is_complete(&self) -> bool {
        self.models.iter().all(Option::is_some)
    }
}

/// Whether the model `a` refers to the model `b`: one of its constraints
/// mentions `b`'s variable, or it aliases `b`.
fn mentions(targets: &ModelArena, a: ModelId, b: ModelId) -> bool {
    let model = targets.get(a);
    if let Model::ReferenceTo { target, .. } = model {
        if targets.deref(*target) == b {
            return true;
        }
    }
    let variable = targets.get(b).variable();
    model
        .constraints()
        .is_some_and(|constraints| constraints.iter().any(|c| c.mentions(variable)))
}

/// Groups `roots` (by position) into clusters closed under [`mentions`] in
/// either direction. Clusters are disjoint, cover every position, and are
/// ordered by their first position.
pub fn partition(targets: &ModelArena, roots: &[ModelId]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..roots.len()).collect();
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    for i in 0..roots.len() {
        for j in 0..roots.len() {
            if i != j && mentions(targets, roots[i], roots[j]) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut index_of: HashMap<usize, usize> = HashMap::new();
    for i in 0..roots.len() {
        let leader = find(&mut parent, i);
        let k = *index_of.entry(leader).or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[k].push(i);
    }
    clusters
}

pub struct Synthesizer {
    settings: Rc<Settings>,
    catalog: MethodCatalog,
    checker: UnitChecker,
    stats: SynthesisStats,
}

impl Synthesizer {
    pub fn new(settings: Rc<Settings>, solver: SharedSolver, catalog: MethodCatalog) -> Self {
        let checker = UnitChecker::new(Rc::clone(&settings), solver);
        Self {
            settings,
            catalog,
            checker,
            stats: SynthesisStats::default(),
        }
    }

    pub fn stats(&self) -> SynthesisStats {
        self.stats
    }

    /// Synthesizes `roots` within the configured depth and time budgets.
    pub fn synthesize<E: ProbeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        targets: &Rc<ModelArena>,
        roots: &[ModelId],
    ) -> SynthesisResult {
        let (depth, timeout) = (self.settings.synthesis_max_depth, self.settings.synthesis_timeout);
        self.synthesize_within(engine, targets, roots, depth, timeout)
    }

    /// Synthesizes `roots` with plans of at most `depth` calls, giving up on
    /// remaining clusters once `timeout` has elapsed.
    pub fn synthesize_within<E: ProbeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        targets: &Rc<ModelArena>,
        roots: &[ModelId],
        depth: usize,
        timeout: Duration,
    ) -> SynthesisResult {
        let mut result = SynthesisResult {
            arena: ModelArena::new(),
            models: vec![None; roots.len()],
        };
        if !self.settings.synthesis_enabled() {
            debug!("synthesis is suspended, skipping {} roots", roots.len());
            return result;
        }
        let deadline = Instant::now() + timeout;

        for cluster in partition(targets, roots) {
            let cluster_roots: Vec<ModelId> = cluster.iter().map(|&i| roots[i]).collect();
            let found = self.search(engine, targets, &cluster_roots, depth, deadline);
            self.stats.attempts += 1;
            match found {
                Some((arena, ids)) => {
                    self.stats.successes += 1;
                    let mut remap = HashMap::new();
                    for (&i, id) in cluster.iter().zip(ids) {
                        result.models[i] = Some(result.arena.import_with(&arena, id, &mut remap));
                    }
                }
                None => debug!("no plan for roots {:?}", cluster),
            }
            debug!(
                "synthesis stats: {} attempts, {} successes ({:.2})",
                self.stats.attempts,
                self.stats.successes,
                self.stats.success_rate()
            );
        }
        result
    }

    fn search<E: ProbeEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        targets: &Rc<ModelArena>,
        roots: &[ModelId],
        depth: usize,
        deadline: Instant,
    ) -> Option<(ModelArena, Vec<ModelId>)> {
        let mut queue = SynthesisQueue::new(UnitContext::new(Rc::clone(targets), roots), depth);
        while Instant::now() < deadline {
            let Some(context) = queue.next(&self.catalog) else {
                debug!("plans exhausted ({} pruned by depth {})", queue.pruned(), depth);
                return None;
            };
            if !context.is_fully_defined() {
                continue;
            }
            if let Some(found) = self.checker.try_generate(engine, &context, Some(deadline)) {
                debug!("accepted plan {}", context);
                return Some(found);
            }
        }
        info!("synthesis time budget exhausted with {} plans queued", queue.len());
        None
    }
}
