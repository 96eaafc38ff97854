//! Path selectors: the schedulers of symbolic exploration.
//!
//! A [`PathSelector`] owns the frontier of live [`ExecutionState`]s. The
//! explorer repeatedly [`pick`][PathSelector::pick]s a state, expands it, reports
//! the traversed edges through [`on_traverse`][PathSelector::on_traverse] and
//! [`push_all`][PathSelector::push_all]es the forked children back.
//!
//! Every selector carries an [`Instrumentation`]: the statistics providers it
//! notifies on traversal and the stopping strategy it consults. Selectors
//! built from one [`PathSelectorContext`] share both, which is how the
//! [interleaved selector][InterleavedSelector] avoids double counting.
//!
//! | Selector | Frontier order |
//! |----------|----------------|
//! | [`QueueSelector`] (BFS / DFS) | oldest / newest fork batch, priority within the batch |
//! | [`RankedSelector`] | lowest priority of a choosing strategy |
//! | [`RandomSelector`] | uniform, seeded |
//! | [`RandomPathSelector`] | uniform walk down the fork tree, seeded |
//! | [`WeightedRandomSelector`] | weight `1 / (1 + priority)`, seeded |
//! | [`ScoringSelector`] | lowest score, then distance |
//! | [`InterleavedSelector`] | round-robin over members |

use std::cell::RefCell;
use std::rc::Rc;

use crate::graph::{GraphListener, ProgramGraph};
use crate::state::ExecutionState;
use crate::statistics::{DistanceStatistics, EdgeVisitCountingStatistics};
use crate::strategies::StoppingStrategy;
use crate::types::{Edge, StateId};

mod builder;
mod interleaved;
mod queue;
mod random;
mod ranked;
mod scoring;

pub use builder::*;
pub use interleaved::InterleavedSelector;
pub use queue::{QueueOrder, QueueSelector};
pub use random::{RandomPathSelector, RandomSelector, WeightedRandomSelector};
pub use ranked::RankedSelector;
pub use scoring::ScoringSelector;

/// Listeners and stopping strategy attached to a selector.
#[derive(Clone)]
pub struct Instrumentation {
    listeners: Vec<Rc<RefCell<dyn GraphListener>>>,
    stopping: Rc<RefCell<dyn StoppingStrategy>>,
}

impl Instrumentation {
    pub fn new(listeners: Vec<Rc<RefCell<dyn GraphListener>>>, stopping: Rc<RefCell<dyn StoppingStrategy>>) -> Self {
        Self { listeners, stopping }
    }

    pub fn on_traverse(&self, edge: Edge) {
        for listener in &self.listeners {
            listener.borrow_mut().on_traverse(edge);
        }
        self.stopping.borrow_mut().on_traverse(edge);
    }

    pub fn should_stop(&self) -> bool {
        self.stopping.borrow().should_stop()
    }
}

/// Scheduler over a frontier of execution states.
pub trait PathSelector {
    fn name(&self) -> &'static str;

    fn push(&mut self, state: ExecutionState);

    /// Inserts the children of one fork.
    fn push_all(&mut self, states: Vec<ExecutionState>) {
        for state in states {
            self.push(state);
        }
    }

    /// Removes and returns the next state, or `None` if the frontier is exhausted.
    fn pick(&mut self) -> Option<ExecutionState>;

    fn remove(&mut self, id: StateId) -> Option<ExecutionState>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn instrumentation(&self) -> &Instrumentation;

    fn should_stop(&self) -> bool {
        self.instrumentation().should_stop()
    }

    fn on_traverse(&mut self, edge: Edge) {
        self.instrumentation().on_traverse(edge);
    }
}

/// Shared statistics and stopping strategy for a family of selectors.
///
/// Providers are created on first request and registered as listeners; every
/// selector built from the same context notifies the same instances.
pub struct PathSelectorContext {
    graph: Rc<ProgramGraph>,
    distance: Option<Rc<RefCell<DistanceStatistics>>>,
    visits: Option<Rc<RefCell<EdgeVisitCountingStatistics>>>,
    stopping: Option<Rc<RefCell<dyn StoppingStrategy>>>,
    listeners: Vec<Rc<RefCell<dyn GraphListener>>>,
}

impl PathSelectorContext {
    pub fn new(graph: Rc<ProgramGraph>) -> Self {
        Self {
            graph,
            distance: None,
            visits: None,
            stopping: None,
            listeners: Vec::new(),
        }
    }

    pub fn graph(&self) -> &Rc<ProgramGraph> {
        &self.graph
    }

    pub fn distance_statistics(&mut self) -> Rc<RefCell<DistanceStatistics>> {
        if let Some(stats) = &self.distance {
            return Rc::clone(stats);
        }
        let stats = Rc::new(RefCell::new(DistanceStatistics::new(Rc::clone(&self.graph))));
        self.listeners.push(stats.clone());
        self.distance = Some(Rc::clone(&stats));
        stats
    }

    pub fn visit_statistics(&mut self) -> Rc<RefCell<EdgeVisitCountingStatistics>> {
        if let Some(stats) = &self.visits {
            return Rc::clone(stats);
        }
        let stats = Rc::new(RefCell::new(EdgeVisitCountingStatistics::new()));
        self.listeners.push(stats.clone());
        self.visits = Some(Rc::clone(&stats));
        stats
    }

    pub fn stopping_strategy(&self) -> Option<&Rc<RefCell<dyn StoppingStrategy>>> {
        self.stopping.as_ref()
    }

    pub fn set_stopping_strategy(&mut self, stopping: Rc<RefCell<dyn StoppingStrategy>>) {
        self.stopping = Some(stopping);
    }

    /// Registers an extra listener notified by every selector built afterwards.
    pub fn add_listener(&mut self, listener: Rc<RefCell<dyn GraphListener>>) {
        self.listeners.push(listener);
    }

    fn instrumentation(&self, stopping: Rc<RefCell<dyn StoppingStrategy>>) -> Instrumentation {
        Instrumentation::new(self.listeners.clone(), stopping)
    }
}
