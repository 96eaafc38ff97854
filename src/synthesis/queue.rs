use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::debug;

use super::catalog::MethodCatalog;
use super::unit::UnitContext;

struct Entry {
    calls: usize,
    seq: u64,
    context: UnitContext,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Reversed, so that the max-heap pops the fewest calls, then the oldest.
    fn cmp(&self, other: &Self) -> Ordering {
        other.calls.cmp(&self.calls).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Best-first frontier of plans, ordered by call count then insertion.
///
/// Plans with more calls than `depth` are rejected on push and never
/// reconsidered.
pub struct SynthesisQueue {
    heap: BinaryHeap<Entry>,
    seq: u64,
    depth: usize,
    pruned: usize,
}

impl SynthesisQueue {
    pub fn new(initial: UnitContext, depth: usize) -> Self {
        let mut queue = Self {
            heap: BinaryHeap::new(),
            seq: 0,
            depth,
            pruned: 0,
        };
        queue.push(initial);
        queue
    }

    /// Returns `false` if the plan exceeds the depth bound.
    pub fn push(&mut self, context: UnitContext) -> bool {
        let calls = context.call_count();
        if calls > self.depth {
            self.pruned += 1;
            return false;
        }
        self.heap.push(Entry {
            calls,
            seq: self.seq,
            context,
        });
        self.seq += 1;
        true
    }

    /// Pops the best plan and enqueues its one-step refinements.
    pub fn next(&mut self, catalog: &MethodCatalog) -> Option<UnitContext> {
        let entry = self.heap.pop()?;
        for refined in entry.context.expand(catalog) {
            self.push(refined);
        }
        debug!("visiting {} ({} calls, {} queued)", entry.context, entry.calls, self.heap.len());
        Some(entry.context)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of plans rejected by the depth bound.
    pub fn pruned(&self) -> usize {
        self.pruned
    }
}
