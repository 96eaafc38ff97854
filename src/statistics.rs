//! Incrementally maintained graph metrics used to rank states.

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use log::debug;

use crate::graph::{GraphListener, ProgramGraph};
use crate::types::{Edge, Location};

/// Distance of every location to the nearest uncovered location.
///
/// Distances are recomputed (one backward BFS from all uncovered locations)
/// whenever a traversal covers a location for the first time. Locations from
/// which no uncovered location is reachable have distance `u64::MAX`.
#[derive(Debug)]
pub struct DistanceStatistics {
    graph: Rc<ProgramGraph>,
    covered: Vec<bool>,
    distances: Vec<u64>,
    /// Edges whose traversal covered at least one location first.
    covering: HashSet<Edge>,
}

impl DistanceStatistics {
    pub fn new(graph: Rc<ProgramGraph>) -> Self {
        let size = graph.size();
        let mut stats = DistanceStatistics {
            graph,
            covered: vec![false; size],
            distances: vec![u64::MAX; size],
            covering: HashSet::new(),
        };
        stats.recompute();
        stats
    }

    pub fn distance(&self, location: Location) -> u64 {
        self.distances.get(location.index()).copied().unwrap_or(u64::MAX)
    }

    pub fn is_covered(&self, location: Location) -> bool {
        self.covered.get(location.index()).copied().unwrap_or(false)
    }

    /// Whether some traversal of `edge` covered new code.
    pub fn covered_new(&self, edge: Edge) -> bool {
        self.covering.contains(&edge)
    }

    pub fn covered_count(&self) -> usize {
        self.covered.iter().filter(|&&c| c).count()
    }

    /// Marks a location covered, returning `true` if it was not before.
    fn cover(&mut self, location: Location) -> bool {
        match self.covered.get_mut(location.index()) {
            Some(c) if !*c => {
                *c = true;
                true
            }
            _ => false,
        }
    }

    fn recompute(&mut self) {
        self.distances.iter_mut().for_each(|d| *d = u64::MAX);
        let mut queue = VecDeque::new();
        for location in self.graph.locations() {
            if !self.covered[location.index()] {
                self.distances[location.index()] = 0;
                queue.push_back(location);
            }
        }
        while let Some(location) = queue.pop_front() {
            let next = self.distances[location.index()] + 1;
            for &pred in self.graph.predecessors(location) {
                if next < self.distances[pred.index()] {
                    self.distances[pred.index()] = next;
                    queue.push_back(pred);
                }
            }
        }
    }
}

impl GraphListener for DistanceStatistics {
    fn on_traverse(&mut self, edge: Edge) {
        let from = self.cover(edge.from);
        let to = self.cover(edge.to);
        if from || to {
            self.covering.insert(edge);
            debug!("newly covered via {}, {} locations covered", edge, self.covered_count());
            self.recompute();
        }
    }
}

/// Number of traversals of every control-flow edge.
#[derive(Debug, Default)]
pub struct EdgeVisitCountingStatistics {
    visits: HashMap<Edge, u64>,
}

impl EdgeVisitCountingStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self, edge: Edge) -> u64 {
        self.visits.get(&edge).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.visits.values().sum()
    }
}

impl GraphListener for EdgeVisitCountingStatistics {
    fn on_traverse(&mut self, edge: Edge) {
        *self.visits.entry(edge).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn loc(i: u32) -> Location {
        Location::new(i)
    }

    #[test]
    fn test_distance_updates_on_cover() {
        let graph = Rc::new(ProgramGraph::from_edges(3, &[(0, 1), (1, 2)]));
        let mut stats = DistanceStatistics::new(graph);
        assert_eq!(stats.distance(loc(0)), 0);

        stats.on_traverse(Edge::new(loc(0), loc(1)));
        assert_eq!(stats.distance(loc(0)), 2);
        assert_eq!(stats.distance(loc(1)), 1);
        assert_eq!(stats.distance(loc(2)), 0);

        stats.on_traverse(Edge::new(loc(1), loc(2)));
        assert_eq!(stats.distance(loc(0)), u64::MAX);
        assert_eq!(stats.covered_count(), 3);
    }

    #[test]
    fn test_covering_edges_remembered() {
        let graph = Rc::new(ProgramGraph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]));
        let mut stats = DistanceStatistics::new(graph);
        stats.on_traverse(Edge::new(loc(0), loc(1)));
        stats.on_traverse(Edge::new(loc(1), loc(2)));
        stats.on_traverse(Edge::new(loc(0), loc(2)));

        assert!(stats.covered_new(Edge::new(loc(0), loc(1))));
        assert!(stats.covered_new(Edge::new(loc(1), loc(2))));
        assert!(!stats.covered_new(Edge::new(loc(0), loc(2))));
    }

    #[test]
    fn test_visit_counts() {
        let mut stats = EdgeVisitCountingStatistics::new();
        let edge = Edge::new(loc(0), loc(1));
        stats.on_traverse(edge);
        stats.on_traverse(edge);
        assert_eq!(stats.visits(edge), 2);
        assert_eq!(stats.visits(Edge::new(loc(1), loc(0))), 0);
        assert_eq!(stats.total(), 2);
    }
}
