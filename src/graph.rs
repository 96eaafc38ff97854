//! The program under analysis, seen as a graph of locations.

use std::fmt;

use crate::types::{Edge, Location};

/// Receiver of edge-traversal events.
///
/// Statistics providers and stopping strategies listen to the traversals
/// reported by the selector that owns them.
pub trait GraphListener {
    fn on_traverse(&mut self, edge: Edge);
}

/// Control-flow graph over dense [`Location`] indices.
#[derive(Debug, Clone, Default)]
pub struct ProgramGraph {
    successors: Vec<Vec<Location>>,
    predecessors: Vec<Vec<Location>>,
}

impl ProgramGraph {
    pub fn new(size: usize) -> Self {
        ProgramGraph {
            successors: vec![Vec::new(); size],
            predecessors: vec![Vec::new(); size],
        }
    }

    pub fn from_edges(size: usize, edges: &[(u32, u32)]) -> Self {
        let mut graph = Self::new(size);
        for &(from, to) in edges {
            graph.add_edge(Location::new(from), Location::new(to));
        }
        graph
    }

    pub fn add_edge(&mut self, from: Location, to: Location) {
        let needed = from.index().max(to.index()) + 1;
        if needed > self.successors.len() {
            self.successors.resize(needed, Vec::new());
            self.predecessors.resize(needed, Vec::new());
        }
        if !self.successors[from.index()].contains(&to) {
            self.successors[from.index()].push(to);
            self.predecessors[to.index()].push(from);
        }
    }

    /// Number of locations.
    pub fn size(&self) -> usize {
        self.successors.len()
    }

    pub fn locations(&self) -> impl Iterator<Item = Location> {
        (0..self.successors.len() as u32).map(Location::new)
    }

    pub fn successors(&self, location: Location) -> &[Location] {
        self.successors.get(location.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, location: Location) -> &[Location] {
        self.predecessors.get(location.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_exit(&self, location: Location) -> bool {
        self.successors(location).is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.locations()
            .flat_map(move |from| self.successors(from).iter().map(move |&to| Edge::new(from, to)))
    }
}

impl fmt::Display for ProgramGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph with {} locations:", self.size())?;
        for edge in self.edges() {
            writeln!(f, "  {}", edge)?;
        }
        Ok(())
    }
}
