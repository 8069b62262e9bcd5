use std::collections::HashMap;

use crate::geometry::{distance, Point};
use crate::map::NodeId;

use super::network::{link, unlink, Adjacency, CorridorNetwork};
use super::projection::Projection;

pub const VIRTUAL_START: NodeId = -1;
pub const VIRTUAL_END: NodeId = -2;

/// Request-scoped copy of the corridor network that virtual nodes are
/// spliced into. The network it was cloned from is never touched.
#[derive(Debug, Clone)]
pub struct WorkingGraph {
    pub adjacency: Adjacency,
    pub coords: HashMap<NodeId, Point>,
}

impl WorkingGraph {
    pub fn from_network(network: &CorridorNetwork) -> Self {
        WorkingGraph {
            adjacency: network.adjacency.clone(),
            coords: network.coords.clone(),
        }
    }

    /// Splice both route endpoints into the graph as [`VIRTUAL_START`] and
    /// [`VIRTUAL_END`].
    pub fn splice_endpoints(network: &CorridorNetwork, start: &Projection, end: &Projection) -> Self {
        let mut graph = WorkingGraph::from_network(network);
        graph.split_edge(network, start, VIRTUAL_START);

        if start.edge == end.edge {
            // The edge is already gone. Hang the end off the same two
            // endpoints and give the endpoints a direct link.
            graph.attach(network, end, VIRTUAL_END);
            graph.connect(VIRTUAL_START, VIRTUAL_END);
        } else {
            graph.split_edge(network, end, VIRTUAL_END);
        }
        graph
    }

    /// Replace the projected edge with two halves meeting at a new node.
    fn split_edge(&mut self, network: &CorridorNetwork, projection: &Projection, id: NodeId) {
        let edge = network.edges[projection.edge];
        unlink(&mut self.adjacency, edge.from, edge.to);
        self.attach(network, projection, id);
    }

    /// Insert `id` at the projection point and connect it to both endpoints
    /// of the projected edge.
    fn attach(&mut self, network: &CorridorNetwork, projection: &Projection, id: NodeId) {
        let edge = network.edges[projection.edge];
        self.coords.insert(id, projection.point);
        self.adjacency.insert(id, Vec::new());
        self.connect(edge.from, id);
        self.connect(edge.to, id);
    }

    fn connect(&mut self, a: NodeId, b: NodeId) {
        let weight = distance(self.coords[&a], self.coords[&b]);
        link(&mut self.adjacency, a, b, weight);
    }

    pub fn coords_of(&self, id: NodeId) -> Option<Point> {
        self.coords.get(&id).copied()
    }
}
