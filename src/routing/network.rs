use std::collections::{HashMap, HashSet};

use crate::geometry::{distance, Point};
use crate::map::{Edge, FloorMap, NodeId};

use super::dijkstra::Neighbor;
use super::RouteError;

pub type Adjacency = HashMap<NodeId, Vec<Neighbor<NodeId>>>;

/// The walkable backbone of a floor map: corridor nodes and the edges
/// running between them, weighted by their length.
#[derive(Debug, Clone)]
pub struct CorridorNetwork {
    pub adjacency: Adjacency,
    pub coords: HashMap<NodeId, Point>,
    /// Corridor edges, one per segment. Indices into this list identify
    /// edges for the rest of the request.
    pub edges: Vec<Edge>,
}

impl CorridorNetwork {
    /// Fails with [`RouteError::NoNetwork`] when no edge joins two corridor
    /// nodes.
    pub fn build(map: &FloorMap) -> Result<Self, RouteError> {
        let mut adjacency = Adjacency::new();
        let mut coords = HashMap::new();
        for node in map.nodes.iter().filter(|n| n.is_corridor()) {
            adjacency.insert(node.id, Vec::new());
            coords.insert(node.id, node.position());
        }

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for edge in &map.edges {
            let (Some(&a), Some(&b)) = (coords.get(&edge.from), coords.get(&edge.to)) else {
                continue;
            };
            if edge.from == edge.to || !seen.insert(edge.key()) {
                continue;
            }
            link(&mut adjacency, edge.from, edge.to, distance(a, b));
            edges.push(*edge);
        }

        if edges.is_empty() {
            return Err(RouteError::NoNetwork);
        }

        log::trace!(
            "corridor network: {} nodes, {} edges",
            coords.len(),
            edges.len()
        );

        Ok(CorridorNetwork {
            adjacency,
            coords,
            edges,
        })
    }

    pub fn endpoints(&self, edge: usize) -> (Point, Point) {
        let e = self.edges[edge];
        (self.coords[&e.from], self.coords[&e.to])
    }
}

pub(super) fn link(adjacency: &mut Adjacency, a: NodeId, b: NodeId, weight: f64) {
    adjacency.entry(a).or_default().push(Neighbor { id: b, weight });
    adjacency.entry(b).or_default().push(Neighbor { id: a, weight });
}

pub(super) fn unlink(adjacency: &mut Adjacency, a: NodeId, b: NodeId) {
    if let Some(list) = adjacency.get_mut(&a) {
        list.retain(|n| n.id != b);
    }
    if let Some(list) = adjacency.get_mut(&b) {
        list.retain(|n| n.id != a);
    }
}
