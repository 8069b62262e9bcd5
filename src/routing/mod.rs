//! Shortest walking route between two nodes of a floor map.
//!
//! Rooms usually sit off the corridor backbone, so each endpoint is projected
//! onto its nearest corridor edge and spliced into a per-request copy of the
//! network as a virtual node before running Dijkstra between the two.

pub mod dijkstra;
pub mod network;
pub mod projection;
pub mod splice;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{polyline_length, Point};
use crate::map::{FloorMap, Node, NodeId};

use network::CorridorNetwork;
use projection::project_onto_network;
use splice::{WorkingGraph, VIRTUAL_END, VIRTUAL_START};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Start => write!(f, "start"),
            Endpoint::End => write!(f, "end"),
        }
    }
}

/// Why a route could not be produced. All variants are expected outcomes of
/// an incomplete map; retrying against the same map gives the same answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("No corridor path network has been defined by the admin.")]
    NoNetwork,
    #[error("Could not find a connection to the corridor network.")]
    UnreachableEndpoint(Endpoint),
    #[error("A path could not be found between these locations.")]
    NoPath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    /// Start room, the waypoints in walking order, end room.
    pub points: Vec<Point>,
    /// Corridor nodes the route passes through.
    pub via: Vec<NodeId>,
    pub length: f64,
}

/// Route from `start` to `end` over the corridors of `map`.
pub fn compute_route(start: &Node, end: &Node, map: &FloorMap) -> Result<Route, RouteError> {
    let network = CorridorNetwork::build(map)?;

    let project = |node: &Node, endpoint: Endpoint| {
        let projection = project_onto_network(node.position(), &network);
        match projection {
            Some(p) => log::trace!("{endpoint} node {} meets corridor at {:?}", node.id, p.point),
            None => log::debug!("{endpoint} node {} has no corridor to attach to", node.id),
        }
        projection.ok_or(RouteError::UnreachableEndpoint(endpoint))
    };
    let start_proj = project(start, Endpoint::Start)?;
    let end_proj = project(end, Endpoint::End)?;

    let graph = WorkingGraph::splice_endpoints(&network, &start_proj, &end_proj);
    let path = dijkstra::shortest_path(&graph.adjacency, VIRTUAL_START, VIRTUAL_END);
    if path.nodes.is_empty() {
        log::debug!("no path between nodes {} and {}", start.id, end.id);
        return Err(RouteError::NoPath);
    }
    log::trace!(
        "{} corridor hops, network distance {:?}",
        path.nodes.len(),
        path.distance
    );

    Ok(assemble(start, end, &graph, &path.nodes))
}

fn assemble(start: &Node, end: &Node, graph: &WorkingGraph, ids: &[NodeId]) -> Route {
    let mut points = Vec::with_capacity(ids.len() + 2);
    points.push(start.position());
    points.extend(ids.iter().filter_map(|&id| graph.coords_of(id)));
    points.push(end.position());

    let via = ids.iter().copied().filter(|&id| id >= 0).collect();
    let length = polyline_length(&points);
    Route {
        points,
        via,
        length,
    }
}

/// Status line shown next to a freshly found route.
pub fn describe_route(start: &Node, end: &Node) -> String {
    fn with_desc(node: &Node) -> String {
        match node.description() {
            Some(desc) => format!("{} ({})", node.name, desc),
            None => node.name.clone(),
        }
    }
    format!("Path found from {} to {}.", with_desc(start), with_desc(end))
}
