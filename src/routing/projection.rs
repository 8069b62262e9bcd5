use crate::geometry::{distance, project_onto_segment, Point};

use super::network::CorridorNetwork;

/// Where a point meets the corridor network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Index into [`CorridorNetwork::edges`].
    pub edge: usize,
    pub point: Point,
    pub distance: f64,
}

/// Nearest point on any corridor edge to `p`.
///
/// Only a strictly smaller distance replaces the current best, so in an exact
/// tie the edge listed first is kept. Returns `None` when the network has no
/// edges.
pub fn project_onto_network(p: Point, network: &CorridorNetwork) -> Option<Projection> {
    let mut best: Option<Projection> = None;
    for edge in 0..network.edges.len() {
        let (a, b) = network.endpoints(edge);
        let point = project_onto_segment(p, a, b);
        let d = distance(p, point);
        if best.map_or(true, |current| d < current.distance) {
            best = Some(Projection {
                edge,
                point,
                distance: d,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::map::Edge;

    fn network(coords: &[(i64, f64, f64)], edges: &[(i64, i64)]) -> CorridorNetwork {
        CorridorNetwork {
            adjacency: HashMap::new(),
            coords: coords
                .iter()
                .map(|&(id, x, y)| (id, Point::new(x, y)))
                .collect(),
            edges: edges.iter().map(|&(a, b)| Edge::new(a, b)).collect(),
        }
    }

    #[test]
    fn finds_nearest_edge() {
        // An L: 0-1 along the x axis, 1-2 going up.
        let net = network(
            &[(0, 0.0, 0.0), (1, 10.0, 0.0), (2, 10.0, 10.0)],
            &[(0, 1), (1, 2)],
        );

        let hit = project_onto_network(Point::new(4.0, 2.0), &net).unwrap();
        assert_eq!(hit.edge, 0);
        assert_eq!(hit.point, Point::new(4.0, 0.0));
        assert_eq!(hit.distance, 2.0);

        let hit = project_onto_network(Point::new(13.0, 7.0), &net).unwrap();
        assert_eq!(hit.edge, 1);
        assert_eq!(hit.point, Point::new(10.0, 7.0));
        assert_eq!(hit.distance, 3.0);
    }

    #[test]
    fn projection_clamps_to_endpoint() {
        let net = network(&[(0, 0.0, 0.0), (1, 10.0, 0.0)], &[(0, 1)]);
        let hit = project_onto_network(Point::new(13.0, 4.0), &net).unwrap();
        assert_eq!(hit.point, Point::new(10.0, 0.0));
        assert_eq!(hit.distance, 5.0);
    }

    #[test]
    fn exact_tie_keeps_first_edge() {
        // Both edges share node 1; a point beyond it projects onto 1 for both.
        let net = network(
            &[(0, 0.0, 0.0), (1, 10.0, 0.0), (2, 20.0, 0.0)],
            &[(0, 1), (1, 2)],
        );
        let hit = project_onto_network(Point::new(10.0, 5.0), &net).unwrap();
        assert_eq!(hit.edge, 0);
        assert_eq!(hit.point, Point::new(10.0, 0.0));
    }

    #[test]
    fn empty_network_has_no_projection() {
        let net = network(&[(0, 0.0, 0.0)], &[]);
        assert_eq!(project_onto_network(Point::new(1.0, 1.0), &net), None);
    }
}
