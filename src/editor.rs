use thiserror::Error;

use crate::geometry::{project_onto_segment, Point};
use crate::map::{Edge, FloorMap, Node, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("no node with id {0}")]
    UnknownNode(NodeId),
    #[error("node {0} is not a corridor node; edges only join corridor nodes")]
    NotCorridor(NodeId),
    #[error("cannot connect node {0} to itself")]
    SelfLoop(NodeId),
    #[error("no edge between {} and {}", .0.from, .0.to)]
    UnknownEdge(Edge),
    #[error("node {0} is already an endpoint of that edge")]
    SharesEndpoint(NodeId),
    #[error("room name must not be empty")]
    EmptyName,
}

impl FloorMap {
    fn next_id(&mut self) -> NodeId {
        let id = self.current_node_id;
        self.current_node_id += 1;
        id
    }

    fn corridor(&self, id: NodeId) -> Result<&Node, EditError> {
        let node = self.node(id).ok_or(EditError::UnknownNode(id))?;
        if !node.is_corridor() {
            return Err(EditError::NotCorridor(id));
        }
        Ok(node)
    }

    fn push_junction(&mut self, at: Point) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node {
            id,
            x: at.x,
            y: at.y,
            name: format!("Junction-{id}"),
            kind: NodeKind::Corridor,
            description: None,
        });
        id
    }

    pub fn add_corridor_node(&mut self, at: Point) -> NodeId {
        self.push_junction(at)
    }

    pub fn add_room_node(
        &mut self,
        at: Point,
        name: &str,
        description: Option<&str>,
    ) -> Result<NodeId, EditError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditError::EmptyName);
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let id = self.next_id();
        self.nodes.push(Node {
            id,
            x: at.x,
            y: at.y,
            name: name.to_string(),
            kind: NodeKind::Room,
            description,
        });
        Ok(id)
    }

    /// Join two corridor nodes. Returns `false` when they were already
    /// joined.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<bool, EditError> {
        self.corridor(a)?;
        self.corridor(b)?;
        if a == b {
            return Err(EditError::SelfLoop(a));
        }

        let edge = Edge::new(a, b);
        if self.find_edge(&edge).is_some() {
            return Ok(false);
        }
        self.edges.push(edge);
        Ok(true)
    }

    /// Tee `from` into an existing edge: a new junction is placed where
    /// `from` projects onto the edge, the edge is split there, and `from` is
    /// joined to the junction.
    pub fn connect_to_edge(&mut self, from: NodeId, edge: Edge) -> Result<NodeId, EditError> {
        let index = self.find_edge(&edge).ok_or(EditError::UnknownEdge(edge))?;
        let existing = self.edges[index];
        let origin = self.corridor(from)?.position();
        let a = self.node(existing.from).ok_or(EditError::UnknownNode(existing.from))?;
        let b = self.node(existing.to).ok_or(EditError::UnknownNode(existing.to))?;
        if existing.touches(from) {
            return Err(EditError::SharesEndpoint(from));
        }

        let at = project_onto_segment(origin, a.position(), b.position());
        let junction = self.push_junction(at);
        self.edges.remove(index);
        for id in [from, existing.from, existing.to] {
            let edge = Edge::new(id, junction);
            if self.find_edge(&edge).is_none() {
                self.edges.push(edge);
            }
        }
        Ok(junction)
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, EditError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(EditError::UnknownNode(id))?;
        self.edges.retain(|e| !e.touches(id));
        Ok(self.nodes.remove(index))
    }

    pub fn remove_edge(&mut self, edge: Edge) -> Result<(), EditError> {
        let index = self.find_edge(&edge).ok_or(EditError::UnknownEdge(edge))?;
        self.edges.remove(index);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.current_node_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_line() -> FloorMap {
        let mut map = FloorMap::default();
        let a = map.add_corridor_node(Point::new(0.0, 0.0));
        let b = map.add_corridor_node(Point::new(10.0, 0.0));
        map.connect(a, b).unwrap();
        map
    }

    #[test]
    fn corridor_nodes_are_auto_named() {
        let mut map = FloorMap::default();
        let id = map.add_corridor_node(Point::new(1.0, 2.0));
        assert_eq!(id, 0);
        assert_eq!(map.nodes[0].name, "Junction-0");
        assert_eq!(map.nodes[0].kind, NodeKind::Corridor);
        assert_eq!(map.current_node_id, 1);
    }

    #[test]
    fn room_names_are_trimmed_and_required() {
        let mut map = FloorMap::default();
        assert_eq!(
            map.add_room_node(Point::default(), "   ", None),
            Err(EditError::EmptyName)
        );
        assert_eq!(map.current_node_id, 0);

        let id = map
            .add_room_node(Point::default(), " 148.1 ", Some(""))
            .unwrap();
        let room = map.node(id).unwrap();
        assert_eq!(room.name, "148.1");
        assert_eq!(room.description, None);
        assert_eq!(room.kind, NodeKind::Room);
    }

    #[test]
    fn connect_rejects_rooms_self_loops_and_duplicates() {
        let mut map = map_with_line();
        let room = map
            .add_room_node(Point::new(5.0, 5.0), "Lab", None)
            .unwrap();

        assert_eq!(map.connect(0, room), Err(EditError::NotCorridor(room)));
        assert_eq!(map.connect(0, 0), Err(EditError::SelfLoop(0)));
        assert_eq!(map.connect(0, 99), Err(EditError::UnknownNode(99)));
        assert_eq!(map.connect(1, 0), Ok(false));
        assert_eq!(map.edges.len(), 1);
    }

    #[test]
    fn connect_to_edge_splits_at_projection() {
        let mut map = map_with_line();
        let c = map.add_corridor_node(Point::new(4.0, 6.0));

        let junction = map.connect_to_edge(c, Edge::new(1, 0)).unwrap();
        let node = map.node(junction).unwrap();
        assert_eq!(node.position(), Point::new(4.0, 0.0));
        assert_eq!(node.name, format!("Junction-{junction}"));

        assert!(map.find_edge(&Edge::new(0, 1)).is_none());
        for id in [0, 1, c] {
            assert!(map.find_edge(&Edge::new(id, junction)).is_some());
        }
        assert_eq!(map.edges.len(), 3);
    }

    #[test]
    fn connect_to_edge_rejects_own_edge() {
        let mut map = map_with_line();
        assert_eq!(
            map.connect_to_edge(0, Edge::new(0, 1)),
            Err(EditError::SharesEndpoint(0))
        );
        assert_eq!(
            map.connect_to_edge(0, Edge::new(0, 7)),
            Err(EditError::UnknownEdge(Edge::new(0, 7)))
        );
    }

    #[test]
    fn removing_a_node_drops_its_edges() {
        let mut map = map_with_line();
        let c = map.add_corridor_node(Point::new(20.0, 0.0));
        map.connect(1, c).unwrap();

        let removed = map.remove_node(1).unwrap();
        assert_eq!(removed.id, 1);
        assert!(map.edges.is_empty());
        assert_eq!(map.remove_node(1), Err(EditError::UnknownNode(1)));
    }

    #[test]
    fn remove_edge_ignores_direction() {
        let mut map = map_with_line();
        map.remove_edge(Edge::new(1, 0)).unwrap();
        assert!(map.edges.is_empty());
        assert!(map.remove_edge(Edge::new(0, 1)).is_err());
    }

    #[test]
    fn clear_resets_counter() {
        let mut map = map_with_line();
        map.clear();
        assert_eq!(map, FloorMap::default());
    }
}
