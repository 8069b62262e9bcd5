use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{distance, project_onto_segment, Point};

/// Node identifier. Persisted nodes are non-negative; negative ids are
/// reserved for request-scoped virtual nodes.
pub type NodeId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Corridor,
    Room,
}

impl NodeKind {
    /// Kind assumed for documents written before nodes carried a type.
    fn infer_from_name(name: &str) -> Self {
        let is_junction = name
            .get(..8)
            .map(|prefix| prefix.eq_ignore_ascii_case("junction"))
            .unwrap_or(false);
        if is_junction {
            NodeKind::Corridor
        } else {
            NodeKind::Room
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredNode")]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub description: Option<String>,
}

/// On-disk node shape, tolerant of missing fields.
#[derive(Deserialize)]
struct StoredNode {
    id: NodeId,
    x: f64,
    y: f64,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<NodeKind>,
    #[serde(default)]
    description: Option<String>,
}

impl From<StoredNode> for Node {
    fn from(stored: StoredNode) -> Self {
        let kind = stored
            .kind
            .unwrap_or_else(|| NodeKind::infer_from_name(&stored.name));
        Node {
            id: stored.id,
            x: stored.x,
            y: stored.y,
            name: stored.name,
            kind,
            description: stored.description,
        }
    }
}

impl Node {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_corridor(&self) -> bool {
        self.kind == NodeKind::Corridor
    }

    /// Description worth showing; an empty one counts as none.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    /// Picker label: `name - description`, or just the name.
    pub fn label(&self) -> String {
        match self.description() {
            Some(desc) => format!("{} - {}", self.name, desc),
            None => self.name.clone(),
        }
    }
}

/// Undirected connection between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Edge { from, to }
    }

    /// Same endpoints regardless of direction.
    pub fn same_segment(&self, other: &Edge) -> bool {
        (self.from == other.from && self.to == other.to)
            || (self.from == other.to && self.to == other.from)
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.from == id || self.to == id
    }

    /// Unordered-pair key, smaller id first.
    pub fn key(&self) -> (NodeId, NodeId) {
        (self.from.min(self.to), self.from.max(self.to))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("node id {0} is negative; negative ids are reserved")]
    NegativeNodeId(NodeId),
    #[error("node id {0} appears more than once")]
    DuplicateNodeId(NodeId),
}

/// The shared floor-map document: every node and edge the editor laid out,
/// plus the counter used to assign the next node id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorMap {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub current_node_id: NodeId,
}

impl FloorMap {
    /// Parse a stored document, applying field defaults and raising the id
    /// counter past every id already in use.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let mut map: FloorMap = serde_json::from_str(json)?;
        map.validate()?;
        map.reconcile_counter();
        Ok(map)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), MapError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node.id < 0 {
                return Err(MapError::NegativeNodeId(node.id));
            }
            if !seen.insert(node.id) {
                return Err(MapError::DuplicateNodeId(node.id));
            }
        }
        Ok(())
    }

    fn reconcile_counter(&mut self) {
        let next = self.nodes.iter().map(|n| n.id + 1).max().unwrap_or(0);
        self.current_node_id = self.current_node_id.max(next);
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn find_edge(&self, edge: &Edge) -> Option<usize> {
        self.edges.iter().position(|e| e.same_segment(edge))
    }

    /// Named rooms in picker order.
    pub fn rooms(&self) -> Vec<&Node> {
        let mut rooms: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Room && !n.name.trim().is_empty())
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    /// Rooms whose name contains `query`, ignoring case. Queries shorter
    /// than two characters match nothing.
    pub fn search_rooms(&self, query: &str) -> Vec<&Node> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < 2 {
            return Vec::new();
        }
        self.rooms()
            .into_iter()
            .filter(|n| n.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Topmost node within `radius` of `p`. Later nodes are drawn over
    /// earlier ones, so they win.
    pub fn node_at(&self, p: Point, radius: f64) -> Option<&Node> {
        self.nodes
            .iter()
            .rev()
            .find(|n| distance(p, n.position()) < radius)
    }

    /// First edge passing within `radius` of `p`.
    pub fn edge_at(&self, p: Point, radius: f64) -> Option<Edge> {
        self.edges.iter().copied().find(|e| {
            match (self.node(e.from), self.node(e.to)) {
                (Some(a), Some(b)) => {
                    let q = project_onto_segment(p, a.position(), b.position());
                    distance(p, q) < radius
                }
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId, name: &str, kind: NodeKind) -> Node {
        Node {
            id,
            x: id as f64 * 10.0,
            y: 0.0,
            name: name.to_string(),
            kind,
            description: None,
        }
    }

    #[test]
    fn missing_type_is_inferred_from_name() {
        let json = r#"{
            "nodes": [
                {"id": 0, "x": 1, "y": 2, "name": "Junction-0"},
                {"id": 1, "x": 3, "y": 4, "name": "junction east"},
                {"id": 2, "x": 5, "y": 6, "name": "JUNCTION"},
                {"id": 3, "x": 7, "y": 8, "name": "148.1"},
                {"id": 4, "x": 9, "y": 9, "name": "Jun"}
            ],
            "edges": []
        }"#;
        let map = FloorMap::from_json(json).unwrap();
        let kinds: Vec<NodeKind> = map.nodes.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Corridor,
                NodeKind::Corridor,
                NodeKind::Corridor,
                NodeKind::Room,
                NodeKind::Room,
            ]
        );
        assert!(map.nodes.iter().all(|n| n.description.is_none()));
    }

    #[test]
    fn explicit_fields_survive_round_trip() {
        let mut lab = node(3, "Junction lab", NodeKind::Room);
        lab.description = Some("Computer lab".to_string());
        let map = FloorMap {
            nodes: vec![node(0, "Junction-0", NodeKind::Corridor), lab],
            edges: vec![Edge::new(0, 3)],
            current_node_id: 4,
        };

        let json = map.to_json().unwrap();
        assert!(json.contains("\"currentNodeId\": 4"));
        assert!(json.contains("\"type\": \"room\""));

        let reloaded = FloorMap::from_json(&json).unwrap();
        assert_eq!(reloaded, map);
    }

    #[test]
    fn empty_description_survives_round_trip() {
        let json = r#"{"nodes": [{"id": 0, "x": 1, "y": 2, "name": "Lab", "type": "room", "description": ""}]}"#;
        let map = FloorMap::from_json(json).unwrap();
        assert_eq!(map.nodes[0].description, Some(String::new()));
        assert_eq!(map.nodes[0].description(), None);

        let reloaded = FloorMap::from_json(&map.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, map);
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let map = FloorMap::from_json("{}").unwrap();
        assert!(map.nodes.is_empty());
        assert!(map.edges.is_empty());
        assert_eq!(map.current_node_id, 0);
    }

    #[test]
    fn counter_moves_past_existing_ids() {
        let json = r#"{"nodes": [{"id": 7, "x": 0, "y": 0, "name": "A"}], "currentNodeId": 2}"#;
        assert_eq!(FloorMap::from_json(json).unwrap().current_node_id, 8);

        let json = r#"{"nodes": [{"id": 7, "x": 0, "y": 0, "name": "A"}], "currentNodeId": 20}"#;
        assert_eq!(FloorMap::from_json(json).unwrap().current_node_id, 20);
    }

    #[test]
    fn rejects_duplicate_and_negative_ids() {
        let map = FloorMap {
            nodes: vec![node(1, "a", NodeKind::Room), node(1, "b", NodeKind::Room)],
            ..Default::default()
        };
        assert_eq!(map.validate(), Err(MapError::DuplicateNodeId(1)));

        let map = FloorMap {
            nodes: vec![node(-1, "a", NodeKind::Room)],
            ..Default::default()
        };
        assert_eq!(map.validate(), Err(MapError::NegativeNodeId(-1)));
    }

    #[test]
    fn rooms_are_named_and_sorted() {
        let map = FloorMap {
            nodes: vec![
                node(0, "Study Area", NodeKind::Room),
                node(1, "Junction-1", NodeKind::Corridor),
                node(2, "   ", NodeKind::Room),
                node(3, "Computer Lab", NodeKind::Room),
            ],
            ..Default::default()
        };
        let names: Vec<&str> = map.rooms().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Computer Lab", "Study Area"]);
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let map = FloorMap {
            nodes: vec![
                node(0, "Conference Room", NodeKind::Room),
                node(1, "Computer Lab", NodeKind::Room),
                node(2, "Study Area", NodeKind::Room),
            ],
            ..Default::default()
        };
        let hits: Vec<NodeId> = map.search_rooms("CO").iter().map(|n| n.id).collect();
        assert_eq!(hits, vec![1, 0]);
        assert!(map.search_rooms("c").is_empty());
        assert!(map.search_rooms("zzz").is_empty());
    }

    #[test]
    fn hit_tests_prefer_latest_node() {
        let mut a = node(0, "a", NodeKind::Corridor);
        let mut b = node(1, "b", NodeKind::Corridor);
        a.x = 0.0;
        b.x = 5.0;
        let c = Node {
            x: 100.0,
            ..node(2, "c", NodeKind::Corridor)
        };
        let map = FloorMap {
            nodes: vec![a, b, c],
            edges: vec![Edge::new(1, 2)],
            current_node_id: 3,
        };

        assert_eq!(map.node_at(Point::new(2.0, 0.0), 12.0).map(|n| n.id), Some(1));
        assert!(map.node_at(Point::new(50.0, 30.0), 12.0).is_none());
        assert_eq!(map.edge_at(Point::new(50.0, 3.0), 5.0), Some(Edge::new(1, 2)));
        assert_eq!(map.edge_at(Point::new(50.0, 6.0), 5.0), None);
    }

    #[test]
    fn edges_compare_as_unordered_pairs() {
        assert!(Edge::new(1, 2).same_segment(&Edge::new(2, 1)));
        assert!(!Edge::new(1, 2).same_segment(&Edge::new(1, 3)));
        assert_eq!(Edge::new(9, 4).key(), (4, 9));
    }

    #[test]
    fn label_includes_description() {
        let mut n = node(0, "148.1", NodeKind::Room);
        assert_eq!(n.label(), "148.1");
        n.description = Some(String::new());
        assert_eq!(n.label(), "148.1");
        n.description = Some("Professor's Office".to_string());
        assert_eq!(n.label(), "148.1 - Professor's Office");
    }
}
