use serde::{Deserialize, Serialize};

use crate::map::{Edge, FloorMap, Node, NodeId};
use crate::routing::Route;

/// Requests a viewer or editor sends over the websocket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Ask for the current map right away instead of waiting for the next change.
    Subscribe,
    ListRooms,
    SearchRooms {
        query: String,
    },
    FindRoute {
        start: NodeId,
        end: NodeId,
    },
    AddCorridor {
        x: f64,
        y: f64,
    },
    AddRoom {
        x: f64,
        y: f64,
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
    Connect {
        from: NodeId,
        to: NodeId,
    },
    ConnectToEdge {
        from: NodeId,
        edge: Edge,
    },
    RemoveNode {
        id: NodeId,
    },
    RemoveEdge {
        edge: Edge,
    },
    /// What sits under a point: used by the editor to resolve clicks.
    Locate {
        x: f64,
        y: f64,
    },
    Clear,
    Save,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomEntry {
    pub id: NodeId,
    pub name: String,
    pub label: String,
}

impl From<&Node> for RoomEntry {
    fn from(node: &Node) -> Self {
        RoomEntry {
            id: node.id,
            name: node.name.clone(),
            label: node.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Snapshot {
        map: FloorMap,
    },
    Rooms {
        rooms: Vec<RoomEntry>,
    },
    Route {
        route: Route,
        message: String,
    },
    RouteFailed {
        message: String,
    },
    Located {
        node: Option<Node>,
        edge: Option<Edge>,
    },
    Edited {
        node: Option<NodeId>,
    },
    Saved {
        nodes: usize,
        edges: usize,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Every payload here is plain data with string keys.
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Could not serialize {self:?}: {e}");
            r#"{"type":"error","message":"internal error"}"#.to_string()
        })
    }
}
