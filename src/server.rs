use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Context;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{future, pin_mut, stream::TryStreamExt, StreamExt};
use native_tls::Identity;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_native_tls::TlsAcceptor;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::config::{ServerConfig, TlsConfig};
use crate::editor::EditError;
use crate::geometry::Point;
use crate::map::{FloorMap, Node, NodeId};
use crate::protocol::{ClientMessage, RoomEntry, ServerMessage};
use crate::routing::{compute_route, describe_route};
use crate::store::MapStore;

type Tx = UnboundedSender<Message>;
type PeerMap = Mutex<HashMap<SocketAddr, Tx>>;

pub struct ServerState {
    peer_map: PeerMap,
    store: Arc<MapStore>,
    node_hit_radius: f64,
    edge_hit_radius: f64,
}

impl ServerState {
    pub fn new(store: Arc<MapStore>, config: &ServerConfig) -> Self {
        ServerState {
            peer_map: Mutex::new(HashMap::new()),
            store,
            node_hit_radius: config.node_hit_radius,
            edge_hit_radius: config.edge_hit_radius,
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<SocketAddr, Tx>> {
        self.peer_map.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_peer(&self, addr: SocketAddr, tx: Tx) {
        self.peers().insert(addr, tx);
    }

    fn remove_peer(&self, addr: SocketAddr) {
        self.peers().remove(&addr);
    }

    fn send_to(&self, addr: SocketAddr, reply: &ServerMessage) {
        let peers = self.peers();
        let Some(peer) = peers.get(&addr) else {
            return;
        };
        if let Err(e) = peer.unbounded_send(Message::text(reply.to_json())) {
            log::debug!("Dropping reply to {addr}: {e}");
        }
    }

    fn broadcast(&self, msg: Message) {
        let peers = self.peers();
        for (addr, peer) in peers.iter() {
            if let Err(e) = peer.unbounded_send(msg.clone()) {
                log::debug!("Dropping broadcast to {addr}: {e}");
            }
        }
    }

    async fn handle_message(&self, addr: SocketAddr, msg: Message) {
        let reply = match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(request) => {
                    log::debug!("{addr} -> {request:?}");
                    self.respond(request).await
                }
                Err(e) => {
                    log::warn!("Malformed message from {addr}: {e}");
                    ServerMessage::error(format!("Malformed message: {e}"))
                }
            },
            Message::Binary(_) => ServerMessage::error("Binary messages are not supported"),
            _ => return,
        };
        self.send_to(addr, &reply);
    }

    /// Answer one request. Requests that change the map publish a new
    /// snapshot, which reaches every peer through the broadcaster.
    pub async fn respond(&self, request: ClientMessage) -> ServerMessage {
        match request {
            ClientMessage::Subscribe => snapshot_message(&self.store.snapshot()),
            ClientMessage::ListRooms => {
                let map = self.store.snapshot();
                rooms_message(map.rooms())
            }
            ClientMessage::SearchRooms { query } => {
                let map = self.store.snapshot();
                rooms_message(map.search_rooms(&query))
            }
            ClientMessage::FindRoute { start, end } => self.find_route(start, end),
            ClientMessage::Locate { x, y } => {
                let map = self.store.snapshot();
                let p = Point::new(x, y);
                let node = map.node_at(p, self.node_hit_radius).cloned();
                let edge = match node {
                    Some(_) => None,
                    None => map.edge_at(p, self.edge_hit_radius),
                };
                ServerMessage::Located { node, edge }
            }
            ClientMessage::AddCorridor { x, y } => self.apply("add corridor", |map| {
                Ok(Some(map.add_corridor_node(Point::new(x, y))))
            }),
            ClientMessage::AddRoom {
                x,
                y,
                name,
                description,
            } => self.apply("add room", |map| {
                map.add_room_node(Point::new(x, y), &name, description.as_deref())
                    .map(Some)
            }),
            ClientMessage::Connect { from, to } => {
                self.apply("connect", |map| map.connect(from, to).map(|_| None))
            }
            ClientMessage::ConnectToEdge { from, edge } => {
                self.apply("connect to edge", |map| {
                    map.connect_to_edge(from, edge).map(Some)
                })
            }
            ClientMessage::RemoveNode { id } => {
                self.apply("remove node", |map| map.remove_node(id).map(|n| Some(n.id)))
            }
            ClientMessage::RemoveEdge { edge } => {
                self.apply("remove edge", |map| map.remove_edge(edge).map(|_| None))
            }
            // A cleared map is written out right away.
            ClientMessage::Clear => {
                let _ = self.store.edit(|map| {
                    map.clear();
                    Ok::<_, Infallible>(())
                });
                log::info!("Edit: clear");
                self.save().await
            }
            ClientMessage::Save => self.save().await,
        }
    }

    async fn save(&self) -> ServerMessage {
        match self.store.save().await {
            Ok(summary) => ServerMessage::Saved {
                nodes: summary.nodes,
                edges: summary.edges,
            },
            Err(e) => {
                log::error!("Save failed: {e:#}");
                ServerMessage::error("Could not save the map.")
            }
        }
    }

    fn apply(
        &self,
        what: &str,
        edit: impl FnOnce(&mut FloorMap) -> Result<Option<NodeId>, EditError>,
    ) -> ServerMessage {
        match self.store.edit(edit) {
            Ok(node) => {
                log::info!("Edit: {what} (node {node:?})");
                ServerMessage::Edited { node }
            }
            Err(e) => {
                log::info!("Rejected edit: {what}: {e}");
                ServerMessage::error(e.to_string())
            }
        }
    }

    fn find_route(&self, start: NodeId, end: NodeId) -> ServerMessage {
        if start == end {
            return route_failed("Start and end locations cannot be the same.");
        }

        // Everything below works on the map as it is right now, whatever
        // edits land meanwhile.
        let map = self.store.snapshot();
        let (Some(start), Some(end)) = (map.node(start), map.node(end)) else {
            return route_failed("Selected location data not found.");
        };

        match compute_route(start, end, &map) {
            Ok(route) => {
                log::debug!(
                    "Route {} -> {}: {} points, length {:.1}",
                    start.id,
                    end.id,
                    route.points.len(),
                    route.length
                );
                ServerMessage::Route {
                    route,
                    message: describe_route(start, end),
                }
            }
            Err(e) => {
                log::info!("No route {} -> {}: {e}", start.id, end.id);
                route_failed(e.to_string())
            }
        }
    }
}

fn route_failed(message: impl Into<String>) -> ServerMessage {
    ServerMessage::RouteFailed {
        message: message.into(),
    }
}

fn snapshot_message(map: &FloorMap) -> ServerMessage {
    ServerMessage::Snapshot { map: map.clone() }
}

fn rooms_message(rooms: Vec<&Node>) -> ServerMessage {
    ServerMessage::Rooms {
        rooms: rooms.into_iter().map(RoomEntry::from).collect(),
    }
}

/// Forward every published map to all connected peers.
async fn broadcast_snapshots(state: Arc<ServerState>, mut updates: watch::Receiver<Arc<FloorMap>>) {
    while updates.changed().await.is_ok() {
        let map = updates.borrow_and_update().clone();
        log::debug!(
            "Publishing map: {} nodes, {} edges",
            map.nodes.len(),
            map.edges.len()
        );
        state.broadcast(Message::text(snapshot_message(&map).to_json()));
    }
}

async fn handle_connection<S>(state: Arc<ServerState>, stream: S, addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            log::warn!("Websocket handshake with {addr} failed: {e}");
            return;
        }
    };
    log::info!("WebSocket connection established: {addr}");

    // Insert the write part of this peer to the peer map.
    let (tx, rx) = unbounded();
    state.add_peer(addr, tx);
    state.send_to(addr, &snapshot_message(&state.store.snapshot()));

    let (outgoing, incoming) = ws_stream.split();

    let handle_incoming = incoming.try_for_each(|msg| {
        let state = state.clone();
        async move {
            state.handle_message(addr, msg).await;
            Ok::<(), tungstenite::Error>(())
        }
    });

    let receive_from_others = rx.map(Ok).forward(outgoing);

    pin_mut!(handle_incoming, receive_from_others);
    future::select(handle_incoming, receive_from_others).await;

    log::info!("{addr} disconnected");
    state.remove_peer(addr);
}

async fn accept_connection(
    state: Arc<ServerState>,
    raw_stream: TcpStream,
    acceptor: Option<TlsAcceptor>,
    addr: SocketAddr,
) {
    log::info!("Incoming TCP connection from: {addr}");

    match acceptor {
        Some(acceptor) => match acceptor.accept(raw_stream).await {
            Ok(stream) => handle_connection(state, stream, addr).await,
            Err(e) => log::warn!("TLS handshake with {addr} failed: {e}"),
        },
        None => handle_connection(state, raw_stream, addr).await,
    }
}

fn load_tls(tls: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
    let der = std::fs::read(&tls.identity)
        .with_context(|| format!("Failed to read TLS identity {}", tls.identity.display()))?;
    let identity = Identity::from_pkcs12(&der, &tls.password)
        .context("TLS identity is not a valid PKCS#12 archive")?;
    let native_acceptor = native_tls::TlsAcceptor::builder(identity).build()?;
    Ok(TlsAcceptor::from(native_acceptor))
}

/// Serve websocket clients until `shutdown` fires.
pub async fn run_server(
    config: ServerConfig,
    store: Arc<MapStore>,
    mut shutdown: mpsc::Receiver<()>,
) -> anyhow::Result<()> {
    let tls_acceptor = config.tls.as_ref().map(load_tls).transpose()?;

    let listener = TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    log::info!(
        "Listening on: {}{}",
        config.listen,
        if tls_acceptor.is_some() { " (tls)" } else { "" }
    );

    let state = Arc::new(ServerState::new(store.clone(), &config));
    tokio::spawn(broadcast_snapshots(state.clone(), store.subscribe()));
    if let Some(interval) = config.sync_interval() {
        tokio::spawn(crate::sync::run_sync(store.clone(), interval));
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tokio::spawn(accept_connection(state.clone(), stream, tls_acceptor.clone(), addr));
                }
                Err(e) => log::warn!("Accept failed: {e}"),
            },
            _ = shutdown.recv() => {
                log::info!("Shutting down");
                return Ok(());
            }
        }
    }
}
