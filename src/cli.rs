use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tokio::sync::mpsc;

use crate::config::{load_config, ServerConfig};
use crate::map::{FloorMap, Node, NodeKind};
use crate::routing::{compute_route, describe_route};
use crate::server;
use crate::store::MapStore;

#[derive(Parser, Debug)]
#[command(name = "waymap", version, about = "Indoor wayfinding server for floor-plan corridor maps")]
#[command(long_about = "Indoor wayfinding server for floor-plan corridor maps.\n\n\
    Examples:\n  \
    waymap                                Serve with defaults (127.0.0.1:2000, floor-map.json)\n  \
    waymap serve --listen 0.0.0.0:2000   Serve on all interfaces\n  \
    waymap route \"148.1\" \"Study Area\"     Print the route between two rooms")]
pub struct Cli {
    /// Config JSON file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the map and answer route requests over websockets (default)
    Serve {
        /// Address to listen on
        #[arg(long)]
        listen: Option<String>,

        /// Floor map JSON document
        #[arg(long)]
        map: Option<PathBuf>,
    },

    /// Compute one route from a map file and print it as JSON
    Route {
        /// Floor map JSON document
        #[arg(long)]
        map: Option<PathBuf>,

        /// Start node: an id or a room name
        start: String,

        /// End node: an id or a room name
        end: String,
    },
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Warn;
        }
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = load_config(self.config.as_deref())?;
        match self.command {
            None => serve(config).await,
            Some(Commands::Serve { listen, map }) => {
                if let Some(listen) = listen {
                    config.listen = listen;
                }
                if let Some(map) = map {
                    config.map_path = map;
                }
                serve(config).await
            }
            Some(Commands::Route { map, start, end }) => {
                let path = map.unwrap_or(config.map_path);
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let map = FloorMap::from_json(&contents)
                    .with_context(|| format!("Invalid map file {}", path.display()))?;
                print_route(&map, &start, &end)
            }
        }
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let store = Arc::new(MapStore::open(&config.map_path).await?);

    let (tx, rx) = mpsc::channel(1);
    let mut handle = tokio::spawn(server::run_server(config, store, rx));

    tokio::select! {
        result = &mut handle => return result?,
        _ = stop_requested() => {}
    }

    let _ = tx.send(()).await;
    handle.await?
}

/// Resolves on Ctrl-C, or on a line typed at the terminal.
async fn stop_requested() {
    let enter = async {
        let read = tokio::task::spawn_blocking(|| {
            let mut buffer = String::new();
            std::io::stdin().read_line(&mut buffer)
        })
        .await;
        match read {
            Ok(Ok(n)) if n > 0 => {}
            // No terminal attached: only a signal stops us.
            _ => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = enter => log::info!("Stop requested from stdin"),
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted"),
    }
}

fn print_route(map: &FloorMap, start: &str, end: &str) -> anyhow::Result<()> {
    let start = resolve_node(map, start)?;
    let end = resolve_node(map, end)?;
    if start.id == end.id {
        anyhow::bail!("Start and end locations cannot be the same.");
    }

    let route = compute_route(start, end, map)?;
    log::info!("{}", describe_route(start, end));
    println!("{}", serde_json::to_string_pretty(&route)?);
    Ok(())
}

/// Look a node up by id, falling back to a room name (ignoring case).
fn resolve_node<'a>(map: &'a FloorMap, key: &str) -> anyhow::Result<&'a Node> {
    let by_id = key.trim().parse().ok().and_then(|id| map.node(id));
    by_id
        .or_else(|| {
            map.nodes
                .iter()
                .find(|n| n.kind == NodeKind::Room && n.name.eq_ignore_ascii_case(key.trim()))
        })
        .ok_or_else(|| anyhow::anyhow!("No node or room named '{key}'"))
}
