use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::Context;
use tokio::sync::watch;

use crate::map::FloorMap;

/// Owner of the shared floor map.
///
/// Readers get `Arc` snapshots. Edits work on a copy that replaces the
/// shared map only once the edit succeeds, so a route computation never sees
/// a half-applied change.
pub struct MapStore {
    path: PathBuf,
    current: watch::Sender<Arc<FloorMap>>,
    /// Held while a new map is derived from the current one and swapped in.
    write_lock: Mutex<()>,
    /// Held across a whole save or reload; they share the temp file and stamp.
    disk_lock: tokio::sync::Mutex<()>,
    /// Modification time of the file as we last read or wrote it.
    disk_stamp: Mutex<Option<SystemTime>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    pub nodes: usize,
    pub edges: usize,
}

impl MapStore {
    /// Load the map at `path`, or start empty if there is no file yet.
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let (map, stamp) = match read_map(&path).await {
            Ok(loaded) => loaded,
            Err(e) if is_not_found(&e) => {
                log::info!("No saved map at {}, starting empty", path.display());
                (FloorMap::default(), None)
            }
            Err(e) => return Err(e),
        };

        log::info!(
            "Loaded map from {}: {} nodes, {} edges",
            path.display(),
            map.nodes.len(),
            map.edges.len()
        );
        let (current, _) = watch::channel(Arc::new(map));
        Ok(MapStore {
            path,
            current,
            write_lock: Mutex::new(()),
            disk_lock: tokio::sync::Mutex::new(()),
            disk_stamp: Mutex::new(stamp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<FloorMap> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FloorMap>> {
        self.current.subscribe()
    }

    /// Apply an edit and publish the result. Nothing is published when the
    /// edit fails or leaves the map as it was.
    pub fn edit<T, E>(&self, f: impl FnOnce(&mut FloorMap) -> Result<T, E>) -> Result<T, E> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.snapshot();
        let mut draft = FloorMap::clone(&current);
        let value = f(&mut draft)?;
        if draft != *current {
            self.current.send_replace(Arc::new(draft));
        }
        Ok(value)
    }

    /// Write the current map to disk, replacing the file atomically.
    pub async fn save(&self) -> anyhow::Result<SaveSummary> {
        let _disk = self.disk_lock.lock().await;
        let map = self.snapshot();
        let json = map.to_json()?;

        let tmp = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        let stamp = modified(&self.path).await;
        *self.disk_stamp.lock().unwrap_or_else(|e| e.into_inner()) = stamp;

        let summary = SaveSummary {
            nodes: map.nodes.len(),
            edges: map.edges.len(),
        };
        log::info!(
            "Saved map to {}: {} nodes, {} edges",
            self.path.display(),
            summary.nodes,
            summary.edges
        );
        Ok(summary)
    }

    /// Reload the map if the file changed since we last touched it.
    /// Returns whether a new snapshot was published.
    pub async fn reload_if_changed(&self) -> anyhow::Result<bool> {
        let _disk = self.disk_lock.lock().await;
        let on_disk = modified(&self.path).await;
        let known = *self.disk_stamp.lock().unwrap_or_else(|e| e.into_inner());
        if on_disk.is_none() || on_disk == known {
            return Ok(false);
        }

        let (map, stamp) = read_map(&self.path).await?;
        *self.disk_stamp.lock().unwrap_or_else(|e| e.into_inner()) = stamp;
        log::info!(
            "Map file {} changed on disk, reloaded {} nodes, {} edges",
            self.path.display(),
            map.nodes.len(),
            map.edges.len()
        );
        {
            let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
            self.current.send_replace(Arc::new(map));
        }
        Ok(true)
    }
}

async fn read_map(path: &Path) -> anyhow::Result<(FloorMap, Option<SystemTime>)> {
    let stamp = modified(path).await;
    let contents = tokio::fs::read_to_string(path).await?;
    let map = FloorMap::from_json(&contents)
        .with_context(|| format!("Invalid map file {}", path.display()))?;
    Ok((map, stamp))
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}
