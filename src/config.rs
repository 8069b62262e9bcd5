use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the websocket listener binds to.
    pub listen: String,
    /// JSON document holding the floor map.
    pub map_path: PathBuf,
    pub tls: Option<TlsConfig>,
    /// How often to check the map file for outside changes. 0 disables it.
    pub sync_interval_ms: u64,
    /// Click tolerance when locating a node, in map pixels.
    pub node_hit_radius: f64,
    /// Click tolerance when locating an edge, in map pixels.
    pub edge_hit_radius: f64,
}

/// PKCS#12 identity used to serve `wss://`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub identity: PathBuf,
    #[serde(default)]
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: "127.0.0.1:2000".to_string(),
            map_path: PathBuf::from("floor-map.json"),
            tls: None,
            sync_interval_ms: 1000,
            node_hit_radius: 12.0,
            edge_hit_radius: 5.0,
        }
    }
}

impl ServerConfig {
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_ms > 0).then(|| Duration::from_millis(self.sync_interval_ms))
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid config {}", path.display()))
}

fn parse_config(contents: &str) -> anyhow::Result<ServerConfig> {
    let config: ServerConfig = serde_json::from_str(contents)?;
    if config.node_hit_radius <= 0.0 || config.edge_hit_radius <= 0.0 {
        anyhow::bail!("hit radii must be positive");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_means_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.sync_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = parse_config(
            r#"{"listen": "0.0.0.0:9000", "tls": {"identity": "id.p12"}, "sync_interval_ms": 0}"#,
        )
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.map_path, PathBuf::from("floor-map.json"));
        assert_eq!(
            config.tls,
            Some(TlsConfig {
                identity: PathBuf::from("id.p12"),
                password: String::new(),
            })
        );
        assert_eq!(config.sync_interval(), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config(r#"{"lisen": "0.0.0.0:9000"}"#).is_err());
    }

    #[test]
    fn radii_must_be_positive() {
        assert!(parse_config(r#"{"edge_hit_radius": 0}"#).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("waymap-config-does-not-exist.json");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config"));
    }
}
