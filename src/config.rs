//! Cluster configuration.
//!
//! One TOML file describes the whole cluster: where the namenode listens, the
//! static set of datanodes, the replication factor and block size, plus the
//! timeouts used by placement and replication. The file is located through
//! `--config`, then the `DFS_CONFIG` environment variable, then
//! `config/cluster.toml`. A file named with `--config` must exist; a missing
//! file at the fallback locations yields [`ClusterConfig::default`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cluster::types::{NodeDescriptor, NodeId};
use crate::error::{DfsError, Result};

pub const CONFIG_ENV: &str = "DFS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/cluster.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub namenode: NameNodeConfig,
    /// Datanodes keyed by node id.
    #[serde(default)]
    pub datanodes: BTreeMap<String, EndpointConfig>,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameNodeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_namenode_port")]
    pub port: u16,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Start with an empty namespace instead of failing when the snapshot
    /// exists but cannot be parsed.
    #[serde(default)]
    pub reset_on_corrupt_snapshot: bool,
}

impl Default for NameNodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_namenode_port(),
            snapshot_path: default_snapshot_path(),
            reset_on_corrupt_snapshot: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl EndpointConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default = "default_factor")]
    pub factor: usize,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    /// Largest file the namenode will allocate blocks for.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            factor: default_factor(),
            block_size: default_block_size(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

impl PlacementConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Size of each streamed frame, for client uploads and leader pushes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_replication_timeout_ms")]
    pub replication_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            replication_timeout_ms: default_replication_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TransferConfig {
    pub fn replication_timeout(&self) -> Duration {
        Duration::from_millis(self.replication_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level, falling back to INFO for unknown values.
    pub fn max_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

impl ClusterConfig {
    /// Loads the configuration from `path`, or from the `DFS_CONFIG` /
    /// default location when `path` is `None`. An explicit `path` that does
    /// not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(DfsError::Config(format!(
                        "config file {} not found",
                        p.display()
                    )));
                }
                Self::from_file(p)
            }
            None => {
                let fallback = std::env::var(CONFIG_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
                Self::load_or_default(&fallback)
            }
        }
    }

    /// Reads `path` when it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DfsError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| DfsError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.replication.factor == 0 {
            return Err(DfsError::Config(
                "replication.factor must be at least 1".to_string(),
            ));
        }
        if self.replication.block_size == 0 {
            return Err(DfsError::Config(
                "replication.block_size must be non-zero".to_string(),
            ));
        }
        if self.replication.max_file_size == 0 {
            return Err(DfsError::Config(
                "replication.max_file_size must be non-zero".to_string(),
            ));
        }
        if self.transfer.chunk_size == 0 {
            return Err(DfsError::Config(
                "transfer.chunk_size must be non-zero".to_string(),
            ));
        }
        if self.placement.max_concurrent_probes == 0 {
            return Err(DfsError::Config(
                "placement.max_concurrent_probes must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn namenode_addr(&self) -> String {
        format!("{}:{}", self.namenode.host, self.namenode.port)
    }

    pub fn namenode_url(&self) -> String {
        format!("http://{}", self.namenode_addr())
    }

    /// The configured datanodes as placement candidates, in id order.
    pub fn datanode_descriptors(&self) -> Vec<NodeDescriptor> {
        self.datanodes
            .iter()
            .map(|(id, endpoint)| NodeDescriptor::new(NodeId(id.clone()), endpoint.address()))
            .collect()
    }

    pub fn datanode(&self, node_id: &str) -> Option<&EndpointConfig> {
        self.datanodes.get(node_id)
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_namenode_port() -> u16 {
    8000
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("namenode_state.json")
}

fn default_factor() -> usize {
    2
}

fn default_block_size() -> u64 {
    64 * 1024 * 1024
}

fn default_max_file_size() -> u64 {
    1024 * 1024 * 1024 * 1024
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_chunk_size() -> usize {
    1024 * 1024
}

fn default_replication_timeout_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}
