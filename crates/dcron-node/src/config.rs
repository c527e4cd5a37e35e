//! Layered configuration: `config/default.toml` → `config/{environment}.toml`
//! → `config/local.toml` → `DCRON_`-prefixed environment variables.

use config::{Config, Environment, File};
use dcron_core::{DcronError, DcronResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A single node's full configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique cluster-wide node name.
    #[serde(default = "default_name")]
    pub name: String,

    /// This node's peer-transport listen URL (`host:port`), also the value
    /// advertised for DNS-SRV matching and membership.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// This node's client-API listen port.
    #[serde(default = "default_client_port")]
    pub client_port: u16,

    /// HTTP API bind address.
    #[serde(default = "default_api_addr")]
    pub api_addr: String,

    /// Rewrite listen URLs to `0.0.0.0:port` rather than the DNS-resolved host.
    #[serde(default)]
    pub bind_all: bool,

    /// DNS domain SRV records are resolved under.
    #[serde(default = "default_dns_cluster")]
    pub dns_cluster: String,

    /// Election timeout in milliseconds; Put/Delete waits are a multiple of this.
    #[serde(default = "default_election_ms")]
    pub election_ms: u64,

    /// Base data directory; the node's own subdirectory is wiped on every start.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_name() -> String {
    "dcron-node".to_string()
}
fn default_server_url() -> String {
    "127.0.0.1:2380".to_string()
}
fn default_client_port() -> u16 {
    2379
}
fn default_api_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_dns_cluster() -> String {
    String::new()
}
fn default_election_ms() -> u64 {
    500
}
fn default_data_dir() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            server_url: default_server_url(),
            client_port: default_client_port(),
            api_addr: default_api_addr(),
            bind_all: false,
            dns_cluster: default_dns_cluster(),
            election_ms: default_election_ms(),
            data_dir: default_data_dir(),
        }
    }
}

impl NodeConfig {
    /// The directory this node's embedded engine owns exclusively, wiped on
    /// every start: `{data_dir}/dcron/{name}`.
    #[must_use]
    pub fn instance_dir(&self) -> std::path::PathBuf {
        Path::new(&self.data_dir).join("dcron").join(&self.name)
    }
}

/// Loads configuration from `./config/{default,environment,local}.toml`
/// plus `DCRON_`-prefixed environment variables, in that precedence order.
pub fn load(config_dir: &str) -> DcronResult<NodeConfig> {
    if let Err(err) = dotenvy::dotenv() {
        debug!(error = %err, "no .env file found");
    }

    let environment = std::env::var("DCRON_ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    let mut builder = Config::builder();

    let default_path = format!("{config_dir}/default.toml");
    if Path::new(&default_path).exists() {
        builder = builder.add_source(File::with_name(&default_path).required(false));
    }

    let env_path = format!("{config_dir}/{environment}.toml");
    if Path::new(&env_path).exists() {
        builder = builder.add_source(File::with_name(&env_path).required(false));
    }

    let local_path = format!("{config_dir}/local.toml");
    if Path::new(&local_path).exists() {
        builder = builder.add_source(File::with_name(&local_path).required(false));
    }

    builder = builder.add_source(Environment::with_prefix("DCRON").try_parsing(true));

    let config = builder
        .build()
        .map_err(|e| DcronError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| DcronError::Configuration(e.to_string()))
}
