//! Command line and environment configuration.
//!
//! One binary runs any process role. Every option can also be set through the
//! environment variable named next to it.

use crate::netgen::NetworkParams;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub role: Role,
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000", global = true)]
    pub bind: SocketAddr,

    /// Directory shared by all processes as the snapshot store. In-memory when unset
    #[arg(long, env = "BLOB_DIR", global = true)]
    pub blob_dir: Option<PathBuf>,

    /// Timeout applied to every outbound request
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 2000, global = true)]
    pub request_timeout_ms: u64,
}

impl CommonArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Subcommand, Debug)]
pub enum Role {
    /// Grant and renew shard leases
    Manager(ManagerArgs),
    /// Lease a shard and serve its graph
    Worker(WorkerArgs),
    /// Answer federation-wide route and distance queries
    Router(RouterArgs),
    /// Write a random federated network into the snapshot store
    Seed(SeedArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ManagerArgs {
    /// Lease lifetime in seconds
    #[arg(long, env = "LEASE_DURATION_SECS", default_value_t = 5)]
    pub lease_duration_secs: u64,

    /// Shards to manage in addition to those found in the snapshot store
    #[arg(long, env = "SHARDS", value_delimiter = ',')]
    pub shards: Vec<String>,
}

impl ManagerArgs {
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    /// Base URL of the manager
    #[arg(long, env = "MANAGER_URL", default_value = "http://127.0.0.1:7000")]
    pub manager: String,

    /// URL other processes reach this worker at; doubles as its lease identity
    #[arg(long, env = "POD_URL")]
    pub advertise: Option<String>,

    /// Pause between refused lease requests, in seconds
    #[arg(long, env = "LEASE_RETRY_SECS", default_value_t = 2)]
    pub retry_backoff_secs: u64,
}

impl WorkerArgs {
    pub fn identity(&self, bind: SocketAddr) -> String {
        self.advertise
            .clone()
            .unwrap_or_else(|| format!("http://{}", bind))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RouterArgs {
    /// Base URL of the manager
    #[arg(long, env = "MANAGER_URL", default_value = "http://127.0.0.1:7000")]
    pub manager: String,
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    #[arg(long, default_value_t = 3)]
    pub groups: usize,
    #[arg(long, default_value_t = 5)]
    pub min_nodes: usize,
    #[arg(long, default_value_t = 7)]
    pub max_nodes: usize,
    #[arg(long, default_value_t = 2)]
    pub max_gateways: usize,
    #[arg(long, default_value_t = 3)]
    pub max_extra_internal: usize,
    #[arg(long, default_value_t = 2)]
    pub max_extra_external: usize,
    #[arg(long, default_value_t = 1)]
    pub min_length: u64,
    #[arg(long, default_value_t = 10)]
    pub max_length: u64,

    /// RNG seed for a reproducible network
    #[arg(long)]
    pub seed: Option<u64>,
}

impl SeedArgs {
    pub fn params(&self) -> anyhow::Result<NetworkParams> {
        if self.min_nodes > self.max_nodes {
            return Err(anyhow!("--min-nodes must not exceed --max-nodes"));
        }
        if self.min_length > self.max_length {
            return Err(anyhow!("--min-length must not exceed --max-length"));
        }

        Ok(NetworkParams {
            groups: self.groups,
            min_nodes: self.min_nodes,
            max_nodes: self.max_nodes,
            max_gateways: self.max_gateways,
            max_extra_internal: self.max_extra_internal,
            max_extra_external: self.max_extra_external,
            min_length: self.min_length,
            max_length: self.max_length,
        })
    }
}
