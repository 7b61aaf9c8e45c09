use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An exclusive, expiring grant of one shard to one holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lease {
    pub shard_name: String,
    /// Identity the lease was registered under (the worker's reachable URL).
    pub holder: String,
    /// Lease lifetime in seconds, counted from the grant or the last renewal.
    pub duration: u64,
}

impl Lease {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration)
    }

    /// How long a holder may sleep before renewing.
    pub fn renew_interval(&self) -> Duration {
        self.duration() / 2
    }
}

/// Body of `POST /lease`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRequest {
    pub holder: String,
    /// If set, the shard the caller currently holds and wants extended.
    #[serde(default)]
    pub renew: Option<String>,
}

/// Ownership changes reported by a `LeaseClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseEvent {
    /// This process now holds the shard and may load and mutate it.
    Acquired(String),
    /// This process no longer holds the shard and must stop serving it.
    Lost(String),
}
