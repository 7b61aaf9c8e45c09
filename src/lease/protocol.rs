//! Manager Network Protocol
//!
//! Endpoints served by the manager. `POST /lease` answers `200` with a `Lease` or
//! `204 No Content` when nothing can be granted.

use serde::{Deserialize, Serialize};

pub const ENDPOINT_LEASE: &str = "/lease";
pub const ENDPOINT_SHARDS: &str = "/shards";
pub const ENDPOINT_HOLDER: &str = "/holder";

#[derive(Debug, Serialize, Deserialize)]
pub struct ShardListResponse {
    pub shards: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HolderResponse {
    pub shard: String,
    pub holder: String,
}
