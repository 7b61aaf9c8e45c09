//! Object naming in the blob store.
//!
//! ```text
//! shards/<shard>/topology.json        shard topology snapshot
//! shards/<shard>/topology.json.lock   its version token
//! federation/edges.json               inter-shard edge set
//! federation/edges.json.lock          its version token
//! ```

use super::store::BlobStore;

use anyhow::Result;
use std::collections::BTreeSet;

pub const SHARDS_PREFIX: &str = "shards/";
pub const FEDERATION_EDGES_PATH: &str = "federation/edges.json";

pub fn shard_topology_path(shard: &str) -> String {
    format!("{}{}/topology.json", SHARDS_PREFIX, shard)
}

/// Shard names that have at least one object stored under `shards/<name>/`.
pub async fn discover_shards(blobs: &dyn BlobStore) -> Result<Vec<String>> {
    let names: BTreeSet<String> = blobs
        .list(SHARDS_PREFIX)
        .await?
        .into_iter()
        .filter_map(|name| {
            name.strip_prefix(SHARDS_PREFIX)
                .and_then(|rest| rest.split_once('/'))
                .map(|(shard, _)| shard.to_string())
        })
        .filter(|shard| !shard.is_empty())
        .collect();

    Ok(names.into_iter().collect())
}
