//! Worker Network Protocol
//!
//! Reads are `GET`, mutations `PUT`/`DELETE`. Every endpoint accepts an optional
//! `?shard=<name>` query; a worker that is not serving that shard answers `503` so the
//! caller can re-resolve the holder instead of reading or editing the wrong partition.

use super::types::{NodeRole, PassthroughMatrix};
use crate::graph::types::{Distance, DistanceMap, EdgeId};
use crate::snapshot::versioned::VersionToken;

use serde::{Deserialize, Serialize};

pub const ENDPOINT_PASSTHROUGH: &str = "/passthrough";
pub const ENDPOINT_INTERNAL_CONNECTION: &str = "/internal_connection";
pub const ENDPOINT_DISTANCES: &str = "/distances";
pub const ENDPOINT_ADD_EDGE: &str = "/add_edge";
pub const ENDPOINT_DELETE_EDGE: &str = "/delete_edge";
pub const ENDPOINT_SET_NODE_ROLE: &str = "/set_node_role";

/// Path token meaning "I have no previous version".
pub const NO_TOKEN: &str = "-";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ShardQuery {
    pub shard: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub shard: String,
    pub token: VersionToken,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PassthroughResponse {
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<VersionToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<PassthroughMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionResponse {
    pub distance: Distance,
    pub path: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DistancesResponse {
    pub distances: DistanceMap,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddEdgeResponse {
    pub edge_id: EdgeId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeRoleResponse {
    pub node: String,
    pub role: NodeRole,
    pub changed: bool,
}
