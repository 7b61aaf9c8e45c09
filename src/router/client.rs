//! Shard Access
//!
//! `ShardClient` is everything the router needs from the shards. `HttpShardClient` asks the
//! manager which worker holds a shard, caches the answer and calls that worker with
//! `?shard=<name>`. A worker answering `503` no longer serves the shard; the holder is then
//! re-resolved once and the call repeated.

use crate::error::{ServiceError, ServiceResult};
use crate::graph::types::{Distance, DistanceMap, EdgeId};
use crate::http::{PeerClient, decode, ensure_success, segment};
use crate::lease::protocol::{ENDPOINT_HOLDER, ENDPOINT_SHARDS, HolderResponse, ShardListResponse};
use crate::shard::protocol::{
    AddEdgeResponse, ConnectionResponse, DistancesResponse, ENDPOINT_ADD_EDGE,
    ENDPOINT_DELETE_EDGE, ENDPOINT_DISTANCES, ENDPOINT_INTERNAL_CONNECTION, ENDPOINT_PASSTHROUGH,
    ENDPOINT_SET_NODE_ROLE, NO_TOKEN, NodeRoleResponse, PassthroughResponse,
};
use crate::shard::types::{NodeRole, PassthroughView, ShardSummary};
use crate::snapshot::versioned::VersionToken;

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;

#[async_trait]
pub trait ShardClient: Send + Sync {
    /// Every shard of the federation, in a stable order.
    async fn shards(&self) -> ServiceResult<Vec<String>>;

    async fn passthrough(
        &self,
        shard: &str,
        last: Option<&VersionToken>,
    ) -> ServiceResult<PassthroughView>;

    async fn internal_connection(
        &self,
        shard: &str,
        n1: &str,
        n2: &str,
    ) -> ServiceResult<(Distance, Vec<String>)>;

    async fn gateway_distances(&self, shard: &str, node: &str) -> ServiceResult<DistanceMap>;

    async fn add_edge(
        &self,
        shard: &str,
        n1: &str,
        n2: &str,
        length: Distance,
    ) -> ServiceResult<EdgeId>;

    async fn delete_edge(&self, shard: &str, id: &EdgeId) -> ServiceResult<()>;

    async fn set_node_role(&self, shard: &str, node: &str, role: NodeRole) -> ServiceResult<bool>;
}

#[derive(Clone, Copy)]
enum Method {
    Get,
    Put,
    Delete,
}

pub struct HttpShardClient {
    peers: PeerClient,
    manager_url: String,
    /// shard -> base URL of the worker last known to hold it
    holders: DashMap<String, String>,
}

impl HttpShardClient {
    pub fn new(peers: PeerClient, manager_url: impl Into<String>) -> Self {
        Self {
            peers,
            manager_url: manager_url.into().trim_end_matches('/').to_string(),
            holders: DashMap::new(),
        }
    }

    async fn holder(&self, shard: &str, refresh: bool) -> ServiceResult<String> {
        let cached = self.holders.get(shard).map(|url| url.value().clone());
        if let (false, Some(url)) = (refresh, cached) {
            return Ok(url);
        }

        let url = format!("{}{}/{}", self.manager_url, ENDPOINT_HOLDER, segment(shard));
        let response: HolderResponse = decode(self.peers.get_with_retry(&url).await?).await?;
        let holder = response.holder.trim_end_matches('/').to_string();

        tracing::debug!("Shard {} is served by {}", shard, holder);
        self.holders.insert(shard.to_string(), holder.clone());
        Ok(holder)
    }

    /// Sends `path` to the holder of `shard`, re-resolving the holder once on `503`.
    async fn request(
        &self,
        shard: &str,
        method: Method,
        path: &str,
    ) -> ServiceResult<reqwest::Response> {
        for refresh in [false, true] {
            let holder = self.holder(shard, refresh).await?;
            let url = format!("{}{}?shard={}", holder, path, segment(shard));

            let result = match method {
                Method::Get => self.peers.get_with_retry(&url).await,
                Method::Put => self.peers.put_once(&url).await,
                Method::Delete => self.peers.delete_once(&url).await,
            };

            match result {
                Ok(response)
                    if response.status() == StatusCode::SERVICE_UNAVAILABLE && !refresh =>
                {
                    tracing::info!("{} no longer serves {}, resolving again", holder, shard);
                    self.holders.remove(shard);
                }
                Ok(response) => return Ok(response),
                Err(e) => {
                    if e.is_retryable() {
                        self.holders.remove(shard);
                    }
                    return Err(e);
                }
            }
        }

        Err(ServiceError::Unavailable(format!("no worker serves {}", shard)))
    }
}

#[async_trait]
impl ShardClient for HttpShardClient {
    async fn shards(&self) -> ServiceResult<Vec<String>> {
        let url = format!("{}{}", self.manager_url, ENDPOINT_SHARDS);
        let response: ShardListResponse = decode(self.peers.get_with_retry(&url).await?).await?;
        Ok(response.shards)
    }

    async fn passthrough(
        &self,
        shard: &str,
        last: Option<&VersionToken>,
    ) -> ServiceResult<PassthroughView> {
        let token = last.map(|t| segment(t.as_str())).unwrap_or_else(|| NO_TOKEN.to_string());
        let path = format!("{}/{}", ENDPOINT_PASSTHROUGH, token);
        let response: PassthroughResponse =
            decode(self.request(shard, Method::Get, &path).await?).await?;

        if !response.changed {
            return Ok(PassthroughView::Unchanged);
        }

        match (response.token, response.matrix, response.gateway_list, response.nodes) {
            (Some(token), Some(matrix), Some(gateways), Some(nodes)) => {
                Ok(PassthroughView::Changed(ShardSummary {
                    shard: response.shard.unwrap_or_else(|| shard.to_string()),
                    token,
                    matrix,
                    gateways,
                    nodes,
                }))
            }
            _ => Err(ServiceError::Internal(anyhow!(
                "incomplete passthrough payload from {}",
                shard
            ))),
        }
    }

    async fn internal_connection(
        &self,
        shard: &str,
        n1: &str,
        n2: &str,
    ) -> ServiceResult<(Distance, Vec<String>)> {
        let path = format!("{}/{}/{}", ENDPOINT_INTERNAL_CONNECTION, segment(n1), segment(n2));
        let response: ConnectionResponse =
            decode(self.request(shard, Method::Get, &path).await?).await?;
        Ok((response.distance, response.path))
    }

    async fn gateway_distances(&self, shard: &str, node: &str) -> ServiceResult<DistanceMap> {
        let path = format!("{}/{}", ENDPOINT_DISTANCES, segment(node));
        let response: DistancesResponse =
            decode(self.request(shard, Method::Get, &path).await?).await?;
        Ok(response.distances)
    }

    async fn add_edge(
        &self,
        shard: &str,
        n1: &str,
        n2: &str,
        length: Distance,
    ) -> ServiceResult<EdgeId> {
        let path = format!("{}/{}/{}/{}", ENDPOINT_ADD_EDGE, segment(n1), segment(n2), length);
        let response: AddEdgeResponse =
            decode(self.request(shard, Method::Put, &path).await?).await?;
        Ok(response.edge_id)
    }

    async fn delete_edge(&self, shard: &str, id: &EdgeId) -> ServiceResult<()> {
        let path = format!("{}/{}", ENDPOINT_DELETE_EDGE, segment(&id.0));
        ensure_success(self.request(shard, Method::Delete, &path).await?).await?;
        Ok(())
    }

    async fn set_node_role(&self, shard: &str, node: &str, role: NodeRole) -> ServiceResult<bool> {
        let path = format!("{}/{}/{}", ENDPOINT_SET_NODE_ROLE, segment(node), role);
        let response: NodeRoleResponse =
            decode(self.request(shard, Method::Put, &path).await?).await?;
        Ok(response.changed)
    }
}
