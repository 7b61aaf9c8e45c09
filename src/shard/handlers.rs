use super::protocol::{
    AddEdgeResponse, ConnectionResponse, DistancesResponse, NO_TOKEN, NodeRoleResponse,
    PassthroughResponse, ShardQuery, StatusResponse,
};
use super::service::ShardGraphService;
use super::types::{NodeRole, PassthroughView};
use crate::error::{ServiceError, ServiceResult};
use crate::graph::types::{Distance, EdgeId};
use crate::snapshot::versioned::VersionToken;

use axum::extract::{Extension, Path, Query};
use axum::{Json, http::StatusCode};
use std::sync::Arc;

fn parse_length(raw: &str) -> ServiceResult<Distance> {
    raw.parse()
        .map_err(|_| ServiceError::BadRequest(format!("invalid edge length '{}'", raw)))
}

pub async fn handle_status(
    Extension(service): Extension<Arc<ShardGraphService>>,
) -> ServiceResult<Json<StatusResponse>> {
    match service.status().await {
        Some((shard, token)) => Ok(Json(StatusResponse { shard, token })),
        None => Err(ServiceError::Unavailable("no shard loaded".to_string())),
    }
}

pub async fn handle_passthrough(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path(last_token): Path<String>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<Json<PassthroughResponse>> {
    service.ensure_serving(query.shard.as_deref()).await?;

    let last = (last_token != NO_TOKEN).then(|| VersionToken(last_token));

    let response = match service.passthrough(last.as_ref()).await? {
        PassthroughView::Unchanged => PassthroughResponse {
            changed: false,
            shard: None,
            token: None,
            matrix: None,
            gateway_list: None,
            nodes: None,
        },
        PassthroughView::Changed(summary) => PassthroughResponse {
            changed: true,
            shard: Some(summary.shard),
            token: Some(summary.token),
            matrix: Some(summary.matrix),
            gateway_list: Some(summary.gateways),
            nodes: Some(summary.nodes),
        },
    };

    Ok(Json(response))
}

pub async fn handle_internal_connection(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path((n1, n2)): Path<(String, String)>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<Json<ConnectionResponse>> {
    service.ensure_serving(query.shard.as_deref()).await?;
    let (distance, path) = service.internal_connection(&n1, &n2).await?;
    Ok(Json(ConnectionResponse { distance, path }))
}

pub async fn handle_distances(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path(n1): Path<String>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<Json<DistancesResponse>> {
    service.ensure_serving(query.shard.as_deref()).await?;
    let distances = service.gateway_distances(&n1).await?;
    Ok(Json(DistancesResponse { distances }))
}

pub async fn handle_add_node(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path((node, role)): Path<(String, String)>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<(StatusCode, Json<NodeRoleResponse>)> {
    let role: NodeRole = role.parse()?;
    service.ensure_serving(query.shard.as_deref()).await?;
    service.add_node(&node, role).await?;

    Ok((
        StatusCode::CREATED,
        Json(NodeRoleResponse {
            node,
            role,
            changed: true,
        }),
    ))
}

pub async fn handle_add_edge(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path((n1, n2, length)): Path<(String, String, String)>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<Json<AddEdgeResponse>> {
    let length = parse_length(&length)?;
    service.ensure_serving(query.shard.as_deref()).await?;
    let edge_id = service.add_edge(&n1, &n2, length).await?;
    Ok(Json(AddEdgeResponse { edge_id }))
}

pub async fn handle_delete_edge(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path(edge_id): Path<String>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<StatusCode> {
    service.ensure_serving(query.shard.as_deref()).await?;
    service.delete_edge(&EdgeId(edge_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_set_node_role(
    Extension(service): Extension<Arc<ShardGraphService>>,
    Path((node, role)): Path<(String, String)>,
    Query(query): Query<ShardQuery>,
) -> ServiceResult<Json<NodeRoleResponse>> {
    let role: NodeRole = role.parse()?;
    service.ensure_serving(query.shard.as_deref()).await?;
    let changed = service.set_node_role(&node, role).await?;
    Ok(Json(NodeRoleResponse { node, role, changed }))
}
