use super::federation::FederatedRouter;
use super::protocol::DistanceResponse;
use super::types::Route;
use crate::error::{ServiceError, ServiceResult};
use crate::graph::types::EdgeId;
use crate::shard::protocol::AddEdgeResponse;

use axum::extract::{Extension, Path};
use axum::{Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_route(
    Extension(router): Extension<Arc<FederatedRouter>>,
    Path((start, end)): Path<(String, String)>,
) -> ServiceResult<Json<Route>> {
    Ok(Json(router.route(&start, &end).await?))
}

pub async fn handle_distance(
    Extension(router): Extension<Arc<FederatedRouter>>,
    Path((start, end)): Path<(String, String)>,
) -> ServiceResult<Json<DistanceResponse>> {
    let distance = router.distance(&start, &end).await?;
    Ok(Json(DistanceResponse { distance }))
}

pub async fn handle_add_edge(
    Extension(router): Extension<Arc<FederatedRouter>>,
    Path((n1, n2, length)): Path<(String, String, String)>,
) -> ServiceResult<Json<AddEdgeResponse>> {
    let length = length
        .parse()
        .map_err(|_| ServiceError::BadRequest(format!("invalid edge length '{}'", length)))?;
    let edge_id = router.add_edge(&n1, &n2, length).await?;
    Ok(Json(AddEdgeResponse { edge_id }))
}

pub async fn handle_delete_edge(
    Extension(router): Extension<Arc<FederatedRouter>>,
    Path(edge_id): Path<String>,
) -> ServiceResult<StatusCode> {
    router.delete_edge(&EdgeId(edge_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
