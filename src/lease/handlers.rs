use super::coordinator::LeaseCoordinator;
use super::protocol::{HolderResponse, ShardListResponse};
use super::types::LeaseRequest;
use crate::error::{ServiceError, ServiceResult};

use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;

pub async fn handle_lease(
    Extension(coordinator): Extension<Arc<LeaseCoordinator>>,
    Json(req): Json<LeaseRequest>,
) -> Response {
    match coordinator.lease(&req.holder, req.renew.as_deref()).await {
        Ok(Some(lease)) => (StatusCode::OK, Json(lease)).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!("Lease request from {} failed: {}", req.holder, e);
            ServiceError::Unavailable(format!("coordination store: {}", e)).into_response()
        }
    }
}

pub async fn handle_list_shards(
    Extension(coordinator): Extension<Arc<LeaseCoordinator>>,
) -> Json<ShardListResponse> {
    Json(ShardListResponse {
        shards: coordinator.shards().to_vec(),
    })
}

pub async fn handle_get_holder(
    Extension(coordinator): Extension<Arc<LeaseCoordinator>>,
    Path(shard): Path<String>,
) -> ServiceResult<Json<HolderResponse>> {
    if !coordinator.shards().contains(&shard) {
        return Err(ServiceError::UnknownShard(shard));
    }

    match coordinator.holder(&shard).await {
        Ok(Some(holder)) => Ok(Json(HolderResponse { shard, holder })),
        Ok(None) => Err(ServiceError::Unavailable(format!(
            "shard {} has no live holder",
            shard
        ))),
        Err(e) => Err(ServiceError::Unavailable(format!(
            "coordination store: {}",
            e
        ))),
    }
}
