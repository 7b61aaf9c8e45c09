//! Service Error Taxonomy
//!
//! Every failure a caller can act on has its own variant and its own HTTP status. The
//! JSON body carries a machine-readable `kind` plus the subjects (node, edge, endpoints)
//! so a client on the far side of a hop can rebuild the same variant.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("unknown edge: {0}")]
    UnknownEdge(String),

    #[error("unknown shard: {0}")]
    UnknownShard(String),

    #[error("node already exists: {0}")]
    NodeExists(String),

    /// The caller does not hold the lease for the shard it tried to mutate.
    #[error("not authoritative: {0}")]
    Unauthorized(String),

    /// Well-formed query whose endpoints are disconnected.
    #[error("no route from {from} to {to}")]
    NoRoute { from: String, to: String },

    /// A peer, the coordination store or the blob store could not be reached in time.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Wire form of a `ServiceError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::UnknownNode(_) => "unknown_node",
            ServiceError::UnknownEdge(_) => "unknown_edge",
            ServiceError::UnknownShard(_) => "unknown_shard",
            ServiceError::NodeExists(_) => "node_exists",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::NoRoute { .. } => "no_route",
            ServiceError::Unavailable(_) => "unavailable",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::UnknownNode(_)
            | ServiceError::UnknownEdge(_)
            | ServiceError::UnknownShard(_) => StatusCode::NOT_FOUND,
            ServiceError::NodeExists(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ServiceError::NoRoute { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures worth retrying against the same or a newly elected peer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }

    pub fn to_body(&self) -> ErrorBody {
        let subjects = match self {
            ServiceError::UnknownNode(s)
            | ServiceError::UnknownEdge(s)
            | ServiceError::UnknownShard(s)
            | ServiceError::NodeExists(s)
            | ServiceError::Unauthorized(s)
            | ServiceError::Unavailable(s)
            | ServiceError::BadRequest(s) => vec![s.clone()],
            ServiceError::NoRoute { from, to } => vec![from.clone(), to.clone()],
            ServiceError::Internal(_) => vec![],
        };

        ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
            subjects,
        }
    }

    /// Rebuilds the error a peer reported. Unknown kinds fall back on the status code.
    pub fn from_wire(status: StatusCode, body: ErrorBody) -> Self {
        let first = body.subjects.first().cloned().unwrap_or_default();

        match body.kind.as_str() {
            "unknown_node" => ServiceError::UnknownNode(first),
            "unknown_edge" => ServiceError::UnknownEdge(first),
            "unknown_shard" => ServiceError::UnknownShard(first),
            "node_exists" => ServiceError::NodeExists(first),
            "unauthorized" => ServiceError::Unauthorized(first),
            "no_route" => ServiceError::NoRoute {
                from: first,
                to: body.subjects.get(1).cloned().unwrap_or_default(),
            },
            "unavailable" => ServiceError::Unavailable(first),
            "bad_request" => ServiceError::BadRequest(first),
            _ if status.is_server_error() => ServiceError::Unavailable(format!(
                "peer answered {}: {}",
                status, body.message
            )),
            _ => ServiceError::Internal(anyhow::anyhow!(
                "peer answered {}: {}",
                status,
                body.message
            )),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_route_survives_the_wire() {
        let sent = ServiceError::NoRoute {
            from: "A1".into(),
            to: "C4".into(),
        };

        let rebuilt = ServiceError::from_wire(sent.status(), sent.to_body());

        assert_eq!(sent.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(matches!(
            rebuilt,
            ServiceError::NoRoute { from, to } if from == "A1" && to == "C4"
        ));
    }

    #[test]
    fn test_not_found_and_unavailable_are_distinct() {
        let missing = ServiceError::UnknownNode("A9".into());
        let down = ServiceError::Unavailable("shard B".into());

        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!missing.is_retryable());
        assert!(down.is_retryable());
    }

    #[test]
    fn test_unknown_kind_falls_back_on_status() {
        let body = ErrorBody {
            kind: String::new(),
            message: "Bad Gateway".into(),
            subjects: vec![],
        };

        let rebuilt = ServiceError::from_wire(StatusCode::BAD_GATEWAY, body.clone());
        let client_side = ServiceError::from_wire(StatusCode::IM_A_TEAPOT, body);

        assert!(matches!(rebuilt, ServiceError::Unavailable(_)));
        assert!(matches!(client_side, ServiceError::Internal(_)));
    }
}
