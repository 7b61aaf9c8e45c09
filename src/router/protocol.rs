//! Router Network Protocol
//!
//! `GET /route/:start/:end`, `GET /distance/:start/:end`, `PUT /add_edge/:n1/:n2/:length`
//! and `DELETE /delete_edge/:edge_id`. A disconnected pair answers `422` with
//! `kind = "no_route"`; an unreachable shard answers `503`.

use crate::graph::types::Distance;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct DistanceResponse {
    pub distance: Distance,
}
