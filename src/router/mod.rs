//! Federated Router
//!
//! Answers shortest-path questions that may cross any number of shards.
//!
//! ## Composition
//! 1. **Sync**: Revalidate every shard's summary (passthrough matrix, gateways, nodes) and
//!    the inter-shard edge snapshot by version token.
//! 2. **Merge**: Build a request-scoped graph over gateways from the matrices and the
//!    inter-shard edges, then fan `start` out to its shard's gateways and fan the end
//!    shard's gateways in to `end`.
//! 3. **Search**: Dijkstra from `start`. When both ends share a shard the shard's direct
//!    answer is compared as well.
//! 4. **Stitch**: Each same-shard step of the abstract path is replaced by that shard's
//!    concrete internal path; inter-shard hops are kept as they are.
//!
//! ## Submodules
//! - **`types`**: `InterShardEdges` and `Route`.
//! - **`client`**: `ShardClient` and its HTTP implementation.
//! - **`federation`**: `FederatedRouter`.
//! - **`protocol`** / **`handlers`**: Router HTTP surface.

pub mod client;
pub mod federation;
pub mod handlers;
pub mod protocol;
pub mod types;
