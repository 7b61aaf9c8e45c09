//! Federated Shortest-Path Routing Library
//!
//! Computes shortest paths across a federation of network partitions ("shards"), each
//! owned at any instant by exactly one worker process. The binary (`main.rs`) runs any of
//! the process roles on top of these modules.
//!
//! ## Architecture Modules
//! - **`graph`**: Dijkstra, BFS and multi-source search with pluggable visitors.
//! - **`snapshot`**: Blob store backends and versioned snapshots (payload plus lock token).
//! - **`lease`**: Exclusive, expiring, renewable shard ownership: coordination store,
//!   manager-side coordinator and worker-side renewal loop.
//! - **`shard`**: The worker's per-shard graph service and its HTTP surface.
//! - **`router`**: Federation-wide composition of shard summaries into routes.
//! - **`netgen`**: Random federated networks for seeding and testing.
//! - **`config`**, **`error`**, **`http`**: Configuration, error taxonomy and outbound HTTP.

pub mod config;
pub mod error;
pub mod graph;
pub mod http;
pub mod lease;
pub mod netgen;
pub mod router;
pub mod shard;
pub mod snapshot;
