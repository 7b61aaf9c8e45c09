//! Shard Graph Service
//!
//! A worker serves whichever shard its lease currently names. The shard's topology lives
//! in the snapshot store; the worker loads it on assignment and owns it until the lease is
//! lost.
//!
//! ## Responsibilities
//! - **Queries**: Internal shortest paths and node-to-gateway distances.
//! - **Publication**: The passthrough matrix (gateway to gateway distances), versioned by
//!   the same token as the topology snapshot it was derived from.
//! - **Mutations**: Node registration, edge insertion and deletion, role changes. Each one
//!   recomputes the matrix and persists a new snapshot before it becomes visible.
//!
//! ## Submodules
//! - **`types`**: `NodeRole`, `ShardTopology`, `PassthroughMatrix`, `ShardSummary`.
//! - **`service`**: `ShardGraphService` and its lease-driven state machine.
//! - **`protocol`**: Worker endpoints and DTOs.
//! - **`handlers`**: Axum handlers for the worker.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;
