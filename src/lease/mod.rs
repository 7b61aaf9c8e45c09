//! Shard Lease Module
//!
//! Each shard is served by exactly one worker at a time. Ownership is a time-bounded,
//! renewable lease arbitrated by a coordination store whose conditional writes are atomic.
//!
//! ## Architecture Overview
//! 1. **Store**: `CoordinationStore` exposes `set_if_absent` and `extend_if_equals` with TTLs.
//!    Its atomicity is the only thing preventing two holders of one shard.
//! 2. **Coordinator**: The manager's `LeaseCoordinator` renews a holder's shard when asked,
//!    otherwise walks the shard list in a fixed order and grants the first free one.
//! 3. **Client**: Each worker's `LeaseClient` loop acquires a lease, renews it every half
//!    duration and reports `LeaseEvent`s when the owned shard changes or is lost.
//!
//! ## Submodules
//! - **`types`**: `Lease`, `LeaseRequest` and `LeaseEvent`.
//! - **`store`**: Coordination store interface and the in-memory TTL store.
//! - **`coordinator`**: Manager-side lease granting.
//! - **`client`**: Worker-side acquisition and renewal loop.
//! - **`protocol`**: Manager HTTP endpoints and DTOs.
//! - **`handlers`**: Axum handlers for the manager.

pub mod client;
pub mod coordinator;
pub mod handlers;
pub mod protocol;
pub mod store;
pub mod types;
