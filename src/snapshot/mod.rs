//! Versioned Snapshot Module
//!
//! Durable state lives in a blob store as whole-object snapshots. Each snapshot is paired
//! with a small lock object holding an opaque version token, so readers can ask "has it
//! changed?" for the price of one tiny read before downloading the payload.
//!
//! ## Ordering Contract
//! Writers store the payload first and the token second. A reader that observes a new
//! token is therefore guaranteed to find a payload at least that new.
//!
//! ## Submodules
//! - **`store`**: The `BlobStore` interface plus in-memory and filesystem backends.
//! - **`versioned`**: `VersionedSnapshotStore` and `VersionToken`.
//! - **`layout`**: Object naming for shard and federation snapshots, shard discovery.

pub mod layout;
pub mod store;
pub mod versioned;
