//! Graph Engine Module
//!
//! Pure shortest-path machinery shared by the shard workers and the federation router.
//! Nothing in here performs I/O or takes locks; callers own their graphs and decide how
//! to present an unreachable target.
//!
//! ## Core Concepts
//! - **Half-edges**: An undirected connection is stored as two directed `Edge`s sharing one
//!   `EdgeId`.
//! - **Visitors**: Searches report every settled node to a `Visitor`. `DistanceCollector` keeps
//!   distances, `PathRecord` keeps predecessors and can rebuild the path to one target.
//! - **Lazy deletion**: The frontier is never re-prioritised. Improved distances are pushed as new
//!   entries and outdated entries are discarded when they surface.
//!
//! Edge lengths must be non-negative. The algorithms are undefined for anything else, which the
//! unsigned `Distance` type enforces.

pub mod engine;
pub mod types;
pub mod visitors;

#[cfg(test)]
mod tests;
