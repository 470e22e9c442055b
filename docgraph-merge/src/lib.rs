//! Snapshots and the three-way merge engine for DocGraph.
//!
//! A save operation reconciles three views of every container:
//! - the **live** in-memory value,
//! - the **prior** snapshot (document state when this session last
//!   saved/loaded),
//! - the **incoming** snapshot (latest persisted state, possibly written
//!   by another session).
//!
//! The merge favors "don't lose a concurrent addition/removal" over strict
//! linearizability: external edits (incoming vs prior) and local edits
//! (live vs prior) are combined per shape, and a key modified on both
//! sides resolves in favor of the local writer.

mod engine;
mod snapshot;

pub use engine::merge_container;
pub use snapshot::{SnapContainer, SnapValue, Snapshot};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed fragment: {0}")]
    Malformed(String),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error(transparent)]
    Types(#[from] docgraph_types::Error),
}
