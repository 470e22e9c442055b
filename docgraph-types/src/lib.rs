//! Core type definitions for DocGraph.
//!
//! This crate defines the fundamental types shared by the merge engine and
//! the graph codecs:
//! - Object identities (UUID v4, textually rendered)
//! - Scalar leaf values with total ordering
//! - The live node graph (`Node`/`NodeRef`) with reference identity
//! - The nested-fragment document form the codecs read and write
//!
//! Everything that knows about snapshots, merging, or identity registries
//! lives in the higher crates, not here.

mod fragment;
mod ids;
mod node;
mod scalar;

pub use fragment::{attr, tag, Fragment};
pub use ids::ObjectId;
pub use node::{ContainerKind, Node, NodeRef, Record};
pub use scalar::Scalar;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid scalar literal: {0:?}")]
    InvalidScalar(String),
}
