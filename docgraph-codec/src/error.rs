//! Error types for the codec layer.

use docgraph_types::ObjectId;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that abort a save or load operation.
///
/// Two conditions from the design are deliberately *not* represented here:
/// schema skew on decode (resolved by re-initialization or reported as a
/// diagnostic, with the partially-populated object still returned) and
/// shape mismatches during merge (absorbed locally, live value wins).
#[derive(Debug, Error)]
pub enum CodecError {
    /// An identifier already resolved to one object was asked to resolve
    /// to a different object. Programming error; never retried.
    #[error("identity {id} is already resolved to a different object")]
    IdentityConflict { id: ObjectId },

    /// A record is missing a required field or holds a null in a
    /// non-nullable field.
    #[error("schema violation in {class}.{field}: {reason}")]
    SchemaViolation {
        class: String,
        field: String,
        reason: String,
    },

    /// A record stores a reference to the hosting application, to a
    /// persistence map, or to an enclosing instance.
    #[error("forbidden reference in {class}.{field}")]
    ForbiddenReference { class: String, field: String },

    /// A document referenced an identifier that was never defined.
    #[error("unresolved reference: {id}")]
    UnresolvedReference { id: ObjectId },

    /// The document is structurally invalid.
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error(transparent)]
    Snapshot(#[from] docgraph_merge::Error),

    #[error(transparent)]
    Types(#[from] docgraph_types::Error),
}
