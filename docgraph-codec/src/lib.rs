//! Identity-tracking graph codecs for DocGraph.
//!
//! This crate turns live object graphs into nested-fragment documents and
//! back, preserving reference identity across save/load cycles and
//! reconciling concurrent edits from other sessions on the way out:
//!
//! - [`IdentityRegistry`] — operation-scoped object ⇄ identity bindings
//! - [`GraphCodec`] / [`CodecSet`] — one converter per container shape,
//!   record codec as the catch-all
//! - [`DeferredResolver`] — forward/cyclic reference patching on decode
//! - [`SchemaGuard`] / [`Template`] — required-field and nullability
//!   checks against externally-owned templates
//! - [`session::save`] / [`session::load`] — the operation facade
//!
//! Saving is deliberately not pure: the merge result is written back into
//! the live containers (clear-then-repopulate), so callers observe the
//! reconciled state as soon as a save returns.

mod codec;
mod error;
mod fields;
mod registry;
mod resolver;
mod schema;
pub mod session;

pub use codec::{CodecSet, DecodeCx, EncodeCx, GraphCodec, MapCodec, RecordCodec, SeqCodec, SetCodec};
pub use error::{CodecError, CodecResult};
pub use fields::{DynAccessor, FieldAccessor, FieldWriteError};
pub use registry::IdentityRegistry;
pub use resolver::DeferredResolver;
pub use schema::{FieldSpec, SchemaGuard, StaticTemplates, Template, TemplateRegistry};
pub use session::{SaveOutcome, SessionOptions, ENCLOSING_FIELD_PREFIX};
