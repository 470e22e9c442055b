//! Save/load session facade.
//!
//! One call here is one operation: registry and resolver state is created
//! at the start and discarded at the end, with only the identifiers
//! embedded in the document surviving. A caller that loads a document and
//! later re-saves the same graph passes the *same* registry to both calls
//! so identities remain stable; independent sessions never share one.
//!
//! The usual write path against a shared backing store is
//! acquire-document → [`docgraph_merge::Snapshot::from_fragment`] on the
//! latest persisted state → [`save`] with the prior and incoming
//! snapshots → persist the returned document → release.

use crate::codec::{CodecSet, DecodeCx, EncodeCx};
use crate::error::{CodecError, CodecResult};
use crate::fields::{DynAccessor, FieldAccessor};
use crate::registry::IdentityRegistry;
use crate::schema::{StaticTemplates, TemplateRegistry};
use docgraph_merge::Snapshot;
use docgraph_types::{Fragment, Node, NodeRef, ObjectId};
use std::collections::HashSet;

/// Field names with this prefix denote a back-reference to an enclosing
/// instance and are never persisted.
pub const ENCLOSING_FIELD_PREFIX: &str = "__outer";

/// External collaborators and policy for one session.
pub struct SessionOptions {
    /// Field enumeration/rewrite capability for records.
    pub accessor: Box<dyn FieldAccessor>,
    /// Schema templates, fetched by class name.
    pub templates: Box<dyn TemplateRegistry>,
    /// Class names of the hosting-application handle type family.
    pub app_handle_classes: HashSet<String>,
    /// Class names of the persistence-map type family.
    pub persistence_map_classes: HashSet<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            accessor: Box::new(DynAccessor),
            templates: Box::new(StaticTemplates::new()),
            app_handle_classes: HashSet::new(),
            persistence_map_classes: HashSet::new(),
        }
    }
}

impl SessionOptions {
    /// True if values of this class must never be embedded in a document.
    #[must_use]
    pub fn is_forbidden_class(&self, class_name: &str) -> bool {
        self.app_handle_classes.contains(class_name)
            || self.persistence_map_classes.contains(class_name)
    }

    /// True if this field name marks an enclosing-instance back-reference.
    #[must_use]
    pub fn is_enclosing_field(name: &str) -> bool {
        name.starts_with(ENCLOSING_FIELD_PREFIX)
    }
}

/// Result of one save operation.
#[derive(Debug)]
pub struct SaveOutcome {
    /// The document to persist.
    pub document: Fragment,
    /// Capture of what was written; the next save's prior snapshot.
    pub snapshot: Snapshot,
    /// Identity of the root container.
    pub root_id: ObjectId,
}

/// Encodes a live graph, reconciling it against the prior and incoming
/// snapshots.
///
/// Side effect: containers in the live graph are mutated in place to the
/// merged values, so in-memory readers observe the reconciled state
/// immediately after a save. A failure aborts the whole operation; the
/// caller must treat it as having made no durable change.
pub fn save(
    root: &NodeRef,
    registry: &mut IdentityRegistry,
    prior: &Snapshot,
    incoming: &Snapshot,
    options: &SessionOptions,
) -> CodecResult<SaveOutcome> {
    if matches!(&*root.borrow(), Node::Scalar(_)) {
        return Err(CodecError::Malformed(
            "root of a persisted graph must be a container".into(),
        ));
    }
    let codecs = CodecSet::standard();
    let mut cx = EncodeCx::new(registry, prior, incoming, options);
    let document = codecs.encode_value(root, &mut cx)?;
    let root_id = match document.object_id() {
        Some(parsed) => parsed?,
        None => {
            return Err(CodecError::Malformed(
                "encoded root fragment has no id".into(),
            ))
        }
    };
    let snapshot = Snapshot::from_fragment(&document)?;
    Ok(SaveOutcome {
        document,
        snapshot,
        root_id,
    })
}

/// Decodes a document into a live graph, patching deferred references.
pub fn load(
    document: &Fragment,
    registry: &mut IdentityRegistry,
    options: &SessionOptions,
) -> CodecResult<NodeRef> {
    if document.as_scalar_leaf().is_some() || document.is_reference() {
        return Err(CodecError::Malformed(
            "root of a document must be a container fragment".into(),
        ));
    }
    let codecs = CodecSet::standard();
    let mut cx = DecodeCx::new(registry, options);
    let root = codecs.decode_container(document, &mut cx)?;
    cx.finish()?;
    Ok(root)
}
