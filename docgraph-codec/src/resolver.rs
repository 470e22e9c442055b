//! Deferred reference resolution for cyclic graphs.
//!
//! A document may reference an identifier before the fragment that defines
//! it has been decoded (the classic case: A contains B, B refers back to
//! A). The resolver hands out a placeholder shell for such an id; when the
//! defining fragment arrives, the *same* shell is converted in place into
//! the real container, so every earlier consumer already holds the final
//! instance. No two distinct objects are ever produced for one identifier
//! within a decode.

use crate::error::{CodecError, CodecResult};
use crate::registry::IdentityRegistry;
use docgraph_types::{ContainerKind, Node, NodeRef, ObjectId, Record, Scalar};
use std::collections::{BTreeMap, BTreeSet};

/// Tracks identifiers referenced before their defining fragment was read.
#[derive(Debug, Default)]
pub struct DeferredResolver {
    pending: BTreeSet<ObjectId>,
}

impl DeferredResolver {
    /// Creates a resolver for one decode operation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the object bound to `id`, minting and binding a placeholder
    /// shell when the id has not been defined yet.
    pub fn reference(
        &mut self,
        id: ObjectId,
        registry: &mut IdentityRegistry,
    ) -> NodeRef {
        if let Some(node) = registry.lookup(&id) {
            return node;
        }
        let shell = Node::scalar(Scalar::Null);
        registry.bind(id, shell.clone());
        self.pending.insert(id);
        shell
    }

    /// Begins the definition of `id` as a container of the given kind.
    ///
    /// If a placeholder shell exists for the id, it is converted in place
    /// and returned, so forward references already point at it; otherwise
    /// a fresh shell is allocated and bound.
    pub fn define(
        &mut self,
        id: ObjectId,
        kind: ContainerKind,
        registry: &mut IdentityRegistry,
    ) -> NodeRef {
        let shell = match registry.lookup(&id) {
            Some(existing) => {
                existing.replace(empty_node(kind));
                existing
            }
            None => {
                let shell = Node::empty(kind);
                registry.bind(id, shell.clone());
                shell
            }
        };
        self.pending.remove(&id);
        shell
    }

    /// Fails if any referenced identifier was never defined.
    pub fn finish(&self) -> CodecResult<()> {
        match self.pending.first() {
            Some(id) => Err(CodecError::UnresolvedReference { id: *id }),
            None => Ok(()),
        }
    }
}

fn empty_node(kind: ContainerKind) -> Node {
    match kind {
        ContainerKind::Sequence => Node::Seq(Vec::new()),
        ContainerKind::Set => Node::Set(Vec::new()),
        ContainerKind::Mapping => Node::Map(BTreeMap::new()),
        ContainerKind::Record => Node::Record(Record::new("")),
    }
}
