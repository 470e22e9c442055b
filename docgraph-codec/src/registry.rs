//! The identity registry: the join point all codecs share.
//!
//! One registry spans one save/load operation (or a load followed by a
//! re-save of the same graph). It maps live objects to their persisted
//! identities by *reference identity* — the `Rc` pointer, never value
//! equality — and identities back to live objects. The registry is an
//! explicit value passed into every codec call; there is no process-wide
//! singleton, so concurrent operations in different sessions never share
//! identity state.

use crate::error::{CodecError, CodecResult};
use docgraph_types::{NodeRef, ObjectId};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct Binding {
    node: NodeRef,
    /// A resolved binding is final; rebinding a different instance is fatal.
    resolved: bool,
}

/// Operation-scoped table of object ⇄ identity bindings.
///
/// The id→object side holds strong references, so a pointer used as a
/// lookup key cannot be freed and reused within the operation.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    ids_by_ptr: HashMap<usize, ObjectId>,
    bindings: HashMap<ObjectId, Binding>,
}

fn ptr_of(node: &NodeRef) -> usize {
    Rc::as_ptr(node) as usize
}

impl IdentityRegistry {
    /// Creates an empty registry for one operation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the identity of a live object by reference identity.
    ///
    /// When absent and `create_if_absent` is true, mints a fresh random
    /// identity, binds it, and returns it.
    pub fn identity_for(&mut self, node: &NodeRef, create_if_absent: bool) -> Option<ObjectId> {
        if let Some(id) = self.ids_by_ptr.get(&ptr_of(node)) {
            return Some(*id);
        }
        create_if_absent.then(|| self.ensure_identity(node))
    }

    /// The identity of a live object, minting one if needed.
    pub fn ensure_identity(&mut self, node: &NodeRef) -> ObjectId {
        if let Some(id) = self.ids_by_ptr.get(&ptr_of(node)) {
            return *id;
        }
        let id = ObjectId::new();
        self.ids_by_ptr.insert(ptr_of(node), id);
        self.bindings.insert(
            id,
            Binding {
                node: node.clone(),
                resolved: true,
            },
        );
        id
    }

    /// Associates a freshly-decoded object with an identifier supplied
    /// from the document, overwriting any placeholder previously bound
    /// to that identifier.
    pub fn bind(&mut self, id: ObjectId, node: NodeRef) {
        if let Some(previous) = self.bindings.get(&id) {
            self.ids_by_ptr.remove(&ptr_of(&previous.node));
        }
        self.ids_by_ptr.insert(ptr_of(&node), id);
        self.bindings.insert(
            id,
            Binding {
                node,
                resolved: false,
            },
        );
    }

    /// Finalizes a binding. Idempotent for the same (identity, object)
    /// pair; resolving a different object to an already-resolved
    /// identifier is an [`CodecError::IdentityConflict`].
    pub fn resolve(&mut self, id: ObjectId, node: NodeRef) -> CodecResult<()> {
        match self.bindings.get_mut(&id) {
            Some(binding) if Rc::ptr_eq(&binding.node, &node) => {
                binding.resolved = true;
                Ok(())
            }
            Some(binding) if binding.resolved => Err(CodecError::IdentityConflict { id }),
            _ => {
                self.bind(id, node);
                if let Some(binding) = self.bindings.get_mut(&id) {
                    binding.resolved = true;
                }
                Ok(())
            }
        }
    }

    /// Returns the live object bound to an identifier, if any.
    #[must_use]
    pub fn lookup(&self, id: &ObjectId) -> Option<NodeRef> {
        self.bindings.get(id).map(|binding| binding.node.clone())
    }

    /// True if the identifier has a binding (placeholder or resolved).
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.bindings.contains_key(id)
    }

    /// Number of bound identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when no identities are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over all bound identities.
    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.bindings.keys()
    }
}
