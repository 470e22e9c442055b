use docgraph_codec::{CodecError, IdentityRegistry};
use docgraph_types::{Node, ObjectId};
use std::rc::Rc;

#[test]
fn new_registry_is_empty() {
    let registry = IdentityRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}

#[test]
fn lookup_without_create_returns_none() {
    let mut registry = IdentityRegistry::new();
    let node = Node::seq(vec![]);
    assert!(registry.identity_for(&node, false).is_none());
    assert!(registry.is_empty());
}

#[test]
fn identity_is_stable_per_instance() {
    let mut registry = IdentityRegistry::new();
    let node = Node::seq(vec![]);
    let first = registry.identity_for(&node, true).unwrap();
    let second = registry.identity_for(&node, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
}

#[test]
fn identity_is_by_reference_not_value() {
    let mut registry = IdentityRegistry::new();
    let a = Node::seq(vec![]);
    let b = Node::seq(vec![]);
    let id_a = registry.identity_for(&a, true).unwrap();
    let id_b = registry.identity_for(&b, true).unwrap();
    assert_ne!(id_a, id_b);
}

#[test]
fn bind_makes_object_resolvable_by_id_and_by_pointer() {
    let mut registry = IdentityRegistry::new();
    let id = ObjectId::new();
    let node = Node::set(vec![]);
    registry.bind(id, node.clone());
    assert!(Rc::ptr_eq(&registry.lookup(&id).unwrap(), &node));
    assert_eq!(registry.identity_for(&node, false), Some(id));
}

#[test]
fn bind_overwrites_a_placeholder() {
    let mut registry = IdentityRegistry::new();
    let id = ObjectId::new();
    let placeholder = Node::scalar(0i64);
    registry.bind(id, placeholder.clone());
    let real = Node::map(Default::default());
    registry.bind(id, real.clone());
    assert!(Rc::ptr_eq(&registry.lookup(&id).unwrap(), &real));
    // The displaced placeholder no longer maps to the id.
    assert!(registry.identity_for(&placeholder, false).is_none());
}

#[test]
fn resolve_is_idempotent_for_the_same_pair() {
    let mut registry = IdentityRegistry::new();
    let id = ObjectId::new();
    let node = Node::seq(vec![]);
    registry.bind(id, node.clone());
    registry.resolve(id, node.clone()).unwrap();
    registry.resolve(id, node.clone()).unwrap();
}

#[test]
fn resolving_a_different_object_is_an_identity_conflict() {
    let mut registry = IdentityRegistry::new();
    let id = ObjectId::new();
    let first = Node::seq(vec![]);
    registry.resolve(id, first).unwrap();
    let other = Node::seq(vec![]);
    let err = registry.resolve(id, other).unwrap_err();
    assert!(matches!(err, CodecError::IdentityConflict { id: bad } if bad == id));
}

#[test]
fn resolve_finalizes_an_unresolved_binding_to_a_new_object() {
    // A placeholder may be superseded by the real object at resolve time.
    let mut registry = IdentityRegistry::new();
    let id = ObjectId::new();
    let placeholder = Node::scalar(0i64);
    registry.bind(id, placeholder);
    let real = Node::seq(vec![]);
    registry.resolve(id, real.clone()).unwrap();
    assert!(Rc::ptr_eq(&registry.lookup(&id).unwrap(), &real));
}
