use docgraph_types::{ContainerKind, Node, Record, Scalar};
use std::collections::BTreeMap;
use std::rc::Rc;

#[test]
fn kind_probe_covers_all_shapes() {
    assert_eq!(Node::scalar(1i64).borrow().kind(), None);
    assert_eq!(
        Node::seq(vec![]).borrow().kind(),
        Some(ContainerKind::Sequence)
    );
    assert_eq!(Node::set(vec![]).borrow().kind(), Some(ContainerKind::Set));
    assert_eq!(
        Node::map(BTreeMap::new()).borrow().kind(),
        Some(ContainerKind::Mapping)
    );
    assert_eq!(
        Node::record(Record::new("point")).borrow().kind(),
        Some(ContainerKind::Record)
    );
}

#[test]
fn empty_shell_matches_requested_kind() {
    for kind in [
        ContainerKind::Sequence,
        ContainerKind::Set,
        ContainerKind::Mapping,
        ContainerKind::Record,
    ] {
        let shell = Node::empty(kind);
        assert_eq!(shell.borrow().kind(), Some(kind));
    }
}

#[test]
fn record_field_accessors() {
    let mut record = Record::new("person");
    assert!(record.field("name").is_none());
    record.set_field("name", Node::scalar("ada"));
    let value = record.field("name").unwrap();
    assert_eq!(value.borrow().as_scalar(), Some(&Scalar::Text("ada".into())));
}

#[test]
fn node_handles_share_identity() {
    let node = Node::seq(vec![]);
    let alias = node.clone();
    assert!(Rc::ptr_eq(&node, &alias));

    // In-place mutation is visible through every handle.
    if let Node::Seq(children) = &mut *node.borrow_mut() {
        children.push(Node::scalar(7i64));
    }
    if let Node::Seq(children) = &*alias.borrow() {
        assert_eq!(children.len(), 1);
    } else {
        panic!("expected sequence");
    }
}

#[test]
fn distinct_allocations_are_distinct_identities() {
    let a = Node::seq(vec![]);
    let b = Node::seq(vec![]);
    assert!(!Rc::ptr_eq(&a, &b));
}
