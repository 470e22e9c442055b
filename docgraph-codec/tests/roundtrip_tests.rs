use docgraph_codec::session::{load, save, SessionOptions};
use docgraph_codec::{CodecError, IdentityRegistry};
use docgraph_merge::Snapshot;
use docgraph_types::{attr, tag, Fragment, Node, NodeRef, ObjectId, Record, Scalar};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::rc::Rc;

fn save_fresh(root: &NodeRef) -> (Fragment, Snapshot, IdentityRegistry) {
    let mut registry = IdentityRegistry::new();
    let options = SessionOptions::default();
    let outcome = save(
        root,
        &mut registry,
        &Snapshot::new(),
        &Snapshot::new(),
        &options,
    )
    .unwrap();
    (outcome.document, outcome.snapshot, registry)
}

fn seq_ints(node: &NodeRef) -> Vec<i64> {
    match &*node.borrow() {
        Node::Seq(children) => children
            .iter()
            .filter_map(|child| match child.borrow().as_scalar() {
                Some(Scalar::Int(v)) => Some(*v),
                _ => None,
            })
            .collect(),
        other => panic!("expected sequence, got {other:?}"),
    }
}

#[test]
fn scalar_sequence_round_trips() {
    let root = Node::seq(vec![Node::scalar(1i64), Node::scalar(2i64), Node::scalar(3i64)]);
    let (document, _, _) = save_fresh(&root);

    let mut registry = IdentityRegistry::new();
    let loaded = load(&document, &mut registry, &SessionOptions::default()).unwrap();
    assert_eq!(seq_ints(&loaded), vec![1, 2, 3]);
}

#[test]
fn shared_child_is_written_once_and_stays_shared() {
    let shared = Node::set(vec![Node::scalar(9i64)]);
    let root = Node::seq(vec![shared.clone(), shared.clone()]);
    let (document, _, _) = save_fresh(&root);

    // One definition, one reference.
    let ref_count = document
        .children
        .iter()
        .filter(|child| child.is_reference())
        .count();
    assert_eq!(document.children.len(), 2);
    assert_eq!(ref_count, 1);

    let mut registry = IdentityRegistry::new();
    let loaded = load(&document, &mut registry, &SessionOptions::default()).unwrap();
    let Node::Seq(children) = &*loaded.borrow() else {
        panic!("expected sequence");
    };
    assert!(Rc::ptr_eq(&children[0], &children[1]));
}

#[test]
fn cyclic_graph_round_trips_with_reference_identity() {
    // A.child = B, B.parent = A.
    let a = Node::record(Record::new("node_a"));
    let b = Node::record(Record::new("node_b"));
    if let Node::Record(record) = &mut *a.borrow_mut() {
        record.set_field("child", b.clone());
    }
    if let Node::Record(record) = &mut *b.borrow_mut() {
        record.set_field("parent", a.clone());
    }

    let (document, _, _) = save_fresh(&a);
    let mut registry = IdentityRegistry::new();
    let loaded_a = load(&document, &mut registry, &SessionOptions::default()).unwrap();

    let loaded_b = match &*loaded_a.borrow() {
        Node::Record(record) => record.field("child").unwrap().clone(),
        other => panic!("expected record, got {other:?}"),
    };
    let back = match &*loaded_b.borrow() {
        Node::Record(record) => record.field("parent").unwrap().clone(),
        other => panic!("expected record, got {other:?}"),
    };
    assert!(Rc::ptr_eq(&back, &loaded_a));
}

#[test]
fn encoding_twice_in_one_operation_reuses_the_identity() {
    let root = Node::set(vec![Node::scalar(1i64)]);
    let mut registry = IdentityRegistry::new();
    let options = SessionOptions::default();

    let first = save(&root, &mut registry, &Snapshot::new(), &Snapshot::new(), &options).unwrap();
    let second = save(
        &root,
        &mut registry,
        &first.snapshot,
        &first.snapshot,
        &options,
    )
    .unwrap();
    assert_eq!(first.root_id, second.root_id);
}

#[test]
fn decode_then_reencode_reproduces_the_identifier_set() {
    let inner = Node::map(Default::default());
    let root = Node::seq(vec![inner, Node::scalar(5i64)]);
    let (document, snapshot, _) = save_fresh(&root);

    let mut registry = IdentityRegistry::new();
    let options = SessionOptions::default();
    let loaded = load(&document, &mut registry, &options).unwrap();
    let resaved = save(&loaded, &mut registry, &snapshot, &snapshot, &options).unwrap();

    let original_ids: BTreeSet<ObjectId> = snapshot.ids().copied().collect();
    let resaved_ids: BTreeSet<ObjectId> = resaved.snapshot.ids().copied().collect();
    assert_eq!(original_ids, resaved_ids);
}

#[test]
fn record_class_survives_the_round_trip() {
    let mut record = Record::new("task");
    record.set_field("title", Node::scalar("write tests"));
    let root = Node::record(record);
    let (document, _, _) = save_fresh(&root);
    assert_eq!(document.attr(attr::CLASS), Some("task"));
    assert_eq!(document.attr(attr::FIELDSET), Some("true"));

    let mut registry = IdentityRegistry::new();
    let loaded = load(&document, &mut registry, &SessionOptions::default()).unwrap();
    match &*loaded.borrow() {
        Node::Record(record) => {
            assert_eq!(record.class_name, "task");
            assert_eq!(
                record.field("title").unwrap().borrow().as_scalar(),
                Some(&Scalar::Text("write tests".into()))
            );
        }
        other => panic!("expected record, got {other:?}"),
    }
}

#[test]
fn legacy_field_mapping_without_fieldset_marker_decodes() {
    let id = ObjectId::new();
    let mut document = Fragment::new(tag::RECORD).with_attr(attr::ID, id.to_string());
    let mut name = Fragment::scalar_leaf(&Scalar::Text("ada".into()));
    name.set_attr(attr::FIELD, "name");
    document.push(name);

    let mut registry = IdentityRegistry::new();
    let loaded = load(&document, &mut registry, &SessionOptions::default()).unwrap();
    match &*loaded.borrow() {
        Node::Record(record) => {
            assert_eq!(
                record.field("name").unwrap().borrow().as_scalar(),
                Some(&Scalar::Text("ada".into()))
            );
        }
        other => panic!("expected record, got {other:?}"),
    }
}

#[test]
fn unknown_tag_falls_back_to_the_record_codec() {
    let id = ObjectId::new();
    let mut document = Fragment::new("state").with_attr(attr::ID, id.to_string());
    let mut level = Fragment::scalar_leaf(&Scalar::Int(3));
    level.set_attr(attr::FIELD, "level");
    document.push(level);

    let mut registry = IdentityRegistry::new();
    let loaded = load(&document, &mut registry, &SessionOptions::default()).unwrap();
    assert!(matches!(&*loaded.borrow(), Node::Record(_)));
}

#[test]
fn map_with_typed_keys_round_trips() {
    let mut entries = std::collections::BTreeMap::new();
    entries.insert(Scalar::Int(1), Node::scalar("one"));
    entries.insert(Scalar::Text("two".into()), Node::scalar(2i64));
    let root = Node::map(entries);
    let (document, _, _) = save_fresh(&root);

    let mut registry = IdentityRegistry::new();
    let loaded = load(&document, &mut registry, &SessionOptions::default()).unwrap();
    match &*loaded.borrow() {
        Node::Map(entries) => {
            assert_eq!(entries.len(), 2);
            assert_eq!(
                entries.get(&Scalar::Int(1)).unwrap().borrow().as_scalar(),
                Some(&Scalar::Text("one".into()))
            );
        }
        other => panic!("expected map, got {other:?}"),
    }
}

#[test]
fn scalar_root_is_rejected() {
    let mut registry = IdentityRegistry::new();
    let err = save(
        &Node::scalar(1i64),
        &mut registry,
        &Snapshot::new(),
        &Snapshot::new(),
        &SessionOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
}

#[test]
fn dangling_reference_fails_the_load() {
    let id = ObjectId::new();
    let mut document = Fragment::new(tag::SEQ).with_attr(attr::ID, id.to_string());
    document.push(Fragment::reference(ObjectId::new()));

    let mut registry = IdentityRegistry::new();
    let err = load(&document, &mut registry, &SessionOptions::default()).unwrap_err();
    assert!(matches!(err, CodecError::UnresolvedReference { .. }));
}
