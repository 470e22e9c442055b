use docgraph_merge::{SnapContainer, SnapValue, Snapshot};
use docgraph_types::{attr, tag, Fragment, ObjectId, Scalar};

fn leaf(v: i64) -> Fragment {
    Fragment::scalar_leaf(&Scalar::Int(v))
}

#[test]
fn captures_a_flat_sequence() {
    let id = ObjectId::new();
    let mut doc = Fragment::new(tag::SEQ).with_attr(attr::ID, id.to_string());
    doc.push(leaf(1));
    doc.push(leaf(2));

    let snapshot = Snapshot::from_fragment(&doc).unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot.get(&id),
        Some(&SnapContainer::Seq(vec![
            SnapValue::Scalar(Scalar::Int(1)),
            SnapValue::Scalar(Scalar::Int(2)),
        ]))
    );
}

#[test]
fn nested_containers_become_references() {
    let outer = ObjectId::new();
    let inner = ObjectId::new();
    let mut child = Fragment::new(tag::SET).with_attr(attr::ID, inner.to_string());
    child.push(leaf(7));
    let mut doc = Fragment::new(tag::SEQ).with_attr(attr::ID, outer.to_string());
    doc.push(child);

    let snapshot = Snapshot::from_fragment(&doc).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(
        snapshot.get(&outer),
        Some(&SnapContainer::Seq(vec![SnapValue::Ref(inner)]))
    );
    assert!(matches!(
        snapshot.get(&inner),
        Some(SnapContainer::Set(values)) if values.len() == 1
    ));
}

#[test]
fn ref_fragments_capture_as_references() {
    let outer = ObjectId::new();
    let target = ObjectId::new();
    let mut doc = Fragment::new(tag::SEQ).with_attr(attr::ID, outer.to_string());
    doc.push(Fragment::reference(target));

    let snapshot = Snapshot::from_fragment(&doc).unwrap();
    // Only the defining fragment contributes an entry.
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot.get(&outer),
        Some(&SnapContainer::Seq(vec![SnapValue::Ref(target)]))
    );
}

#[test]
fn captures_map_entries_with_typed_keys() {
    let id = ObjectId::new();
    let mut doc = Fragment::new(tag::MAP).with_attr(attr::ID, id.to_string());
    let mut entry = Fragment::new(tag::ENTRY)
        .with_attr(attr::KEY_TYPE, "int")
        .with_attr(attr::KEY, "5");
    entry.push(leaf(50));
    doc.push(entry);

    let snapshot = Snapshot::from_fragment(&doc).unwrap();
    let Some(SnapContainer::Map(entries)) = snapshot.get(&id) else {
        panic!("expected map entry");
    };
    assert_eq!(
        entries.get(&Scalar::Int(5)),
        Some(&SnapValue::Scalar(Scalar::Int(50)))
    );
}

#[test]
fn captures_record_class_and_fields() {
    let id = ObjectId::new();
    let mut doc = Fragment::new(tag::RECORD)
        .with_attr(attr::ID, id.to_string())
        .with_attr(attr::CLASS, "person")
        .with_attr(attr::FIELDSET, "true");
    let mut name = Fragment::scalar_leaf(&Scalar::Text("ada".into()));
    name.set_attr(attr::FIELD, "name");
    doc.push(name);

    let snapshot = Snapshot::from_fragment(&doc).unwrap();
    let Some(SnapContainer::Fields { class, fields }) = snapshot.get(&id) else {
        panic!("expected fields entry");
    };
    assert_eq!(class, "person");
    assert_eq!(
        fields.get("name"),
        Some(&SnapValue::Scalar(Scalar::Text("ada".into())))
    );
}

#[test]
fn container_without_id_is_malformed() {
    let doc = Fragment::new(tag::SEQ);
    assert!(Snapshot::from_fragment(&doc).is_err());
}

#[test]
fn map_entry_without_key_type_is_malformed() {
    let id = ObjectId::new();
    let mut doc = Fragment::new(tag::MAP).with_attr(attr::ID, id.to_string());
    let mut entry = Fragment::new(tag::ENTRY);
    entry.push(leaf(1));
    doc.push(entry);
    assert!(Snapshot::from_fragment(&doc).is_err());
}

#[test]
fn record_child_without_field_name_is_malformed() {
    let id = ObjectId::new();
    let mut doc = Fragment::new(tag::RECORD)
        .with_attr(attr::ID, id.to_string())
        .with_attr(attr::FIELDSET, "true");
    doc.push(leaf(1));
    assert!(Snapshot::from_fragment(&doc).is_err());
}
