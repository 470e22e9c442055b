use docgraph_types::{attr, tag, Fragment, ObjectId, Scalar};

#[test]
fn scalar_leaf_round_trip() {
    let leaf = Fragment::scalar_leaf(&Scalar::Int(99));
    assert_eq!(leaf.tag, tag::VALUE);
    let decoded = leaf.as_scalar_leaf().unwrap().unwrap();
    assert_eq!(decoded, Scalar::Int(99));
}

#[test]
fn non_leaf_is_not_a_scalar() {
    let fragment = Fragment::new(tag::SEQ);
    assert!(fragment.as_scalar_leaf().is_none());
}

#[test]
fn reference_fragment_carries_only_the_id() {
    let id = ObjectId::new();
    let reference = Fragment::reference(id);
    assert!(reference.is_reference());
    assert_eq!(reference.object_id().unwrap().unwrap(), id);
    assert!(reference.children.is_empty());
}

#[test]
fn object_id_parses_from_attribute() {
    let id = ObjectId::new();
    let fragment = Fragment::new(tag::MAP).with_attr(attr::ID, id.to_string());
    assert_eq!(fragment.object_id().unwrap().unwrap(), id);
}

#[test]
fn object_id_absent_without_attribute() {
    assert!(Fragment::new(tag::MAP).object_id().is_none());
}

#[test]
fn object_id_rejects_garbage() {
    let fragment = Fragment::new(tag::MAP).with_attr(attr::ID, "not-a-uuid");
    assert!(fragment.object_id().unwrap().is_err());
}

#[test]
fn attributes_and_children() {
    let mut fragment = Fragment::new(tag::RECORD)
        .with_attr(attr::CLASS, "person")
        .with_attr(attr::FIELDSET, "true");
    fragment.push(Fragment::scalar_leaf(&Scalar::Text("ada".into())));
    assert_eq!(fragment.attr(attr::CLASS), Some("person"));
    assert_eq!(fragment.attr("missing"), None);
    assert_eq!(fragment.children.len(), 1);
}

#[test]
fn serializes_to_json_and_back() {
    let mut fragment = Fragment::new(tag::SEQ).with_attr(attr::ID, ObjectId::new().to_string());
    fragment.push(Fragment::scalar_leaf(&Scalar::Bool(true)));
    let json = serde_json::to_string(&fragment).unwrap();
    let back: Fragment = serde_json::from_str(&json).unwrap();
    assert_eq!(back, fragment);
}
