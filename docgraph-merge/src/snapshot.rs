//! Point-in-time captures of persisted container values.
//!
//! A snapshot records, per object identity, the container's element values
//! as they were written: scalars stay scalars, child objects are recorded
//! by their identity. Comparing two snapshots therefore compares object
//! children by identity, not by structure — exactly what the merge needs.

use crate::{Error, Result};
use docgraph_types::{attr, tag, Fragment, ObjectId, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One persisted element value: a scalar or a reference to a child object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapValue {
    Scalar(Scalar),
    Ref(ObjectId),
}

/// The persisted shape of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapContainer {
    Seq(Vec<SnapValue>),
    Set(BTreeSet<SnapValue>),
    Map(BTreeMap<Scalar, SnapValue>),
    Fields {
        class: String,
        fields: BTreeMap<String, SnapValue>,
    },
}

impl SnapContainer {
    /// True when both containers have the same shape.
    #[must_use]
    pub fn same_shape(&self, other: &SnapContainer) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// An immutable capture of a document's written values, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    entries: HashMap<ObjectId, SnapContainer>,
}

impl Snapshot {
    /// Creates an empty snapshot (no prior document state).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured container for an identity, if any.
    #[must_use]
    pub fn get(&self, id: &ObjectId) -> Option<&SnapContainer> {
        self.entries.get(id)
    }

    /// Records a container under an identity.
    pub fn insert(&mut self, id: ObjectId, container: SnapContainer) {
        self.entries.insert(id, container);
    }

    /// Number of captured containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the captured identities.
    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.entries.keys()
    }

    /// Captures a snapshot from a persisted document tree.
    ///
    /// Every container fragment carrying an `id` attribute contributes one
    /// entry; child containers are recorded as references in their parent
    /// and recursed into for their own entries.
    pub fn from_fragment(root: &Fragment) -> Result<Self> {
        let mut snapshot = Snapshot::new();
        capture(root, &mut snapshot)?;
        Ok(snapshot)
    }
}

fn fragment_id(fragment: &Fragment) -> Result<ObjectId> {
    match fragment.object_id() {
        Some(parsed) => Ok(parsed?),
        None => Err(Error::Malformed(format!(
            "container fragment <{}> has no id attribute",
            fragment.tag
        ))),
    }
}

/// Projects one child fragment to its snapshot value, recursing into
/// container children so their own entries are captured too.
fn capture_child(child: &Fragment, snapshot: &mut Snapshot) -> Result<SnapValue> {
    if let Some(scalar) = child.as_scalar_leaf() {
        return Ok(SnapValue::Scalar(scalar?));
    }
    if child.is_reference() {
        return Ok(SnapValue::Ref(fragment_id(child)?));
    }
    let id = capture(child, snapshot)?;
    Ok(SnapValue::Ref(id))
}

fn capture(fragment: &Fragment, snapshot: &mut Snapshot) -> Result<ObjectId> {
    let id = fragment_id(fragment)?;
    let container = match fragment.tag.as_str() {
        tag::SEQ => {
            let mut elements = Vec::with_capacity(fragment.children.len());
            for child in &fragment.children {
                elements.push(capture_child(child, snapshot)?);
            }
            SnapContainer::Seq(elements)
        }
        tag::SET => {
            let mut elements = BTreeSet::new();
            for child in &fragment.children {
                elements.insert(capture_child(child, snapshot)?);
            }
            SnapContainer::Set(elements)
        }
        tag::MAP => {
            let mut entries = BTreeMap::new();
            for entry in &fragment.children {
                let key_type = entry
                    .attr(attr::KEY_TYPE)
                    .ok_or_else(|| Error::Malformed("map entry without key_type".into()))?;
                let key_text = entry.attr(attr::KEY).unwrap_or("");
                let key = Scalar::parse(key_type, key_text)?;
                let value_child = entry
                    .children
                    .first()
                    .ok_or_else(|| Error::Malformed("map entry without a value".into()))?;
                entries.insert(key, capture_child(value_child, snapshot)?);
            }
            SnapContainer::Map(entries)
        }
        // Anything else is a record or a legacy plain field mapping; both
        // project to a field map. Each child carries its field name as an
        // attribute directly on the value/ref/container fragment.
        _ => {
            let mut fields = BTreeMap::new();
            for child in &fragment.children {
                let name = child
                    .attr(attr::FIELD)
                    .ok_or_else(|| Error::Malformed("record child without field name".into()))?
                    .to_string();
                fields.insert(name, capture_child(child, snapshot)?);
            }
            SnapContainer::Fields {
                class: fragment.attr(attr::CLASS).unwrap_or("").to_string(),
                fields,
            }
        }
    };
    snapshot.insert(id, container);
    Ok(id)
}
