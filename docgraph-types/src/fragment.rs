//! The nested-fragment document form.
//!
//! A fragment is a tagged node with string attributes and child fragments —
//! the narrow contract between this engine and whatever structured document
//! transport actually persists the bytes. A fragment either is a scalar
//! leaf (`value` tag, `type`/`value` attributes), a reference to an object
//! emitted elsewhere (`ref` tag, `id` attribute only), or a container
//! carrying an `id` attribute plus child fragments.

use crate::{Error, ObjectId, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fragment tag names.
pub mod tag {
    pub const SEQ: &str = "seq";
    pub const SET: &str = "set";
    pub const MAP: &str = "map";
    pub const RECORD: &str = "record";
    pub const ENTRY: &str = "entry";
    pub const VALUE: &str = "value";
    pub const REF: &str = "ref";
}

/// Fragment attribute names.
pub mod attr {
    pub const ID: &str = "id";
    /// Marks a flattened record of named fields ("true").
    pub const FIELDSET: &str = "fieldset";
    pub const CLASS: &str = "class";
    /// Field name on a record child.
    pub const FIELD: &str = "field";
    /// Rendered map-entry key and its scalar type tag.
    pub const KEY: &str = "key";
    pub const KEY_TYPE: &str = "key_type";
    /// Scalar leaf type tag and rendered value.
    pub const TYPE: &str = "type";
    pub const VALUE: &str = "value";
}

/// One node of the structured document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<Fragment>,
}

impl Fragment {
    /// Creates an empty fragment with the given tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Returns an attribute value, if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Sets an attribute.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// Appends a child fragment.
    pub fn push(&mut self, child: Fragment) {
        self.children.push(child);
    }

    /// Parses the `id` attribute, if present.
    pub fn object_id(&self) -> Option<Result<ObjectId, uuid::Error>> {
        self.attr(attr::ID).map(ObjectId::parse)
    }

    /// Encodes a scalar as a leaf fragment.
    #[must_use]
    pub fn scalar_leaf(value: &Scalar) -> Self {
        Fragment::new(tag::VALUE)
            .with_attr(attr::TYPE, value.type_name())
            .with_attr(attr::VALUE, value.render())
    }

    /// Decodes a scalar leaf fragment, or `None` if this is not one.
    pub fn as_scalar_leaf(&self) -> Option<Result<Scalar, Error>> {
        if self.tag != tag::VALUE {
            return None;
        }
        let type_name = self.attr(attr::TYPE)?;
        let text = self.attr(attr::VALUE).unwrap_or("");
        Some(Scalar::parse(type_name, text))
    }

    /// Encodes a reference to an already-emitted object.
    #[must_use]
    pub fn reference(id: ObjectId) -> Self {
        Fragment::new(tag::REF).with_attr(attr::ID, id.to_string())
    }

    /// True if this fragment is a reference marker.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.tag == tag::REF
    }
}
