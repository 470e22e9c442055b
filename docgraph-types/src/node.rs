//! The live object-graph model.
//!
//! A [`NodeRef`] is a shared, mutable handle to one live object. Reference
//! identity (`Rc::ptr_eq`) — not value equality — is what the identity
//! registry keys on, and in-place mutation through the `RefCell` is what
//! makes cyclic graphs and post-save merge visibility work: every holder of
//! the same `NodeRef` observes the merged/populated state immediately.

use crate::Scalar;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared handle to a live node. Identity is the `Rc` pointer.
pub type NodeRef = Rc<RefCell<Node>>;

/// The closed set of container shapes the engine understands.
///
/// Dispatch is a capability probe on this union, never on concrete
/// type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Sequence,
    Set,
    Mapping,
    Record,
}

/// A live value: a scalar leaf or one of the four container shapes.
#[derive(Debug, Clone)]
pub enum Node {
    Scalar(Scalar),
    /// Ordered sequence (array/list).
    Seq(Vec<NodeRef>),
    /// Unordered collection. Stored as a vector for stable iteration;
    /// membership is value-level (scalars) or identity-level (containers).
    Set(Vec<NodeRef>),
    /// Key/value mapping with scalar keys.
    Map(BTreeMap<Scalar, NodeRef>),
    /// A structured record: class name plus named fields.
    Record(Record),
}

/// A plain structured record projected to a field map.
#[derive(Debug, Clone)]
pub struct Record {
    pub class_name: String,
    pub fields: BTreeMap<String, NodeRef>,
}

impl Record {
    /// Creates an empty record of the given class.
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Returns the field value, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&NodeRef> {
        self.fields.get(name)
    }

    /// Sets a field, returning the previous value if any.
    pub fn set_field(&mut self, name: impl Into<String>, value: NodeRef) -> Option<NodeRef> {
        self.fields.insert(name.into(), value)
    }
}

impl Node {
    /// Wraps a scalar in a fresh node handle.
    #[must_use]
    pub fn scalar(value: impl Into<Scalar>) -> NodeRef {
        Rc::new(RefCell::new(Node::Scalar(value.into())))
    }

    /// Allocates a sequence node.
    #[must_use]
    pub fn seq(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(RefCell::new(Node::Seq(children)))
    }

    /// Allocates a set node.
    #[must_use]
    pub fn set(children: Vec<NodeRef>) -> NodeRef {
        Rc::new(RefCell::new(Node::Set(children)))
    }

    /// Allocates a mapping node.
    #[must_use]
    pub fn map(entries: BTreeMap<Scalar, NodeRef>) -> NodeRef {
        Rc::new(RefCell::new(Node::Map(entries)))
    }

    /// Allocates a record node.
    #[must_use]
    pub fn record(record: Record) -> NodeRef {
        Rc::new(RefCell::new(Node::Record(record)))
    }

    /// Allocates an empty container of the given kind (a decode shell).
    #[must_use]
    pub fn empty(kind: ContainerKind) -> NodeRef {
        match kind {
            ContainerKind::Sequence => Node::seq(Vec::new()),
            ContainerKind::Set => Node::set(Vec::new()),
            ContainerKind::Mapping => Node::map(BTreeMap::new()),
            ContainerKind::Record => Node::record(Record::new("")),
        }
    }

    /// Probes the container shape; `None` for scalar leaves.
    #[must_use]
    pub fn kind(&self) -> Option<ContainerKind> {
        match self {
            Node::Scalar(_) => None,
            Node::Seq(_) => Some(ContainerKind::Sequence),
            Node::Set(_) => Some(ContainerKind::Set),
            Node::Map(_) => Some(ContainerKind::Mapping),
            Node::Record(_) => Some(ContainerKind::Record),
        }
    }

    /// Returns the scalar value if this node is a leaf.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }
}
