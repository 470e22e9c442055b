//! Graph codecs: one converter per container shape.
//!
//! All four codecs share the same contract. Encode obtains the object's
//! identity, runs the three-way merge against the prior and incoming
//! snapshots, writes the merge result back into the live container
//! (clear-then-repopulate — an intentional, observable side effect of
//! saving), then emits one fragment per element. An object that was
//! already emitted in this operation is re-emitted as a `ref` fragment,
//! which is what keeps cyclic graphs from recursing forever.
//!
//! Decode allocates a shell of the right runtime kind, binds the id
//! before populating any children (so cyclic back-references find the
//! shell), decodes children recursively, and finalizes the binding.

use crate::error::{CodecError, CodecResult};
use crate::registry::IdentityRegistry;
use crate::resolver::DeferredResolver;
use crate::schema::SchemaGuard;
use crate::session::SessionOptions;
use docgraph_merge::{merge_container, SnapContainer, SnapValue, Snapshot};
use docgraph_types::{attr, tag, ContainerKind, Fragment, Node, NodeRef, ObjectId, Record, Scalar};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// State for one encode (save) traversal.
pub struct EncodeCx<'a> {
    pub registry: &'a mut IdentityRegistry,
    pub prior: &'a Snapshot,
    pub incoming: &'a Snapshot,
    pub options: &'a SessionOptions,
    emitted: HashSet<ObjectId>,
}

impl<'a> EncodeCx<'a> {
    pub fn new(
        registry: &'a mut IdentityRegistry,
        prior: &'a Snapshot,
        incoming: &'a Snapshot,
        options: &'a SessionOptions,
    ) -> Self {
        Self {
            registry,
            prior,
            incoming,
            options,
            emitted: HashSet::new(),
        }
    }

    /// True the first time an identity is emitted in this operation.
    fn first_emission(&mut self, id: ObjectId) -> bool {
        self.emitted.insert(id)
    }
}

/// State for one decode (load) traversal.
pub struct DecodeCx<'a> {
    pub registry: &'a mut IdentityRegistry,
    pub options: &'a SessionOptions,
    resolver: DeferredResolver,
}

impl<'a> DecodeCx<'a> {
    pub fn new(registry: &'a mut IdentityRegistry, options: &'a SessionOptions) -> Self {
        Self {
            registry,
            options,
            resolver: DeferredResolver::new(),
        }
    }

    /// Resolves a reference fragment's id, deferring if not yet defined.
    pub fn reference(&mut self, id: ObjectId) -> NodeRef {
        self.resolver.reference(id, self.registry)
    }

    /// Begins the definition of an id as a container shell.
    pub fn define(&mut self, id: ObjectId, kind: ContainerKind) -> NodeRef {
        self.resolver.define(id, kind, self.registry)
    }

    /// Fails if any forward reference was never defined.
    pub fn finish(&self) -> CodecResult<()> {
        self.resolver.finish()
    }
}

/// Uniform encode/decode contract shared by the four shape converters.
pub trait GraphCodec {
    /// Pure shape predicate. The record codec answers true for every
    /// shape and must therefore be tried last.
    fn can_handle(&self, kind: ContainerKind) -> bool;

    fn encode(&self, node: &NodeRef, codecs: &CodecSet, cx: &mut EncodeCx) -> CodecResult<Fragment>;

    fn decode(
        &self,
        fragment: &Fragment,
        codecs: &CodecSet,
        cx: &mut DecodeCx,
    ) -> CodecResult<NodeRef>;
}

/// The ordered set of codecs used for dispatch.
pub struct CodecSet {
    codecs: Vec<Box<dyn GraphCodec>>,
}

impl Default for CodecSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl CodecSet {
    /// The standard four converters, record codec last (catch-all).
    #[must_use]
    pub fn standard() -> Self {
        Self {
            codecs: vec![
                Box::new(SeqCodec),
                Box::new(SetCodec),
                Box::new(MapCodec),
                Box::new(RecordCodec),
            ],
        }
    }

    fn codec_for(&self, kind: ContainerKind) -> CodecResult<&dyn GraphCodec> {
        self.codecs
            .iter()
            .find(|codec| codec.can_handle(kind))
            .map(|codec| &**codec)
            .ok_or_else(|| CodecError::Malformed(format!("no codec for {kind:?}")))
    }

    /// Encodes any live value: scalars as leaf fragments, containers via
    /// their shape codec.
    pub fn encode_value(&self, node: &NodeRef, cx: &mut EncodeCx) -> CodecResult<Fragment> {
        let kind = {
            let borrowed = node.borrow();
            match &*borrowed {
                Node::Scalar(scalar) => return Ok(Fragment::scalar_leaf(scalar)),
                Node::Seq(_) => ContainerKind::Sequence,
                Node::Set(_) => ContainerKind::Set,
                Node::Map(_) => ContainerKind::Mapping,
                Node::Record(_) => ContainerKind::Record,
            }
        };
        self.codec_for(kind)?.encode(node, self, cx)
    }

    /// Decodes any fragment: scalar leaves, references, or containers.
    pub fn decode_value(&self, fragment: &Fragment, cx: &mut DecodeCx) -> CodecResult<NodeRef> {
        if let Some(scalar) = fragment.as_scalar_leaf() {
            return Ok(Node::scalar(scalar?));
        }
        if fragment.is_reference() {
            let id = required_id(fragment)?;
            return Ok(cx.reference(id));
        }
        self.decode_container(fragment, cx)
    }

    /// Decodes a container fragment, dispatching on its tag. Unknown tags
    /// fall through to the record codec (legacy plain field mappings).
    pub fn decode_container(&self, fragment: &Fragment, cx: &mut DecodeCx) -> CodecResult<NodeRef> {
        let kind = match fragment.tag.as_str() {
            tag::SEQ => ContainerKind::Sequence,
            tag::SET => ContainerKind::Set,
            tag::MAP => ContainerKind::Mapping,
            _ => ContainerKind::Record,
        };
        self.codec_for(kind)?.decode(fragment, self, cx)
    }
}

fn required_id(fragment: &Fragment) -> CodecResult<ObjectId> {
    match fragment.object_id() {
        Some(parsed) => Ok(parsed?),
        None => Err(CodecError::Malformed(format!(
            "<{}> fragment without an id attribute",
            fragment.tag
        ))),
    }
}

/// Projects one live child to its snapshot value, assigning an identity
/// to container children.
fn project_child(node: &NodeRef, registry: &mut IdentityRegistry) -> SnapValue {
    let scalar = node.borrow().as_scalar().cloned();
    match scalar {
        Some(scalar) => SnapValue::Scalar(scalar),
        None => SnapValue::Ref(registry.ensure_identity(node)),
    }
}

/// Turns a merged snapshot value back into a live node.
///
/// A reference resolves to the live object when one is bound; an
/// externally-added object unknown to this session is rebuilt from the
/// incoming snapshot (bound under its persisted identity first, so
/// cyclic snapshot entries terminate). A reference with no live object
/// and no snapshot entry is dropped.
fn materialize(value: &SnapValue, cx: &mut EncodeCx) -> Option<NodeRef> {
    match value {
        SnapValue::Scalar(scalar) => Some(Node::scalar(scalar.clone())),
        SnapValue::Ref(id) => {
            if let Some(node) = cx.registry.lookup(id) {
                return Some(node);
            }
            let Some(container) = cx.incoming.get(id).cloned() else {
                tracing::warn!(%id, "dropping reference with no live object or snapshot entry");
                return None;
            };
            let shell = Node::empty(container_kind(&container));
            cx.registry.bind(*id, shell.clone());
            let rebuilt = match container {
                SnapContainer::Seq(values) => Node::Seq(
                    values
                        .iter()
                        .filter_map(|value| materialize(value, cx))
                        .collect(),
                ),
                SnapContainer::Set(values) => Node::Set(
                    values
                        .iter()
                        .filter_map(|value| materialize(value, cx))
                        .collect(),
                ),
                SnapContainer::Map(entries) => Node::Map(
                    entries
                        .iter()
                        .filter_map(|(key, value)| {
                            materialize(value, cx).map(|node| (key.clone(), node))
                        })
                        .collect(),
                ),
                SnapContainer::Fields { class, fields } => {
                    let mut record = Record::new(class);
                    for (name, value) in &fields {
                        if let Some(node) = materialize(value, cx) {
                            record.set_field(name.clone(), node);
                        }
                    }
                    Node::Record(record)
                }
            };
            *shell.borrow_mut() = rebuilt;
            Some(shell)
        }
    }
}

fn container_kind(container: &SnapContainer) -> ContainerKind {
    match container {
        SnapContainer::Seq(_) => ContainerKind::Sequence,
        SnapContainer::Set(_) => ContainerKind::Set,
        SnapContainer::Map(_) => ContainerKind::Mapping,
        SnapContainer::Fields { .. } => ContainerKind::Record,
    }
}

/// Runs the three-way merge for one identified container.
fn merge_for(id: ObjectId, live: &SnapContainer, cx: &EncodeCx) -> SnapContainer {
    merge_container(live, cx.prior.get(&id), cx.incoming.get(&id))
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

pub struct SeqCodec;

impl GraphCodec for SeqCodec {
    fn can_handle(&self, kind: ContainerKind) -> bool {
        kind == ContainerKind::Sequence
    }

    fn encode(&self, node: &NodeRef, codecs: &CodecSet, cx: &mut EncodeCx) -> CodecResult<Fragment> {
        let id = cx.registry.ensure_identity(node);
        if !cx.first_emission(id) {
            return Ok(Fragment::reference(id));
        }

        let live_children = match &*node.borrow() {
            Node::Seq(children) => children.clone(),
            _ => return Err(CodecError::Malformed("sequence codec on non-sequence".into())),
        };
        let projected: Vec<SnapValue> = live_children
            .iter()
            .map(|child| project_child(child, cx.registry))
            .collect();

        let merged = match merge_for(id, &SnapContainer::Seq(projected), cx) {
            SnapContainer::Seq(values) => values,
            _ => return Err(CodecError::Malformed("merge changed container shape".into())),
        };

        let new_children: Vec<NodeRef> = merged
            .iter()
            .filter_map(|value| materialize(value, cx))
            .collect();
        *node.borrow_mut() = Node::Seq(new_children.clone());

        let mut fragment = Fragment::new(tag::SEQ).with_attr(attr::ID, id.to_string());
        for child in &new_children {
            fragment.push(codecs.encode_value(child, cx)?);
        }
        Ok(fragment)
    }

    fn decode(
        &self,
        fragment: &Fragment,
        codecs: &CodecSet,
        cx: &mut DecodeCx,
    ) -> CodecResult<NodeRef> {
        let id = required_id(fragment)?;
        let shell = cx.define(id, ContainerKind::Sequence);
        let mut children = Vec::with_capacity(fragment.children.len());
        for child in &fragment.children {
            children.push(codecs.decode_value(child, cx)?);
        }
        if let Node::Seq(slot) = &mut *shell.borrow_mut() {
            *slot = children;
        }
        cx.registry.resolve(id, shell.clone())?;
        Ok(shell)
    }
}

// ---------------------------------------------------------------------------
// Set
// ---------------------------------------------------------------------------

pub struct SetCodec;

impl GraphCodec for SetCodec {
    fn can_handle(&self, kind: ContainerKind) -> bool {
        kind == ContainerKind::Set
    }

    fn encode(&self, node: &NodeRef, codecs: &CodecSet, cx: &mut EncodeCx) -> CodecResult<Fragment> {
        let id = cx.registry.ensure_identity(node);
        if !cx.first_emission(id) {
            return Ok(Fragment::reference(id));
        }

        let live_children = match &*node.borrow() {
            Node::Set(children) => children.clone(),
            _ => return Err(CodecError::Malformed("set codec on non-set".into())),
        };
        let projected: BTreeSet<SnapValue> = live_children
            .iter()
            .map(|child| project_child(child, cx.registry))
            .collect();

        let merged = match merge_for(id, &SnapContainer::Set(projected), cx) {
            SnapContainer::Set(values) => values,
            _ => return Err(CodecError::Malformed("merge changed container shape".into())),
        };

        // Keep live iteration order for surviving members, then append
        // external additions.
        let mut remaining = merged;
        let mut new_children = Vec::with_capacity(remaining.len());
        for child in &live_children {
            let value = project_child(child, cx.registry);
            if remaining.remove(&value) {
                new_children.push(child.clone());
            }
        }
        for value in &remaining {
            if let Some(child) = materialize(value, cx) {
                new_children.push(child);
            }
        }
        *node.borrow_mut() = Node::Set(new_children.clone());

        let mut fragment = Fragment::new(tag::SET).with_attr(attr::ID, id.to_string());
        for child in &new_children {
            fragment.push(codecs.encode_value(child, cx)?);
        }
        Ok(fragment)
    }

    fn decode(
        &self,
        fragment: &Fragment,
        codecs: &CodecSet,
        cx: &mut DecodeCx,
    ) -> CodecResult<NodeRef> {
        let id = required_id(fragment)?;
        let shell = cx.define(id, ContainerKind::Set);
        let mut children = Vec::with_capacity(fragment.children.len());
        for child in &fragment.children {
            children.push(codecs.decode_value(child, cx)?);
        }
        if let Node::Set(slot) = &mut *shell.borrow_mut() {
            *slot = children;
        }
        cx.registry.resolve(id, shell.clone())?;
        Ok(shell)
    }
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

pub struct MapCodec;

impl GraphCodec for MapCodec {
    fn can_handle(&self, kind: ContainerKind) -> bool {
        kind == ContainerKind::Mapping
    }

    fn encode(&self, node: &NodeRef, codecs: &CodecSet, cx: &mut EncodeCx) -> CodecResult<Fragment> {
        let id = cx.registry.ensure_identity(node);
        if !cx.first_emission(id) {
            return Ok(Fragment::reference(id));
        }

        let live_entries = match &*node.borrow() {
            Node::Map(entries) => entries.clone(),
            _ => return Err(CodecError::Malformed("map codec on non-map".into())),
        };
        let projected: BTreeMap<Scalar, SnapValue> = live_entries
            .iter()
            .map(|(key, value)| (key.clone(), project_child(value, cx.registry)))
            .collect();

        let merged = match merge_for(id, &SnapContainer::Map(projected.clone()), cx) {
            SnapContainer::Map(entries) => entries,
            _ => return Err(CodecError::Malformed("merge changed container shape".into())),
        };

        let mut new_entries = BTreeMap::new();
        for (key, value) in &merged {
            // Reuse the live node when the merged value is the live value.
            let node_for_key = match live_entries.get(key) {
                Some(live_value) if projected.get(key) == Some(value) => Some(live_value.clone()),
                _ => materialize(value, cx),
            };
            if let Some(child) = node_for_key {
                new_entries.insert(key.clone(), child);
            }
        }
        *node.borrow_mut() = Node::Map(new_entries.clone());

        let mut fragment = Fragment::new(tag::MAP).with_attr(attr::ID, id.to_string());
        for (key, child) in &new_entries {
            let mut entry = Fragment::new(tag::ENTRY)
                .with_attr(attr::KEY_TYPE, key.type_name())
                .with_attr(attr::KEY, key.render());
            entry.push(codecs.encode_value(child, cx)?);
            fragment.push(entry);
        }
        Ok(fragment)
    }

    fn decode(
        &self,
        fragment: &Fragment,
        codecs: &CodecSet,
        cx: &mut DecodeCx,
    ) -> CodecResult<NodeRef> {
        let id = required_id(fragment)?;
        let shell = cx.define(id, ContainerKind::Mapping);
        let mut entries = BTreeMap::new();
        for entry in &fragment.children {
            let key_type = entry
                .attr(attr::KEY_TYPE)
                .ok_or_else(|| CodecError::Malformed("map entry without key_type".into()))?;
            let key = Scalar::parse(key_type, entry.attr(attr::KEY).unwrap_or(""))?;
            let value = entry
                .children
                .first()
                .ok_or_else(|| CodecError::Malformed("map entry without a value".into()))?;
            entries.insert(key, codecs.decode_value(value, cx)?);
        }
        if let Node::Map(slot) = &mut *shell.borrow_mut() {
            *slot = entries;
        }
        cx.registry.resolve(id, shell.clone())?;
        Ok(shell)
    }
}

// ---------------------------------------------------------------------------
// Record (catch-all, tried last)
// ---------------------------------------------------------------------------

pub struct RecordCodec;

impl RecordCodec {
    /// Rejects hosting-application handles, persistence-map instances,
    /// and enclosing-instance back-references before anything is written.
    fn check_forbidden(
        class: &str,
        enumerated: &[(String, NodeRef)],
        options: &SessionOptions,
    ) -> CodecResult<()> {
        if options.is_forbidden_class(class) {
            return Err(CodecError::ForbiddenReference {
                class: class.to_string(),
                field: "<self>".to_string(),
            });
        }
        for (name, value) in enumerated {
            if SessionOptions::is_enclosing_field(name) {
                return Err(CodecError::ForbiddenReference {
                    class: class.to_string(),
                    field: name.clone(),
                });
            }
            let child_class = match &*value.borrow() {
                Node::Record(record) => Some(record.class_name.clone()),
                _ => None,
            };
            if let Some(child_class) = child_class {
                if options.is_forbidden_class(&child_class) {
                    return Err(CodecError::ForbiddenReference {
                        class: class.to_string(),
                        field: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl GraphCodec for RecordCodec {
    /// The record codec is the catch-all for any shape not claimed by a
    /// more specific converter.
    fn can_handle(&self, _kind: ContainerKind) -> bool {
        true
    }

    fn encode(&self, node: &NodeRef, codecs: &CodecSet, cx: &mut EncodeCx) -> CodecResult<Fragment> {
        let id = cx.registry.ensure_identity(node);
        if !cx.first_emission(id) {
            return Ok(Fragment::reference(id));
        }

        let record_view = match &*node.borrow() {
            Node::Record(record) => record.clone(),
            _ => return Err(CodecError::Malformed("record codec on non-record".into())),
        };
        let accessor = cx.options.accessor.as_ref();
        let class = accessor.class_name(&record_view).to_string();
        let enumerated = accessor.enumerate(&record_view);

        Self::check_forbidden(&class, &enumerated, cx.options)?;

        let field_map: BTreeMap<String, NodeRef> = enumerated
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        SchemaGuard::new(cx.options.templates.as_ref()).check(&class, &field_map)?;

        let projected: BTreeMap<String, SnapValue> = field_map
            .iter()
            .map(|(name, value)| (name.clone(), project_child(value, cx.registry)))
            .collect();

        let live_snap = SnapContainer::Fields {
            class: class.clone(),
            fields: projected.clone(),
        };
        let merged = match merge_for(id, &live_snap, cx) {
            SnapContainer::Fields { fields, .. } => fields,
            _ => return Err(CodecError::Malformed("merge changed container shape".into())),
        };

        let mut new_fields = BTreeMap::new();
        for (name, value) in &merged {
            let node_for_field = match field_map.get(name) {
                Some(live_value) if projected.get(name) == Some(value) => Some(live_value.clone()),
                _ => materialize(value, cx),
            };
            if let Some(child) = node_for_field {
                new_fields.insert(name.clone(), child);
            }
        }
        *node.borrow_mut() = Node::Record(Record {
            class_name: class.clone(),
            fields: new_fields.clone(),
        });

        let mut fragment = Fragment::new(tag::RECORD)
            .with_attr(attr::ID, id.to_string())
            .with_attr(attr::CLASS, class)
            .with_attr(attr::FIELDSET, "true");
        for (name, child) in &new_fields {
            let mut field_fragment = codecs.encode_value(child, cx)?;
            field_fragment.set_attr(attr::FIELD, name);
            fragment.push(field_fragment);
        }
        Ok(fragment)
    }

    fn decode(
        &self,
        fragment: &Fragment,
        codecs: &CodecSet,
        cx: &mut DecodeCx,
    ) -> CodecResult<NodeRef> {
        let id = required_id(fragment)?;
        let shell = cx.define(id, ContainerKind::Record);

        let class = fragment.attr(attr::CLASS).unwrap_or("").to_string();
        if fragment.attr(attr::FIELDSET) != Some("true") {
            // Legacy documents wrote records as a plain field mapping
            // without the marker; the population path is identical.
            tracing::debug!(class, "fragment without fieldset marker; decoding as field mapping");
        }
        if let Node::Record(record) = &mut *shell.borrow_mut() {
            record.class_name = class.clone();
        }

        let mut pairs = Vec::with_capacity(fragment.children.len());
        for child in &fragment.children {
            let name = child
                .attr(attr::FIELD)
                .ok_or_else(|| CodecError::Malformed("record child without field attribute".into()))?
                .to_string();
            let value = codecs.decode_value(child, cx)?;
            pairs.push((name, value));
        }

        populate_record(&shell, &pairs, cx.options.accessor.as_ref(), &class);
        cx.registry.resolve(id, shell.clone())?;
        Ok(shell)
    }
}

/// Writes decoded fields into a record shell, recovering from version
/// skew between the persisted schema and the current class.
///
/// Recovery order: the record's re-initialization hook, then a fresh
/// default instance. If neither is available, every field the accessor
/// still accepts is written individually and only the rejected ones are
/// dropped, reported as a diagnostic — shared documents may have been
/// written by an older version of the class, and a best-effort object
/// beats failing the whole load.
fn populate_record(
    shell: &NodeRef,
    pairs: &[(String, NodeRef)],
    accessor: &dyn crate::fields::FieldAccessor,
    class: &str,
) {
    if write_fields(shell, pairs, accessor).is_ok() {
        return;
    }

    let reinitialized = match &mut *shell.borrow_mut() {
        Node::Record(record) => accessor.reinitialize(record),
        _ => false,
    };
    if reinitialized && write_fields(shell, pairs, accessor).is_ok() {
        tracing::warn!(class, "recovered from schema skew via reinitialize hook");
        return;
    }

    if let Some(mut fresh) = accessor.fresh_instance(class) {
        fresh.class_name = class.to_string();
        *shell.borrow_mut() = Node::Record(fresh);
        if write_fields(shell, pairs, accessor).is_ok() {
            tracing::warn!(class, "recovered from schema skew via fresh instance");
            return;
        }
    }

    // Per-field best effort: an undeclared field must not take the
    // declared ones down with it.
    let mut rejected: Vec<&str> = Vec::new();
    if let Node::Record(record) = &mut *shell.borrow_mut() {
        for (name, value) in pairs {
            if accessor.write(record, name, value.clone()).is_err() {
                rejected.push(name.as_str());
            }
        }
    }
    tracing::warn!(
        class,
        fields = ?rejected,
        "schema skew: the document holds fields this class does not declare; \
         implement FieldAccessor::reinitialize or FieldAccessor::fresh_instance \
         for this class to recover them"
    );
}

fn write_fields(
    shell: &NodeRef,
    pairs: &[(String, NodeRef)],
    accessor: &dyn crate::fields::FieldAccessor,
) -> Result<(), crate::fields::FieldWriteError> {
    match &mut *shell.borrow_mut() {
        Node::Record(record) => {
            for (name, value) in pairs {
                accessor.write(record, name, value.clone())?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
