//! The field accessor seam.
//!
//! The record codec never touches record fields directly during decode —
//! it goes through a [`FieldAccessor`], the stand-in for reflective field
//! enumeration. Implementations enumerate declared non-transient fields
//! and write fields by name; the two recovery hooks let a record survive
//! version skew between the persisted schema and the current class.
//!
//! Most callers use [`DynAccessor`], which is backed by the record's own
//! field map and accepts any field name. A schema-strict accessor (used in
//! tests, or by hosts with generated accessors) rejects unknown fields,
//! which is what triggers the skew recovery path.

use docgraph_types::{NodeRef, Record};
use thiserror::Error;

/// A field write rejected by the accessor.
#[derive(Debug, Error)]
pub enum FieldWriteError {
    /// The live class does not expose this field.
    #[error("unknown field: {0}")]
    UnknownField(String),
}

/// Enumerate and rewrite named fields of an opaque record value.
pub trait FieldAccessor {
    /// The record's declared class name.
    fn class_name<'a>(&self, record: &'a Record) -> &'a str {
        &record.class_name
    }

    /// Visits every declared non-transient field as (name, value).
    fn enumerate(&self, record: &Record) -> Vec<(String, NodeRef)>;

    /// Writes one field by name.
    fn write(&self, record: &mut Record, name: &str, value: NodeRef)
        -> Result<(), FieldWriteError>;

    /// Object-specific re-initialization hook for schema skew.
    /// Returns true if the record re-declared its fields.
    fn reinitialize(&self, record: &mut Record) -> bool {
        let _ = record;
        false
    }

    /// Fallback skew recovery: a fresh default-constructed instance of the
    /// class, to be re-populated from the document.
    fn fresh_instance(&self, class_name: &str) -> Option<Record> {
        let _ = class_name;
        None
    }
}

/// The default accessor: fields live in the record's own map and any
/// field name is writable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynAccessor;

impl FieldAccessor for DynAccessor {
    fn enumerate(&self, record: &Record) -> Vec<(String, NodeRef)> {
        record
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn write(
        &self,
        record: &mut Record,
        name: &str,
        value: NodeRef,
    ) -> Result<(), FieldWriteError> {
        record.set_field(name, value);
        Ok(())
    }
}
