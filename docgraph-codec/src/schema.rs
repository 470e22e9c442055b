//! Templates and the schema guard.
//!
//! A template is the externally-owned schema for one record class: an
//! ordered set of named fields with nullability flags, plus one default
//! policy for fields not explicitly declared. The guard is permissive by
//! default — no template registered for a class, or a disabled registry,
//! means no checking.

use crate::error::{CodecError, CodecResult};
use docgraph_types::{Node, NodeRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One declared field: name plus nullability. A non-nullable field is
/// required to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub nullable: bool,
}

impl FieldSpec {
    /// A required (non-nullable) field.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
        }
    }

    /// An optional (nullable) field.
    #[must_use]
    pub fn nullable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
        }
    }
}

/// Schema for one record class. Read-only once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    fields: Vec<FieldSpec>,
    default: FieldSpec,
}

impl Template {
    /// Creates a template from declared fields and the default policy
    /// applied to undeclared fields.
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>, default: FieldSpec) -> Self {
        Self { fields, default }
    }

    /// The declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up one declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// The fallback policy for fields with no explicit entry.
    #[must_use]
    pub fn default_field(&self) -> &FieldSpec {
        &self.default
    }
}

/// External registry of templates, fetched by class name.
pub trait TemplateRegistry {
    /// Returns the template for a class, if one is registered.
    fn template(&self, class_name: &str) -> Option<&Template>;

    /// A disabled registry skips all schema checking.
    fn enabled(&self) -> bool {
        true
    }
}

/// An in-memory template registry.
#[derive(Debug, Default)]
pub struct StaticTemplates {
    templates: HashMap<String, Template>,
    disabled: bool,
}

impl StaticTemplates {
    /// Creates an empty (fully permissive) registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template for a class.
    pub fn register(&mut self, class_name: impl Into<String>, template: Template) {
        self.templates.insert(class_name.into(), template);
    }

    /// Globally disables schema checking.
    pub fn disable(&mut self) {
        self.disabled = true;
    }
}

impl TemplateRegistry for StaticTemplates {
    fn template(&self, class_name: &str) -> Option<&Template> {
        self.templates.get(class_name)
    }

    fn enabled(&self) -> bool {
        !self.disabled
    }
}

/// Verifies a record's field map against its class template before the
/// record is written.
pub struct SchemaGuard<'a> {
    registry: &'a dyn TemplateRegistry,
}

impl<'a> SchemaGuard<'a> {
    /// Creates a guard over the given registry.
    #[must_use]
    pub fn new(registry: &'a dyn TemplateRegistry) -> Self {
        Self { registry }
    }

    /// Checks that every required field is present and that null values
    /// only appear in nullable fields. Skips entirely when the registry
    /// is disabled or has no template for the class.
    pub fn check(&self, class_name: &str, fields: &BTreeMap<String, NodeRef>) -> CodecResult<()> {
        if !self.registry.enabled() {
            return Ok(());
        }
        let Some(template) = self.registry.template(class_name) else {
            return Ok(());
        };

        for spec in template.fields() {
            if !spec.nullable && !fields.contains_key(&spec.name) {
                return Err(CodecError::SchemaViolation {
                    class: class_name.to_string(),
                    field: spec.name.clone(),
                    reason: "required field is missing".to_string(),
                });
            }
        }

        for (name, value) in fields {
            let is_null = matches!(&*value.borrow(), Node::Scalar(s) if s.is_null());
            if !is_null {
                continue;
            }
            let nullable = template
                .field(name)
                .unwrap_or_else(|| template.default_field())
                .nullable;
            if !nullable {
                return Err(CodecError::SchemaViolation {
                    class: class_name.to_string(),
                    field: name.clone(),
                    reason: "null value in non-nullable field".to_string(),
                });
            }
        }
        Ok(())
    }
}
