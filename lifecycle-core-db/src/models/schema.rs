use lifecycle_core_api::{AttributeType, ConfigurationError, LifecycleConfig};
use std::collections::HashSet;
use std::sync::Arc;

use crate::lifecycle::behaviors::{Behavior, TimestampBehavior};
use crate::lifecycle::permission::permission_postfix;
use crate::lifecycle::rules::{AttributeRule, BooleanRule, DateTimeFormatRule, SanitizeHtmlRule, TrimRule};

/// Name of the identifier column every entity table carries
pub const ID_COLUMN: &str = "id";

/// Name and semantic type of one persisted attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub ty: AttributeType,
}

/// What deleting a parent does to the records of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    /// A non-empty relation blocks the delete
    Restrict,
    /// Related records are deleted first, in the parent's transaction
    Cascade,
}

/// A named one-to-many reference from an entity to its dependent records.
///
/// Resolved by looking up records of `target` whose `foreign_key` attribute
/// holds the parent id.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    name: String,
    target: Arc<EntitySchema>,
    foreign_key: String,
    on_delete: OnDelete,
}

impl RelationDescriptor {
    pub fn new(
        name: impl Into<String>,
        target: Arc<EntitySchema>,
        foreign_key: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            foreign_key: foreign_key.into(),
            on_delete,
        }
    }

    pub fn restrict(name: impl Into<String>, target: Arc<EntitySchema>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, target, foreign_key, OnDelete::Restrict)
    }

    pub fn cascade(name: impl Into<String>, target: Arc<EntitySchema>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, target, foreign_key, OnDelete::Cascade)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Arc<EntitySchema> {
        &self.target
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn on_delete(&self) -> OnDelete {
        self.on_delete
    }
}

/// Descriptor of one entity type, built once and shared by every instance.
///
/// Holds the ordered attribute list, the soft-delete flag, the relations
/// consulted on delete and the rule and behavior lists applied on save.
#[derive(Debug)]
pub struct EntitySchema {
    type_name: String,
    table: String,
    audit_log_table: String,
    attributes: Vec<AttributeDescriptor>,
    transient_attributes: Vec<AttributeDescriptor>,
    datetime_attributes: Vec<String>,
    soft_delete_attribute: Option<String>,
    relations: Vec<RelationDescriptor>,
    check_relations: bool,
    rules: Vec<Arc<dyn AttributeRule>>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

impl EntitySchema {
    pub fn builder(type_name: impl Into<String>, table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(type_name, table)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn audit_log_table(&self) -> &str {
        &self.audit_log_table
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Attributes held on the entity but never written to storage or audited
    pub fn transient_attributes(&self) -> &[AttributeDescriptor] {
        &self.transient_attributes
    }

    pub fn is_transient(&self, name: &str) -> bool {
        self.transient_attributes.iter().any(|a| a.name == name)
    }

    /// Attribute names of the given types, in declaration order
    pub fn columns_by_type(&self, types: &[AttributeType]) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| types.contains(&a.ty))
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Attributes converted between the user zone and the storage zone
    pub fn datetime_attributes(&self) -> &[String] {
        &self.datetime_attributes
    }

    pub fn is_datetime_attribute(&self, name: &str) -> bool {
        self.datetime_attributes.iter().any(|a| a == name)
    }

    pub fn soft_delete_attribute(&self) -> Option<&str> {
        self.soft_delete_attribute.as_deref()
    }

    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// False when the type opted out of the dependent-record check on delete
    pub fn checks_relations(&self) -> bool {
        self.check_relations
    }

    pub fn rules(&self) -> &[Arc<dyn AttributeRule>] {
        &self.rules
    }

    pub fn behaviors(&self) -> &[Arc<dyn Behavior>] {
        &self.behaviors
    }

    /// Permission namespace of this type, see [`permission_postfix`]
    pub fn permission_postfix(&self) -> Arc<str> {
        permission_postfix(&self.type_name)
    }
}

/// Builder for [`EntitySchema`]
pub struct EntitySchemaBuilder {
    type_name: String,
    table: String,
    audit_log_table: Option<String>,
    attributes: Vec<AttributeDescriptor>,
    transient_attributes: Vec<AttributeDescriptor>,
    soft_delete_attribute: Option<String>,
    timestamps: Option<(Option<String>, Option<String>)>,
    relations: Vec<RelationDescriptor>,
    check_relations: bool,
    default_rules: bool,
    rules: Vec<Arc<dyn AttributeRule>>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

impl EntitySchemaBuilder {
    pub fn new(type_name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: table.into(),
            audit_log_table: None,
            attributes: Vec::new(),
            transient_attributes: Vec::new(),
            soft_delete_attribute: None,
            timestamps: None,
            relations: Vec::new(),
            check_relations: true,
            default_rules: true,
            rules: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.attributes.push(AttributeDescriptor { name: name.into(), ty });
        self
    }

    pub fn attributes<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeType)>,
        S: Into<String>,
    {
        for (name, ty) in columns {
            self.attributes.push(AttributeDescriptor { name: name.into(), ty });
        }
        self
    }

    /// Declares an attribute that lives only on the entity, such as the
    /// decoded side of a [`JsonBehavior`](crate::lifecycle::behaviors::JsonBehavior)
    pub fn transient(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.transient_attributes.push(AttributeDescriptor { name: name.into(), ty });
        self
    }

    /// Overrides the default `<table>_log` audit table
    pub fn audit_log_table(mut self, table: impl Into<String>) -> Self {
        self.audit_log_table = Some(table.into());
        self
    }

    pub fn soft_delete(mut self, attribute: impl Into<String>) -> Self {
        self.soft_delete_attribute = Some(attribute.into());
        self
    }

    /// Stamps the creation attribute on insert and the update attribute on
    /// every save with the current-time expression
    pub fn timestamps(mut self, create: Option<&str>, update: Option<&str>) -> Self {
        self.timestamps = Some((create.map(str::to_string), update.map(str::to_string)));
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Deletes go ahead without checking restrict relations
    pub fn skip_relation_check(mut self) -> Self {
        self.check_relations = false;
        self
    }

    /// Registers no sanitize/trim/datetime/boolean rules derived from column types
    pub fn without_default_rules(mut self) -> Self {
        self.default_rules = false;
        self
    }

    pub fn rule(mut self, rule: Arc<dyn AttributeRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn behavior(mut self, behavior: Arc<dyn Behavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Enables soft delete and timestamps for the configured attribute names
    /// that this type actually declares
    pub fn apply_conventions(mut self, config: &LifecycleConfig) -> Self {
        let declared = |name: &str, ty: AttributeType| {
            self.attributes.iter().any(|a| a.name == name && a.ty == ty)
        };

        if self.soft_delete_attribute.is_none() && declared(config.soft_delete_attribute.as_str(), AttributeType::Boolean) {
            self.soft_delete_attribute = Some(config.soft_delete_attribute.clone());
        }

        if self.timestamps.is_none() {
            let create = declared(config.date_create_attribute.as_str(), AttributeType::DateTime)
                .then(|| config.date_create_attribute.clone());
            let update = declared(config.date_update_attribute.as_str(), AttributeType::DateTime)
                .then(|| config.date_update_attribute.clone());
            if create.is_some() || update.is_some() {
                self.timestamps = Some((create, update));
            }
        }

        self
    }

    pub fn build(self) -> Result<Arc<EntitySchema>, ConfigurationError> {
        let entity_type = self.type_name.clone();
        let unknown = |attribute: &str| ConfigurationError::UnknownAttribute {
            entity_type: entity_type.clone(),
            attribute: attribute.to_string(),
        };

        let mut seen = HashSet::new();
        for attribute in self.attributes.iter().chain(&self.transient_attributes) {
            if attribute.name == ID_COLUMN || !seen.insert(attribute.name.as_str()) {
                return Err(ConfigurationError::DuplicateAttribute {
                    entity_type: entity_type.clone(),
                    attribute: attribute.name.clone(),
                });
            }
        }
        let type_of = |name: &str| self.attributes.iter().find(|a| a.name == name).map(|a| a.ty);
        let declared = |name: &str| {
            type_of(name).is_some() || self.transient_attributes.iter().any(|a| a.name == name)
        };

        if let Some(flag) = &self.soft_delete_attribute {
            match type_of(flag.as_str()) {
                Some(AttributeType::Boolean) => {}
                Some(_) => {
                    return Err(ConfigurationError::InvalidSoftDeleteAttribute {
                        entity_type: entity_type.clone(),
                        attribute: flag.clone(),
                    })
                }
                None => return Err(unknown(flag)),
            }
        }

        let mut rules: Vec<Arc<dyn AttributeRule>> = Vec::new();
        if self.default_rules {
            let strings: Vec<String> = self
                .attributes
                .iter()
                .filter(|a| a.ty.is_string_like())
                .map(|a| a.name.clone())
                .collect();
            if !strings.is_empty() {
                rules.push(Arc::new(SanitizeHtmlRule::new(strings.clone())));
                rules.push(Arc::new(TrimRule::new(strings)));
            }

            let datetimes: Vec<String> = self
                .attributes
                .iter()
                .filter(|a| a.ty == AttributeType::DateTime)
                .map(|a| a.name.clone())
                .collect();
            if !datetimes.is_empty() {
                rules.push(Arc::new(DateTimeFormatRule::new(datetimes)));
            }

            if let Some(flag) = &self.soft_delete_attribute {
                rules.push(Arc::new(BooleanRule::new(vec![flag.clone()])));
            }
        }
        for rule in self.rules {
            if let Some(missing) = rule.attributes().iter().find(|a| !declared(a.as_str())) {
                return Err(unknown(missing));
            }
            rules.push(rule);
        }

        let mut behaviors: Vec<Arc<dyn Behavior>> = Vec::new();
        if let Some((create, update)) = self.timestamps {
            for name in create.iter().chain(update.iter()) {
                if type_of(name.as_str()).is_none() {
                    return Err(unknown(name));
                }
            }
            behaviors.push(Arc::new(TimestampBehavior::new(create, update)));
        }
        behaviors.extend(self.behaviors);

        let datetime_attributes = self
            .attributes
            .iter()
            .filter(|a| a.ty == AttributeType::DateTime)
            .map(|a| a.name.clone())
            .collect();

        let audit_log_table = self
            .audit_log_table
            .unwrap_or_else(|| format!("{}_log", self.table));

        Ok(Arc::new(EntitySchema {
            type_name: self.type_name,
            table: self.table,
            audit_log_table,
            attributes: self.attributes,
            transient_attributes: self.transient_attributes,
            datetime_attributes,
            soft_delete_attribute: self.soft_delete_attribute,
            relations: self.relations,
            check_relations: self.check_relations,
            rules,
            behaviors,
        }))
    }
}
