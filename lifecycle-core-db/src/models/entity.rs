use lifecycle_core_api::{AttributeValue, ConfigurationError, LifecycleContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::lifecycle::timezone::TimezoneNormalizer;
use crate::models::auditable::Auditable;
use crate::models::identifiable::Identifiable;
use crate::models::schema::EntitySchema;

/// Zone the datetime attributes of an entity are currently expressed in.
///
/// Exactly one form is native at a time; the normalizer flips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeForm {
    User,
    Storage,
}

/// A persistent record with typed attributes.
///
/// `loaded` is the attribute snapshot taken after the last load or save and is
/// what dirty tracking compares against.
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<EntitySchema>,
    id: Uuid,
    attributes: BTreeMap<String, AttributeValue>,
    loaded: BTreeMap<String, AttributeValue>,
    persisted: bool,
    datetime_form: DateTimeForm,
}

impl Entity {
    /// A new, unsaved record with every attribute null
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self::with_id(schema, Uuid::new_v4())
    }

    pub fn with_id(schema: Arc<EntitySchema>, id: Uuid) -> Self {
        let attributes = schema
            .attributes()
            .iter()
            .chain(schema.transient_attributes())
            .map(|a| (a.name.clone(), AttributeValue::Null))
            .collect();
        Self {
            schema,
            id,
            attributes,
            loaded: BTreeMap::new(),
            persisted: false,
            datetime_form: DateTimeForm::User,
        }
    }

    /// A record read from storage, datetime attributes still in the storage zone.
    ///
    /// Attributes missing from `values` are null, as are transient attributes;
    /// values for undeclared attributes are dropped.
    pub fn from_storage(
        schema: Arc<EntitySchema>,
        id: Uuid,
        mut values: BTreeMap<String, AttributeValue>,
    ) -> Self {
        let mut attributes: BTreeMap<String, AttributeValue> = schema
            .attributes()
            .iter()
            .map(|a| {
                let value = values.remove(&a.name).unwrap_or(AttributeValue::Null);
                (a.name.clone(), value)
            })
            .collect();
        for transient in schema.transient_attributes() {
            attributes.insert(transient.name.clone(), AttributeValue::Null);
        }
        Self {
            schema,
            id,
            loaded: attributes.clone(),
            attributes,
            persisted: true,
            datetime_form: DateTimeForm::Storage,
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.type_name()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// True until the record has been inserted, and again after it is deleted
    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn set(
        &mut self,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<&mut Self, ConfigurationError> {
        if !self.attributes.contains_key(attribute) {
            return Err(ConfigurationError::UnknownAttribute {
                entity_type: self.schema.type_name().to_string(),
                attribute: attribute.to_string(),
            });
        }
        self.attributes.insert(attribute.to_string(), value.into());
        Ok(self)
    }

    /// Value as of the last load or save; null for a new record
    pub fn old_value(&self, attribute: &str) -> AttributeValue {
        self.loaded.get(attribute).cloned().unwrap_or(AttributeValue::Null)
    }

    /// Attributes changed since the last load or save, in declaration order.
    ///
    /// For a new record every non-null attribute counts as changed.
    pub fn dirty_attributes(&self) -> Vec<String> {
        self.schema
            .attributes()
            .iter()
            .filter(|a| {
                let current = self.attributes.get(&a.name).unwrap_or(&AttributeValue::Null);
                if self.persisted {
                    self.loaded.get(&a.name) != Some(current)
                } else {
                    !current.is_null()
                }
            })
            .map(|a| a.name.clone())
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_attributes().is_empty()
    }

    /// Soft-delete flag, or `None` when the type has no flag
    pub fn soft_delete_flag(&self) -> Option<bool> {
        let flag = self.schema.soft_delete_attribute()?;
        Some(self.get(flag).and_then(AttributeValue::as_bool).unwrap_or(false))
    }

    pub fn datetime_form(&self) -> DateTimeForm {
        self.datetime_form
    }

    /// Datetime attribute converted to the storage zone; empty when unset or unparseable
    pub fn storage_value(&self, attribute: &str, ctx: &LifecycleContext) -> String {
        let Some(value) = self.get(attribute).and_then(AttributeValue::as_str) else {
            return String::new();
        };
        match self.datetime_form {
            DateTimeForm::Storage => value.to_string(),
            DateTimeForm::User => TimezoneNormalizer::from_context(ctx).to_storage(value),
        }
    }

    /// Datetime attribute rendered in the user zone with a chrono `format`
    pub fn format_datetime(&self, attribute: &str, format: &str, ctx: &LifecycleContext) -> String {
        let Some(value) = self.get(attribute).and_then(AttributeValue::as_str) else {
            return String::new();
        };
        let normalizer = TimezoneNormalizer::from_context(ctx);
        match self.datetime_form {
            DateTimeForm::User => normalizer.reformat(value, format),
            DateTimeForm::Storage => normalizer.reformat(&normalizer.to_user(value), format),
        }
    }

    /// Replaces the attributes with a fresh copy read from storage.
    ///
    /// Transient attributes keep their current values.
    pub fn reload_from(&mut self, fresh: Entity) {
        let mut attributes = fresh.attributes;
        for transient in self.schema.transient_attributes() {
            if let Some(value) = self.attributes.remove(&transient.name) {
                attributes.insert(transient.name.clone(), value);
            }
        }
        self.attributes = attributes;
        self.datetime_form = fresh.datetime_form;
        self.persisted = true;
    }

    pub(crate) fn set_datetime_form(&mut self, form: DateTimeForm) {
        self.datetime_form = form;
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, AttributeValue> {
        &mut self.attributes
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    pub(crate) fn mark_detached(&mut self) {
        self.persisted = false;
        self.loaded.clear();
    }

    /// Takes the current attributes as the clean baseline
    pub(crate) fn snapshot(&mut self) {
        self.loaded = self.attributes.clone();
    }
}

impl Identifiable for Entity {
    fn get_id(&self) -> Uuid {
        self.id
    }
}

impl Auditable for Entity {
    fn audit_log_table(&self) -> &str {
        self.schema.audit_log_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_core_api::AttributeType;

    fn schema() -> Arc<EntitySchema> {
        EntitySchema::builder("Article", "article")
            .attribute("title", AttributeType::String)
            .attribute("views", AttributeType::Integer)
            .attribute("is_delete", AttributeType::Boolean)
            .attribute("date_create", AttributeType::DateTime)
            .soft_delete("is_delete")
            .build()
            .unwrap()
    }

    #[test]
    fn test_new_entity_is_dirty_only_for_set_attributes() {
        let mut entity = Entity::new(schema());
        assert!(entity.is_new());
        assert!(!entity.is_dirty());

        entity.set("title", "Hello").unwrap();
        assert_eq!(entity.dirty_attributes(), vec!["title".to_string()]);
    }

    #[test]
    fn test_loaded_entity_tracks_changes_against_snapshot() {
        let values = [
            ("title".to_string(), AttributeValue::text("x")),
            ("views".to_string(), AttributeValue::Integer(1)),
        ]
        .into_iter()
        .collect();
        let mut entity = Entity::from_storage(schema(), Uuid::new_v4(), values);
        assert!(!entity.is_new());
        assert!(!entity.is_dirty());

        entity.set("views", 2).unwrap();
        entity.set("title", "x").unwrap();
        assert_eq!(entity.dirty_attributes(), vec!["views".to_string()]);
        assert_eq!(entity.old_value("views"), AttributeValue::Integer(1));
    }

    #[test]
    fn test_unknown_attribute_is_a_configuration_error() {
        let mut entity = Entity::new(schema());
        let err = entity.set("nope", 1).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownAttribute { .. }));
    }

    #[test]
    fn test_soft_delete_flag_defaults_to_active() {
        let mut entity = Entity::new(schema());
        assert_eq!(entity.soft_delete_flag(), Some(false));
        entity.set("is_delete", true).unwrap();
        assert_eq!(entity.soft_delete_flag(), Some(true));

        let plain = EntitySchema::builder("Tag", "tag").build().unwrap();
        assert_eq!(Entity::new(plain).soft_delete_flag(), None);
    }

    #[test]
    fn test_date_helpers_convert_between_zones() {
        let ctx = LifecycleContext::new(
            None,
            lifecycle_core_api::parse_time_zone("+03:00").unwrap(),
            lifecycle_core_api::parse_time_zone("UTC").unwrap(),
            Arc::new(lifecycle_core_api::SystemClock),
        );
        let mut entity = Entity::new(schema());
        entity.set("date_create", "2024-01-10 12:30:00").unwrap();

        assert_eq!(entity.storage_value("date_create", &ctx), "2024-01-10 09:30:00");
        assert_eq!(entity.format_datetime("date_create", "%Y.%m.%d", &ctx), "2024.01.10");
        assert_eq!(entity.storage_value("title", &ctx), "");
    }

    #[test]
    fn test_transient_attributes_survive_reload_and_are_never_dirty() {
        let schema = EntitySchema::builder("Article", "article")
            .attribute("title", AttributeType::String)
            .transient("tags", AttributeType::Json)
            .build()
            .unwrap();
        let mut entity = Entity::from_storage(schema.clone(), Uuid::new_v4(), BTreeMap::new());
        entity.set("tags", AttributeValue::Json(serde_json::json!(["a"]))).unwrap();
        assert!(!entity.is_dirty());

        let values = [("title".to_string(), AttributeValue::text("fresh"))].into_iter().collect();
        entity.reload_from(Entity::from_storage(schema, entity.id(), values));

        assert_eq!(entity.get("title"), Some(&AttributeValue::text("fresh")));
        assert_eq!(entity.get("tags"), Some(&AttributeValue::Json(serde_json::json!(["a"]))));
    }
}
