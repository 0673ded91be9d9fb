use lifecycle_core_api::{AttributeType, AttributeValue, Expression, LifecycleContext, LifecycleResult};
use tracing::warn;

use crate::models::entity::Entity;

/// What a save is about to write
#[derive(Debug, Clone, Copy)]
pub struct SaveEvent<'a> {
    pub insert: bool,
    /// Allowlist of a partial update; `None` for a full save
    pub fields: Option<&'a [String]>,
}

impl<'a> SaveEvent<'a> {
    pub fn insert() -> Self {
        Self { insert: true, fields: None }
    }

    pub fn update(fields: Option<&'a [String]>) -> Self {
        Self { insert: false, fields }
    }

    /// True when the save writes `attribute`
    pub fn touches(&self, attribute: &str) -> bool {
        self.fields.map_or(true, |fields| fields.iter().any(|f| f == attribute))
    }
}

/// Attribute transform hooks attached to an entity type.
///
/// Every hook defaults to doing nothing. Behaviors run in registration order.
pub trait Behavior: std::fmt::Debug + Send + Sync {
    /// After a record was loaded and converted to the user zone
    fn after_find(&self, _entity: &mut Entity, _ctx: &LifecycleContext) {}

    fn before_validate(&self, _entity: &mut Entity, _event: &SaveEvent<'_>, _ctx: &LifecycleContext) {}

    /// Before datetime attributes are converted to the storage zone
    fn before_save(&self, _entity: &mut Entity, _event: &SaveEvent<'_>, _ctx: &LifecycleContext) {}

    /// After refresh and conversion back to the user zone
    fn after_save(&self, _entity: &Entity, _event: &SaveEvent<'_>, _ctx: &LifecycleContext) {}

    /// May veto the delete of one record
    fn before_delete(&self, _entity: &Entity, _ctx: &LifecycleContext) -> LifecycleResult<()> {
        Ok(())
    }
}

/// Stamps creation and update attributes with the current storage time
#[derive(Debug, Clone)]
pub struct TimestampBehavior {
    created: Option<String>,
    updated: Option<String>,
}

impl TimestampBehavior {
    pub fn new(created: Option<String>, updated: Option<String>) -> Self {
        Self { created, updated }
    }

    fn stamp(entity: &mut Entity, attribute: &str) {
        entity
            .attributes_mut()
            .insert(attribute.to_string(), AttributeValue::Expression(Expression::CurrentTimestamp));
    }
}

impl Behavior for TimestampBehavior {
    fn before_validate(&self, entity: &mut Entity, event: &SaveEvent<'_>, _ctx: &LifecycleContext) {
        if event.insert {
            if let Some(created) = &self.created {
                Self::stamp(entity, created);
            }
        }
        if let Some(updated) = &self.updated {
            if event.touches(updated) {
                Self::stamp(entity, updated);
            }
        }
    }
}

/// Keeps structured attributes in step with the JSON columns they persist in.
///
/// Each mapping pairs a value attribute, usually transient, with a JSON or
/// text column. Loading decodes the column into the value attribute; an
/// undecodable column gives null. Saving encodes the value attribute back
/// into the column before validation, so the column is written and audited
/// like any other change. Text columns also pass through the default
/// sanitize rule.
#[derive(Debug, Clone)]
pub struct JsonBehavior {
    mappings: Vec<(String, String)>,
}

impl JsonBehavior {
    /// `mappings` holds `(value attribute, json column)` pairs
    pub fn new<I, A, C>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: Into<String>,
        C: Into<String>,
    {
        Self {
            mappings: mappings
                .into_iter()
                .map(|(attribute, column)| (attribute.into(), column.into()))
                .collect(),
        }
    }

    fn decode(value: Option<&AttributeValue>) -> Option<serde_json::Value> {
        match value? {
            AttributeValue::Json(json) => Some(json.clone()),
            AttributeValue::Text(text) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }

    fn encode(value: &AttributeValue, column_type: Option<AttributeType>) -> AttributeValue {
        if value.is_null() {
            return AttributeValue::Null;
        }
        let json = value.to_json();
        match column_type {
            Some(AttributeType::String | AttributeType::Text) => AttributeValue::Text(json.to_string()),
            _ => AttributeValue::Json(json),
        }
    }
}

impl Behavior for JsonBehavior {
    fn after_find(&self, entity: &mut Entity, _ctx: &LifecycleContext) {
        for (attribute, column) in &self.mappings {
            let decoded = Self::decode(entity.get(column));
            if decoded.is_none() && entity.get(column).is_some_and(|v| !v.is_null()) {
                warn!(
                    entity_type = entity.type_name(),
                    entity_id = %entity.id(),
                    column = column.as_str(),
                    "column does not hold JSON"
                );
            }
            let value = decoded.map_or(AttributeValue::Null, AttributeValue::Json);
            entity.attributes_mut().insert(attribute.clone(), value);
        }
    }

    fn before_validate(&self, entity: &mut Entity, event: &SaveEvent<'_>, _ctx: &LifecycleContext) {
        for (attribute, column) in &self.mappings {
            if !event.touches(column) {
                continue;
            }
            let column_type = entity.schema().attribute(column).map(|a| a.ty);
            let encoded = match entity.get(attribute) {
                Some(value) => Self::encode(value, column_type),
                None => AttributeValue::Null,
            };
            entity.attributes_mut().insert(column.clone(), encoded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::EntitySchema;
    use lifecycle_core_api::AttributeType;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn schema() -> std::sync::Arc<EntitySchema> {
        EntitySchema::builder("Article", "article")
            .attribute("title", AttributeType::String)
            .attribute("date_create", AttributeType::DateTime)
            .attribute("date_update", AttributeType::DateTime)
            .timestamps(Some("date_create"), Some("date_update"))
            .build()
            .unwrap()
    }

    fn stamped(entity: &Entity, attribute: &str) -> bool {
        entity.get(attribute) == Some(&AttributeValue::Expression(Expression::CurrentTimestamp))
    }

    #[test]
    fn test_insert_stamps_both_attributes() {
        let ctx = LifecycleContext::utc(None);
        let mut entity = Entity::new(schema());
        let behavior = TimestampBehavior::new(Some("date_create".into()), Some("date_update".into()));

        behavior.before_validate(&mut entity, &SaveEvent::insert(), &ctx);

        assert!(stamped(&entity, "date_create"));
        assert!(stamped(&entity, "date_update"));
    }

    #[test]
    fn test_update_stamps_only_the_update_attribute() {
        let ctx = LifecycleContext::utc(None);
        let mut entity = Entity::from_storage(schema(), Uuid::new_v4(), BTreeMap::new());
        let behavior = TimestampBehavior::new(Some("date_create".into()), Some("date_update".into()));

        behavior.before_validate(&mut entity, &SaveEvent::update(None), &ctx);
        assert!(!stamped(&entity, "date_create"));
        assert!(stamped(&entity, "date_update"));
    }

    #[test]
    fn test_partial_update_respects_the_allowlist() {
        let ctx = LifecycleContext::utc(None);
        let mut entity = Entity::from_storage(schema(), Uuid::new_v4(), BTreeMap::new());
        let behavior = TimestampBehavior::new(None, Some("date_update".into()));

        let fields = vec!["title".to_string()];
        behavior.before_validate(&mut entity, &SaveEvent::update(Some(&fields)), &ctx);
        assert!(!stamped(&entity, "date_update"));
    }

    fn document_schema() -> std::sync::Arc<EntitySchema> {
        EntitySchema::builder("Document", "document")
            .attribute("tags_json", AttributeType::Json)
            .attribute("meta_text", AttributeType::Text)
            .transient("tags", AttributeType::Json)
            .transient("meta", AttributeType::Json)
            .build()
            .unwrap()
    }

    fn json_behavior() -> JsonBehavior {
        JsonBehavior::new([("tags", "tags_json"), ("meta", "meta_text")])
    }

    #[test]
    fn test_after_find_decodes_json_columns() {
        let ctx = LifecycleContext::utc(None);
        let values = [
            ("tags_json".to_string(), AttributeValue::Json(serde_json::json!(["a", "b"]))),
            ("meta_text".to_string(), AttributeValue::text(r#"{"pages": 3}"#)),
        ]
        .into_iter()
        .collect();
        let mut entity = Entity::from_storage(document_schema(), Uuid::new_v4(), values);

        json_behavior().after_find(&mut entity, &ctx);

        assert_eq!(entity.get("tags"), Some(&AttributeValue::Json(serde_json::json!(["a", "b"]))));
        assert_eq!(entity.get("meta"), Some(&AttributeValue::Json(serde_json::json!({"pages": 3}))));
    }

    #[test]
    fn test_undecodable_column_gives_null() {
        let ctx = LifecycleContext::utc(None);
        let values = [("meta_text".to_string(), AttributeValue::text("{oops"))].into_iter().collect();
        let mut entity = Entity::from_storage(document_schema(), Uuid::new_v4(), values);

        json_behavior().after_find(&mut entity, &ctx);

        assert_eq!(entity.get("meta"), Some(&AttributeValue::Null));
        assert_eq!(entity.get("tags"), Some(&AttributeValue::Null));
    }

    #[test]
    fn test_save_encodes_by_column_type() {
        let ctx = LifecycleContext::utc(None);
        let mut entity = Entity::new(document_schema());
        entity.set("tags", AttributeValue::Json(serde_json::json!(["x"]))).unwrap();
        entity.set("meta", AttributeValue::Json(serde_json::json!({"pages": 1}))).unwrap();

        json_behavior().before_validate(&mut entity, &SaveEvent::insert(), &ctx);

        assert_eq!(entity.get("tags_json"), Some(&AttributeValue::Json(serde_json::json!(["x"]))));
        assert_eq!(entity.get("meta_text"), Some(&AttributeValue::text(r#"{"pages":1}"#)));
        assert_eq!(entity.dirty_attributes(), vec!["tags_json".to_string(), "meta_text".to_string()]);
    }

    #[test]
    fn test_partial_update_encodes_only_listed_columns() {
        let ctx = LifecycleContext::utc(None);
        let mut entity = Entity::from_storage(document_schema(), Uuid::new_v4(), BTreeMap::new());
        entity.set("tags", AttributeValue::Json(serde_json::json!(["x"]))).unwrap();
        entity.set("meta", AttributeValue::Json(serde_json::json!({}))).unwrap();

        let fields = vec!["tags_json".to_string()];
        json_behavior().before_validate(&mut entity, &SaveEvent::update(Some(&fields)), &ctx);

        assert_eq!(entity.dirty_attributes(), vec!["tags_json".to_string()]);
    }
}
