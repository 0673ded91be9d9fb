use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lifecycle_core_api::{AttributeValue, LifecycleContext, TimeZoneSpec};
use std::fmt::Write;
use std::sync::Arc;

use crate::models::entity::{DateTimeForm, Entity};

/// Formats tried after the configured one when reading a literal
const FALLBACK_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Renders `instant` with a chrono format string; an invalid format yields an empty string
pub fn render_datetime<Tz>(instant: &DateTime<Tz>, format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    if write!(out, "{}", instant.format(format)).is_err() {
        return String::new();
    }
    out
}

/// Converts datetime literals between the user zone and the storage zone.
///
/// Conversion never fails: empty or unparseable input yields an empty string,
/// as does a wall-clock time skipped by a daylight-saving jump.
#[derive(Debug, Clone)]
pub struct TimezoneNormalizer {
    user_zone: TimeZoneSpec,
    storage_zone: TimeZoneSpec,
    format: Arc<str>,
}

impl TimezoneNormalizer {
    pub fn new(user_zone: TimeZoneSpec, storage_zone: TimeZoneSpec, format: impl Into<Arc<str>>) -> Self {
        Self {
            user_zone,
            storage_zone,
            format: format.into(),
        }
    }

    pub fn from_context(ctx: &LifecycleContext) -> Self {
        Self::new(ctx.user_zone(), ctx.storage_zone(), ctx.datetime_format())
    }

    /// User-zone literal to storage-zone literal
    pub fn to_storage(&self, value: &str) -> String {
        self.convert(value, self.user_zone, self.storage_zone, &self.format)
    }

    /// Storage-zone literal to user-zone literal
    pub fn to_user(&self, value: &str) -> String {
        self.convert(value, self.storage_zone, self.user_zone, &self.format)
    }

    /// Re-renders a literal with another format without changing its zone
    pub fn reformat(&self, value: &str, format: &str) -> String {
        self.convert(value, self.user_zone, self.user_zone, format)
    }

    /// Converts every datetime attribute of `entity` to the storage zone.
    ///
    /// Expressions and nulls pass through. Does nothing when the entity is
    /// already in storage form.
    pub fn entity_to_storage(&self, entity: &mut Entity) {
        if entity.datetime_form() == DateTimeForm::Storage {
            return;
        }
        self.convert_entity(entity, |value| self.to_storage(value));
        entity.set_datetime_form(DateTimeForm::Storage);
    }

    /// Converts every datetime attribute of `entity` to the user zone
    pub fn entity_to_user(&self, entity: &mut Entity) {
        if entity.datetime_form() == DateTimeForm::User {
            return;
        }
        self.convert_entity(entity, |value| self.to_user(value));
        entity.set_datetime_form(DateTimeForm::User);
    }

    fn convert_entity(&self, entity: &mut Entity, convert: impl Fn(&str) -> String) {
        let schema = entity.schema().clone();
        let attributes = entity.attributes_mut();
        for name in schema.datetime_attributes() {
            let Some(value) = attributes.get_mut(name) else {
                continue;
            };
            if let AttributeValue::Text(literal) = value {
                let converted = convert(literal);
                *value = if converted.is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::Text(converted)
                };
            }
        }
    }

    fn convert(&self, value: &str, from: TimeZoneSpec, to: TimeZoneSpec, format: &str) -> String {
        let value = value.trim();
        if value.is_empty() {
            return String::new();
        }
        match self.parse_in(value, from) {
            Some(instant) => render_datetime(&to.from_utc(&instant.with_timezone(&Utc)), format),
            None => String::new(),
        }
    }

    fn parse_in(&self, value: &str, zone: TimeZoneSpec) -> Option<DateTime<FixedOffset>> {
        if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
            return Some(instant);
        }

        let naive = NaiveDateTime::parse_from_str(value, &self.format)
            .ok()
            .or_else(|| {
                FALLBACK_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })?;

        zone.from_local(&naive)
    }
}
