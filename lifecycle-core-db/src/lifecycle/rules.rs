use chrono::NaiveDateTime;
use lifecycle_core_api::{AttributeValue, LifecycleContext, ValidationErrors};

use crate::models::entity::Entity;

/// A validation rule over a declared list of attributes.
///
/// Rules may normalize the value they check (trimming, coercing) before
/// judging it. Registered on the schema in order and run in that order.
pub trait AttributeRule: std::fmt::Debug + Send + Sync {
    fn attributes(&self) -> &[String];

    /// Checks one attribute, returning the message to report on failure
    fn apply(&self, entity: &mut Entity, attribute: &str, ctx: &LifecycleContext) -> Result<(), String>;
}

/// Human label of an attribute name: `date_create` gives `Date Create`
pub fn attribute_label(attribute: &str) -> String {
    attribute
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs the schema rules against `entity`.
///
/// With `only` set, rules run just for the listed attributes.
pub fn run_rules(entity: &mut Entity, ctx: &LifecycleContext, only: Option<&[String]>) -> Result<(), ValidationErrors> {
    let schema = entity.schema().clone();
    let mut errors = ValidationErrors::new();

    for rule in schema.rules() {
        for attribute in rule.attributes() {
            if only.is_some_and(|fields| !fields.contains(attribute)) {
                continue;
            }
            if let Err(message) = rule.apply(entity, attribute, ctx) {
                errors.add(attribute.clone(), message);
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Strips markup that could run in a browser from string values.
///
/// Safe tags are kept; the result is HTML, so bare `<`, `>` and `&` come back
/// as entities.
#[derive(Debug, Clone)]
pub struct SanitizeHtmlRule {
    attributes: Vec<String>,
}

impl SanitizeHtmlRule {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }
}

impl AttributeRule for SanitizeHtmlRule {
    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn apply(&self, entity: &mut Entity, attribute: &str, _ctx: &LifecycleContext) -> Result<(), String> {
        if let Some(AttributeValue::Text(value)) = entity.attributes_mut().get_mut(attribute) {
            let clean = ammonia::clean(value);
            if clean != *value {
                *value = clean;
            }
        }
        Ok(())
    }
}

/// Strips surrounding whitespace from string values
#[derive(Debug, Clone)]
pub struct TrimRule {
    attributes: Vec<String>,
}

impl TrimRule {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }
}

impl AttributeRule for TrimRule {
    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn apply(&self, entity: &mut Entity, attribute: &str, _ctx: &LifecycleContext) -> Result<(), String> {
        if let Some(AttributeValue::Text(value)) = entity.attributes_mut().get_mut(attribute) {
            let trimmed = value.trim().to_string();
            if trimmed.len() != value.len() {
                *value = trimmed;
            }
        }
        Ok(())
    }
}

/// Datetime literals must match the configured format.
///
/// Nulls, empty strings and deferred expressions are skipped.
#[derive(Debug, Clone)]
pub struct DateTimeFormatRule {
    attributes: Vec<String>,
}

impl DateTimeFormatRule {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }
}

impl AttributeRule for DateTimeFormatRule {
    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn apply(&self, entity: &mut Entity, attribute: &str, ctx: &LifecycleContext) -> Result<(), String> {
        let valid = match entity.get(attribute) {
            None | Some(AttributeValue::Null) | Some(AttributeValue::Expression(_)) => true,
            Some(AttributeValue::Text(value)) => {
                value.is_empty() || NaiveDateTime::parse_from_str(value, ctx.datetime_format()).is_ok()
            }
            Some(_) => false,
        };

        if valid {
            Ok(())
        } else {
            Err(format!("The format of {} is invalid.", attribute_label(attribute)))
        }
    }
}

/// Value must be a boolean; integers 0 and 1 are coerced
#[derive(Debug, Clone)]
pub struct BooleanRule {
    attributes: Vec<String>,
}

impl BooleanRule {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }
}

impl AttributeRule for BooleanRule {
    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn apply(&self, entity: &mut Entity, attribute: &str, _ctx: &LifecycleContext) -> Result<(), String> {
        let Some(value) = entity.attributes_mut().get_mut(attribute) else {
            return Ok(());
        };
        match value {
            AttributeValue::Null | AttributeValue::Bool(_) => Ok(()),
            AttributeValue::Integer(n @ (0 | 1)) => {
                let flag = *n == 1;
                *value = AttributeValue::Bool(flag);
                Ok(())
            }
            _ => Err(format!("{} must be either true or false.", attribute_label(attribute))),
        }
    }
}

/// Text values must hold a JSON document.
///
/// Nulls and structured values pass.
#[derive(Debug, Clone)]
pub struct JsonRule {
    attributes: Vec<String>,
}

impl JsonRule {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }
}

impl AttributeRule for JsonRule {
    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn apply(&self, entity: &mut Entity, attribute: &str, _ctx: &LifecycleContext) -> Result<(), String> {
        match entity.get(attribute) {
            None
            | Some(AttributeValue::Null)
            | Some(AttributeValue::Json(_))
            | Some(AttributeValue::Bool(_))
            | Some(AttributeValue::Integer(_))
            | Some(AttributeValue::Float(_)) => Ok(()),
            Some(AttributeValue::Text(value)) => serde_json::from_str::<serde_json::Value>(value)
                .map(|_| ())
                .map_err(|err| format!("{} is not valid JSON: {err}.", attribute_label(attribute))),
            Some(_) => Err(format!("{} is not valid JSON.", attribute_label(attribute))),
        }
    }
}

/// Value must be a list; nulls are skipped
#[derive(Debug, Clone)]
pub struct ArrayRule {
    attributes: Vec<String>,
}

impl ArrayRule {
    pub fn new(attributes: Vec<String>) -> Self {
        Self { attributes }
    }
}

impl AttributeRule for ArrayRule {
    fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn apply(&self, entity: &mut Entity, attribute: &str, _ctx: &LifecycleContext) -> Result<(), String> {
        match entity.get(attribute) {
            None | Some(AttributeValue::Null) | Some(AttributeValue::Json(serde_json::Value::Array(_))) => Ok(()),
            Some(_) => Err(format!("{} must be a list.", attribute_label(attribute))),
        }
    }
}
