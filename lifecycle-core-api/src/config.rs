use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{Clock, LifecycleContext, DEFAULT_DATETIME_FORMAT};
use crate::domain::parse_time_zone;
use crate::error::ConfigurationError;

/// Process-level settings for the lifecycle layer.
///
/// Zones are fixed UTC offsets (`UTC`, `+03:00`, `-0530`). The attribute names
/// are the conventions applied when an entity schema opts into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Zone datetime attributes are presented in
    pub user_time_zone: String,
    /// Zone datetime attributes are persisted in
    pub storage_time_zone: String,
    /// chrono format of datetime literals
    pub datetime_format: String,
    pub soft_delete_attribute: String,
    pub date_create_attribute: String,
    pub date_update_attribute: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            user_time_zone: "UTC".to_string(),
            storage_time_zone: "UTC".to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            soft_delete_attribute: "is_delete".to_string(),
            date_create_attribute: "date_create".to_string(),
            date_update_attribute: "date_update".to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Builds a config from `LIFECYCLE_*` environment variables, keeping the
    /// default for every variable that is not set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            user_time_zone: lookup("LIFECYCLE_USER_TIME_ZONE").unwrap_or(defaults.user_time_zone),
            storage_time_zone: lookup("LIFECYCLE_STORAGE_TIME_ZONE")
                .unwrap_or(defaults.storage_time_zone),
            datetime_format: lookup("LIFECYCLE_DATETIME_FORMAT").unwrap_or(defaults.datetime_format),
            soft_delete_attribute: lookup("LIFECYCLE_SOFT_DELETE_ATTRIBUTE")
                .unwrap_or(defaults.soft_delete_attribute),
            date_create_attribute: lookup("LIFECYCLE_DATE_CREATE_ATTRIBUTE")
                .unwrap_or(defaults.date_create_attribute),
            date_update_attribute: lookup("LIFECYCLE_DATE_UPDATE_ATTRIBUTE")
                .unwrap_or(defaults.date_update_attribute),
        }
    }

    /// Checks that both zones parse
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        parse_time_zone(&self.user_time_zone)?;
        parse_time_zone(&self.storage_time_zone)?;
        Ok(())
    }

    /// Context for one request made by `principal`
    pub fn context_for(
        &self,
        principal: Option<Uuid>,
        clock: Arc<dyn Clock>,
    ) -> Result<LifecycleContext, ConfigurationError> {
        let user_zone = parse_time_zone(&self.user_time_zone)?;
        let storage_zone = parse_time_zone(&self.storage_time_zone)?;
        Ok(LifecycleContext::new(principal, user_zone, storage_zone, clock)
            .with_datetime_format(self.datetime_format.as_str()))
    }
}
