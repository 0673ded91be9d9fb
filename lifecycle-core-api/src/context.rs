use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::TimeZoneSpec;

/// Actor recorded on audit entries when no principal is bound to the call
pub const UNKNOWN_ACTOR: Uuid = Uuid::nil();

/// Default literal format of datetime attributes
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant, for deterministic tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Everything a lifecycle call needs to know about who is calling and how
/// dates are presented to them.
///
/// Passed explicitly into every lifecycle operation.
#[derive(Debug, Clone)]
pub struct LifecycleContext {
    principal: Option<Uuid>,
    user_zone: TimeZoneSpec,
    storage_zone: TimeZoneSpec,
    datetime_format: Arc<str>,
    clock: Arc<dyn Clock>,
}

impl LifecycleContext {
    pub fn new(
        principal: Option<Uuid>,
        user_zone: TimeZoneSpec,
        storage_zone: TimeZoneSpec,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            principal,
            user_zone,
            storage_zone,
            datetime_format: Arc::from(DEFAULT_DATETIME_FORMAT),
            clock,
        }
    }

    /// A context with both zones in UTC and the system clock
    pub fn utc(principal: Option<Uuid>) -> Self {
        let utc = TimeZoneSpec::utc();
        Self::new(principal, utc, utc, Arc::new(SystemClock))
    }

    pub fn with_datetime_format(mut self, format: impl Into<Arc<str>>) -> Self {
        self.datetime_format = format.into();
        self
    }

    pub fn with_principal(mut self, principal: Option<Uuid>) -> Self {
        self.principal = principal;
        self
    }

    pub fn principal(&self) -> Option<Uuid> {
        self.principal
    }

    /// The principal, or [`UNKNOWN_ACTOR`] when none is bound
    pub fn actor_id(&self) -> Uuid {
        self.principal.unwrap_or(UNKNOWN_ACTOR)
    }

    pub fn user_zone(&self) -> TimeZoneSpec {
        self.user_zone
    }

    pub fn storage_zone(&self) -> TimeZoneSpec {
        self.storage_zone
    }

    pub fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
