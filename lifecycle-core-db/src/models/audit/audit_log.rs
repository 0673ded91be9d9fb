use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::Identifiable;

/// Attribute name to value, as recorded in an audit entry
pub type AuditValues = BTreeMap<String, serde_json::Value>;

/// # Documentation
/// - One audit entry per save that changed at least one non-datetime attribute.
/// - `before` and `after` hold only the attributes that actually changed.
/// - `actor_id` is the principal bound to the save, or `Uuid::nil()` when none was bound.
/// - Entries are immutable once created; there are only getters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogModel {
    id: Uuid,
    actor_id: Uuid,
    target_id: Uuid,
    before: AuditValues,
    after: AuditValues,
    created_at: DateTime<Utc>,
}

impl AuditLogModel {
    /// A new entry with a fresh id
    pub fn new(
        actor_id: Uuid,
        target_id: Uuid,
        before: AuditValues,
        after: AuditValues,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::from_parts(Uuid::new_v4(), actor_id, target_id, before, after, created_at)
    }

    /// Rebuilds an entry read back from storage
    pub fn from_parts(
        id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        before: AuditValues,
        after: AuditValues,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            actor_id,
            target_id,
            before,
            after,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    pub fn target_id(&self) -> Uuid {
        self.target_id
    }

    pub fn before(&self) -> &AuditValues {
        &self.before
    }

    pub fn after(&self) -> &AuditValues {
        &self.after
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Identifiable for AuditLogModel {
    fn get_id(&self) -> Uuid {
        self.id
    }
}
