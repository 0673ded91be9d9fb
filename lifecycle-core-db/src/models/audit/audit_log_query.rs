use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::audit_log::AuditLogModel;

/// Filter for searching an audit log table.
///
/// Unset fields do not filter. Results are always ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogQuery {
    pub id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub target_id: Option<Uuid>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_until: Option<DateTime<Utc>>,
}

impl AuditLogQuery {
    /// All entries written for one target entity
    pub fn for_target(target_id: Uuid) -> Self {
        Self {
            target_id: Some(target_id),
            ..Self::default()
        }
    }

    pub fn by_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn created_between(mut self, from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_until = Some(until);
        self
    }

    /// True when `entry` passes every set filter
    pub fn matches(&self, entry: &AuditLogModel) -> bool {
        self.id.map_or(true, |id| entry.id() == id)
            && self.actor_id.map_or(true, |id| entry.actor_id() == id)
            && self.target_id.map_or(true, |id| entry.target_id() == id)
            && self.created_from.map_or(true, |from| entry.created_at() >= from)
            && self.created_until.map_or(true, |until| entry.created_at() < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn entry(actor: Uuid, target: Uuid, at: DateTime<Utc>) -> AuditLogModel {
        AuditLogModel::new(actor, target, BTreeMap::new(), BTreeMap::new(), at)
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let e = entry(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert!(AuditLogQuery::default().matches(&e));
    }

    #[test]
    fn test_filters_combine() {
        let actor = Uuid::new_v4();
        let target = Uuid::new_v4();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let e = entry(actor, target, at);

        assert!(AuditLogQuery::for_target(target).by_actor(actor).matches(&e));
        assert!(!AuditLogQuery::for_target(target).by_actor(Uuid::new_v4()).matches(&e));
        assert!(AuditLogQuery::for_target(target)
            .created_between(at, at + Duration::hours(1))
            .matches(&e));
        assert!(!AuditLogQuery::for_target(target)
            .created_between(at - Duration::hours(1), at)
            .matches(&e));
    }
}
