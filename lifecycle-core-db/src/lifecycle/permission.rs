use async_trait::async_trait;
use lifecycle_core_api::{Action, LifecycleContext, LifecycleError, LifecycleResult};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::entity::Entity;

lazy_static::lazy_static! {
    static ref WORD_PATTERN: Result<Regex, regex::Error> = Regex::new(r"(?:^|[A-Z])[a-z]+");
    static ref POSTFIX_CACHE: RwLock<HashMap<String, Arc<str>>> = RwLock::new(HashMap::new());
}

/// Permission namespace of an entity type.
///
/// The last `::` segment of the type name is split into words, each starting
/// at an uppercase letter, and joined in kebab case with only the first letter
/// capitalized: `OrderItem` gives `Order-item`. Computed once per type name.
pub fn permission_postfix(type_name: &str) -> Arc<str> {
    if let Some(postfix) = POSTFIX_CACHE.read().get(type_name) {
        return postfix.clone();
    }

    let postfix: Arc<str> = Arc::from(derive_postfix(type_name));
    POSTFIX_CACHE
        .write()
        .entry(type_name.to_string())
        .or_insert(postfix)
        .clone()
}

fn derive_postfix(type_name: &str) -> String {
    let short_name = type_name.rsplit("::").next().unwrap_or(type_name);
    let words: Vec<String> = match &*WORD_PATTERN {
        Ok(pattern) => pattern
            .find_iter(short_name)
            .map(|m| m.as_str().to_lowercase())
            .collect(),
        Err(_) => vec![short_name.to_lowercase()],
    };

    let joined = words.join("-");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The permission decision engine consulted by the gate
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// True when `principal` holds `permission`; `None` is the anonymous caller
    async fn can(&self, principal: Option<Uuid>, permission: &str) -> bool;
}

/// How a denied check is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Denial is returned as `false`
    Mute,
    /// Denial is returned as `LifecycleError::PermissionDenied`
    Loud,
}

/// State an entity must be in for an action to make sense
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralPrecondition {
    MustBeNew,
    MustBePersisted,
    MustBeActive,
    MustBeDeleted,
    SoftDeleteUnsupported,
}

impl std::fmt::Display for StructuralPrecondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralPrecondition::MustBeNew => write!(f, "record is already saved"),
            StructuralPrecondition::MustBePersisted => write!(f, "record is not saved yet"),
            StructuralPrecondition::MustBeActive => write!(f, "record is already deleted"),
            StructuralPrecondition::MustBeDeleted => write!(f, "record is not deleted"),
            StructuralPrecondition::SoftDeleteUnsupported => write!(f, "type has no soft-delete flag"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    Permission,
    Structural(StructuralPrecondition),
}

/// Outcome of a gated predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allowed,
    Denied(DenialReason),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed)
    }
}

/// Checks the structural state of `entity` against `action`
pub fn structural_precondition(entity: &Entity, action: Action) -> Option<StructuralPrecondition> {
    match action {
        Action::Create => (!entity.is_new()).then_some(StructuralPrecondition::MustBeNew),
        Action::Update | Action::Delete => entity.is_new().then_some(StructuralPrecondition::MustBePersisted),
        Action::SoftDelete | Action::Restore => {
            if entity.is_new() {
                return Some(StructuralPrecondition::MustBePersisted);
            }
            match (action, entity.soft_delete_flag()) {
                (_, None) => Some(StructuralPrecondition::SoftDeleteUnsupported),
                (Action::SoftDelete, Some(true)) => Some(StructuralPrecondition::MustBeActive),
                (Action::Restore, Some(false)) => Some(StructuralPrecondition::MustBeDeleted),
                _ => None,
            }
        }
    }
}

/// Authorization checks keyed by action and entity-type postfix
#[derive(Clone)]
pub struct PermissionGate {
    authorizer: Arc<dyn Authorizer>,
}

impl PermissionGate {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }

    /// Consults the authorizer for `action + postfix`.
    ///
    /// # Returns
    /// * `Ok(true)` - The permission is held
    /// * `Ok(false)` - Denied in mute mode
    /// * `Err(LifecycleError::PermissionDenied)` - Denied in loud mode
    pub async fn check(
        &self,
        principal: Option<Uuid>,
        action: Action,
        postfix: &str,
        mode: CheckMode,
    ) -> LifecycleResult<bool> {
        let permission = action.permission(postfix);
        if self.authorizer.can(principal, &permission).await {
            return Ok(true);
        }

        debug!(permission = %permission, ?principal, "permission not held");
        match mode {
            CheckMode::Mute => Ok(false),
            CheckMode::Loud => {
                warn!(permission = %permission, ?principal, action = %action, "permission denied");
                Err(LifecycleError::PermissionDenied {
                    action,
                    entity_type: postfix.to_string(),
                    entity_id: None,
                    message: action.denial_message().to_string(),
                })
            }
        }
    }

    /// Structural precondition first, then the permission check.
    ///
    /// The authorizer is not consulted when the structure already rules the
    /// action out.
    pub async fn authorize(&self, entity: &Entity, action: Action, ctx: &LifecycleContext) -> Authorization {
        if let Some(precondition) = structural_precondition(entity, action) {
            return Authorization::Denied(DenialReason::Structural(precondition));
        }

        let permission = action.permission(&entity.schema().permission_postfix());
        if self.authorizer.can(ctx.principal(), &permission).await {
            Authorization::Allowed
        } else {
            Authorization::Denied(DenialReason::Permission)
        }
    }

    /// Gated predicate for `action` on `entity`
    pub async fn can(
        &self,
        entity: &Entity,
        action: Action,
        ctx: &LifecycleContext,
        mode: CheckMode,
    ) -> LifecycleResult<bool> {
        let reason = match self.authorize(entity, action, ctx).await {
            Authorization::Allowed => return Ok(true),
            Authorization::Denied(reason) => reason,
        };

        match mode {
            CheckMode::Mute => Ok(false),
            CheckMode::Loud => {
                match reason {
                    DenialReason::Permission => warn!(
                        entity_type = entity.type_name(),
                        entity_id = %entity.id(),
                        action = %action,
                        "permission denied"
                    ),
                    DenialReason::Structural(precondition) => warn!(
                        entity_type = entity.type_name(),
                        entity_id = %entity.id(),
                        action = %action,
                        %precondition,
                        "action not applicable"
                    ),
                }
                Err(LifecycleError::PermissionDenied {
                    action,
                    entity_type: entity.type_name().to_string(),
                    entity_id: Some(entity.id()),
                    message: action.denial_message().to_string(),
                })
            }
        }
    }

    pub async fn can_create(&self, entity: &Entity, ctx: &LifecycleContext, mode: CheckMode) -> LifecycleResult<bool> {
        self.can(entity, Action::Create, ctx, mode).await
    }

    pub async fn can_update(&self, entity: &Entity, ctx: &LifecycleContext, mode: CheckMode) -> LifecycleResult<bool> {
        self.can(entity, Action::Update, ctx, mode).await
    }

    pub async fn can_delete(&self, entity: &Entity, ctx: &LifecycleContext, mode: CheckMode) -> LifecycleResult<bool> {
        self.can(entity, Action::Delete, ctx, mode).await
    }

    pub async fn can_soft_delete(
        &self,
        entity: &Entity,
        ctx: &LifecycleContext,
        mode: CheckMode,
    ) -> LifecycleResult<bool> {
        self.can(entity, Action::SoftDelete, ctx, mode).await
    }

    pub async fn can_restore(&self, entity: &Entity, ctx: &LifecycleContext, mode: CheckMode) -> LifecycleResult<bool> {
        self.can(entity, Action::Restore, ctx, mode).await
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate").finish_non_exhaustive()
    }
}
