use serde::{Deserialize, Serialize};

/// Mutations gated by a permission check.
///
/// The permission string consulted for an action is the action name followed by
/// the entity type's permission postfix, e.g. `updateOrder-item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Delete,
    SoftDelete,
    Restore,
}

impl Action {
    /// Permission name prefix for this action
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::SoftDelete => "softDelete",
            Action::Restore => "restore",
        }
    }

    /// Full permission string for an entity type postfix
    pub fn permission(&self, postfix: &str) -> String {
        format!("{}{postfix}", self.as_str())
    }

    /// User-facing message reported when the action is denied
    pub fn denial_message(&self) -> &'static str {
        match self {
            Action::Create => "You are not allowed to create this record.",
            Action::Update => "You are not allowed to update this record.",
            Action::Delete => "You are not allowed to delete this record.",
            Action::SoftDelete => "You are not allowed to move this record to the trash.",
            Action::Restore => "You are not allowed to restore this record.",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
