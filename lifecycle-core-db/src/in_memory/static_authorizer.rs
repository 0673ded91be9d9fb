use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use uuid::Uuid;

use crate::lifecycle::permission::Authorizer;

/// Authorizer with a fixed permission set, the same for every principal.
///
/// Remembers every permission string it was asked about.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    allow_all: bool,
    permissions: HashSet<String>,
    checked: Mutex<Vec<String>>,
}

impl StaticAuthorizer {
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            ..Self::default()
        }
    }

    pub fn deny_all() -> Self {
        Self::default()
    }

    pub fn with_permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Permission strings consulted so far, in order
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().clone()
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn can(&self, _principal: Option<Uuid>, permission: &str) -> bool {
        self.checked.lock().push(permission.to_string());
        self.allow_all || self.permissions.contains(permission)
    }
}
