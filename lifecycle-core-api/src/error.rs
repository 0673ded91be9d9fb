use thiserror::Error;
use uuid::Uuid;

use crate::domain::Action;

/// Error type returned by storage and audit-log collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Defects in an entity type declaration or in configuration.
///
/// These never depend on user input; they are reported separately from the
/// authorization outcomes so callers do not handle both on the same path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Relation '{name}' of entity type {entity_type} does not resolve: {reason}")]
    MisconfiguredRelation {
        entity_type: String,
        name: String,
        reason: String,
    },

    #[error("Attribute '{attribute}' is not declared on entity type {entity_type}")]
    UnknownAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("Attribute '{attribute}' is declared more than once on entity type {entity_type}")]
    DuplicateAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("Soft-delete attribute '{attribute}' of entity type {entity_type} must be a boolean column")]
    InvalidSoftDeleteAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("Invalid time zone: {0}")]
    InvalidTimeZone(String),
}

/// A single failed validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub attribute: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.attribute, self.message)
    }
}

/// All validation failures collected for one save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            attribute: attribute.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Errors reported for one attribute
    pub fn for_attribute<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a ValidationError> + 'a {
        self.errors.iter().filter(move |e| e.attribute == attribute)
    }

    /// The first error message, the one usually shown to a user
    pub fn first(&self) -> Option<&str> {
        self.errors.first().map(|e| e.message.as_str())
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A loud permission check failed, or its structural precondition did not hold
    #[error("{message}")]
    PermissionDenied {
        action: Action,
        entity_type: String,
        entity_id: Option<Uuid>,
        message: String,
    },

    #[error("Cannot delete {entity_type} {entity_id}: relation '{relation}' still has dependent records")]
    HasDependents {
        entity_type: String,
        entity_id: Uuid,
        relation: String,
    },

    #[error("Deleting {entity_type} {entity_id} failed while removing dependent records; nothing was deleted: {cause}")]
    CascadeFailure {
        entity_type: String,
        entity_id: Uuid,
        #[source]
        cause: Box<LifecycleError>,
    },

    /// The entity write committed but its audit entry could not be stored
    #[error("{entity_type} {entity_id} was saved but its audit entry could not be written: {cause}")]
    AuditWriteFailure {
        entity_type: String,
        entity_id: Uuid,
        #[source]
        cause: BoxError,
    },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity_type} {entity_id} not found")]
    NotFound { entity_type: String, entity_id: Uuid },

    /// A storage collaborator call failed; `entity_id` is unset for queries
    #[error("Storage error during {operation} of {entity_type}: {cause}")]
    Storage {
        operation: &'static str,
        entity_type: String,
        entity_id: Option<Uuid>,
        #[source]
        cause: BoxError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl LifecycleError {
    /// True for errors that point at a defect rather than a policy outcome
    pub fn is_fatal(&self) -> bool {
        matches!(self, LifecycleError::Configuration(_))
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
