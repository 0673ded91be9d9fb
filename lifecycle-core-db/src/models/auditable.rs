use super::identifiable::Identifiable;

/// Trait for records whose saves are recorded in an audit log table
pub trait Auditable: Identifiable {
    /// Name of the table the audit entries of this record are written to
    fn audit_log_table(&self) -> &str;
}
