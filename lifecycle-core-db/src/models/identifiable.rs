use uuid::Uuid;

/// Trait for records that can be uniquely identified by a UUID
pub trait Identifiable {
    /// Returns the unique identifier of the record
    fn get_id(&self) -> Uuid;
}
