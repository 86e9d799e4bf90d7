pub mod time;

/// Generates a new record id.
pub fn longid() -> String {
    uuid::Uuid::new_v4().to_string()
}
