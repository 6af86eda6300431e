pub mod approval;
pub mod class;
pub mod moderation;
pub mod notification;
pub mod session;
pub mod user;

/// Generates a sortable identifier such as `ses_01hx...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, ulid::Ulid::new().to_string().to_lowercase())
}
