// Admin Module: license key administration behind the X-Admin-Key guard
pub mod licenses;

pub use licenses::{generate_keys, get_key, get_stats, list_keys, revoke_key};
