pub mod license_service;
pub mod registration_service;
