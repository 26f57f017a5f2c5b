pub mod license_repo;
pub mod record_repo;
pub mod user_repo;

pub use license_repo::LicenseRepository;
pub use record_repo::RecordRepository;
pub use user_repo::UserRepository;
