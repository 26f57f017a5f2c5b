pub mod license_key;
pub mod record;
pub mod user;

pub use license_key::{
    FailureReason, GenerateReport, KeyFailure, LedgerStats, LicenseKey, LicenseState,
};
pub use record::{BreedingRecord, LitterUpdate, NewRecord};
pub use user::{NewAccount, User};
