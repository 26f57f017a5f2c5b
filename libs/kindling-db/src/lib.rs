pub mod db;
pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;
pub mod token;

pub use sqlx;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use store::{AccountStore, LicenseLedger, RecordStore};
