use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BreedingRecord {
    pub id: i64,
    pub user_id: i64,
    pub breeding_date: NaiveDate,
    pub doe_name: String,
    pub buck_name: Option<String>,
    pub notes: Option<String>,
    pub litter_size: Option<i32>,
    pub male_count: Option<i32>,
    pub female_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecord {
    pub breeding_date: NaiveDate,
    pub doe_name: String,
    pub buck_name: Option<String>,
    pub notes: Option<String>,
    pub litter_size: Option<i32>,
    pub male_count: Option<i32>,
    pub female_count: Option<i32>,
}

/// Litter outcome recorded after kindling.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LitterUpdate {
    pub litter_size: Option<i32>,
    pub male_count: Option<i32>,
    pub female_count: Option<i32>,
}
