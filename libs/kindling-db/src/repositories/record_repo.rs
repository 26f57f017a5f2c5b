use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};
use crate::models::{BreedingRecord, LitterUpdate, NewRecord};
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: PgPool,
}

impl RecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for RecordRepository {
    async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<BreedingRecord>> {
        let records = sqlx::query_as::<_, BreedingRecord>(
            r#"
            SELECT id, user_id, breeding_date, doe_name, buck_name, notes,
                   litter_size, male_count, female_count, created_at
            FROM records
            WHERE user_id = $1
            ORDER BY breeding_date DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn create(&self, user_id: i64, record: NewRecord) -> StoreResult<BreedingRecord> {
        let created = sqlx::query_as::<_, BreedingRecord>(
            r#"
            INSERT INTO records (user_id, breeding_date, doe_name, buck_name, notes,
                                 litter_size, male_count, female_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, breeding_date, doe_name, buck_name, notes,
                      litter_size, male_count, female_count, created_at
            "#,
        )
        .bind(user_id)
        .bind(record.breeding_date)
        .bind(&record.doe_name)
        .bind(&record.buck_name)
        .bind(&record.notes)
        .bind(record.litter_size)
        .bind(record.male_count)
        .bind(record.female_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_litter(
        &self,
        user_id: i64,
        record_id: i64,
        litter: LitterUpdate,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE records SET litter_size = $1, male_count = $2, female_count = $3
            WHERE id = $4 AND user_id = $5
            "#,
        )
        .bind(litter.litter_size)
        .bind(litter.male_count)
        .bind(litter.female_count)
        .bind(record_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, user_id: i64, record_id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM records WHERE id = $1 AND user_id = $2")
            .bind(record_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
