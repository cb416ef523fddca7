use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{EducationRecord, UpsertEducationRequest};

/// Repository for weekly education progress, one row per registrant.
#[derive(Clone)]
pub struct EducationRepository {
    db: DbConnection,
}

fn row_to_education(row: &SqliteRow) -> EducationRecord {
    EducationRecord {
        id: row.get("id"),
        new_comer_id: row.get("new_comer_id"),
        week1_date: row.get("week1_date"),
        week1_comment: row.get("week1_comment"),
        week2_date: row.get("week2_date"),
        week2_comment: row.get("week2_comment"),
        week3_date: row.get("week3_date"),
        week3_comment: row.get("week3_comment"),
        week4_date: row.get("week4_date"),
        week4_comment: row.get("week4_comment"),
        week5_date: row.get("week5_date"),
        week5_comment: row.get("week5_comment"),
        week6_date: row.get("week6_date"),
        week6_comment: row.get("week6_comment"),
        week7_date: row.get("week7_date"),
        week7_comment: row.get("week7_comment"),
        week8_date: row.get("week8_date"),
        week8_comment: row.get("week8_comment"),
        overall_comment: row.get("overall_comment"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl EducationRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert or update the education row for a registrant. Keyed by
    /// new_comer_id; repeated calls leave exactly one row reflecting the
    /// latest data. The caller has already normalized empty fields to null.
    pub async fn upsert(&self, request: &UpsertEducationRequest) -> Result<EducationRecord> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO new_comer_education (
                new_comer_id,
                week1_date, week1_comment, week2_date, week2_comment,
                week3_date, week3_comment, week4_date, week4_comment,
                week5_date, week5_comment, week6_date, week6_comment,
                week7_date, week7_comment, week8_date, week8_comment,
                overall_comment, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(new_comer_id) DO UPDATE SET
                week1_date = excluded.week1_date,
                week1_comment = excluded.week1_comment,
                week2_date = excluded.week2_date,
                week2_comment = excluded.week2_comment,
                week3_date = excluded.week3_date,
                week3_comment = excluded.week3_comment,
                week4_date = excluded.week4_date,
                week4_comment = excluded.week4_comment,
                week5_date = excluded.week5_date,
                week5_comment = excluded.week5_comment,
                week6_date = excluded.week6_date,
                week6_comment = excluded.week6_comment,
                week7_date = excluded.week7_date,
                week7_comment = excluded.week7_comment,
                week8_date = excluded.week8_date,
                week8_comment = excluded.week8_comment,
                overall_comment = excluded.overall_comment,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(request.new_comer_id)
        .bind(&request.week1_date)
        .bind(&request.week1_comment)
        .bind(&request.week2_date)
        .bind(&request.week2_comment)
        .bind(&request.week3_date)
        .bind(&request.week3_comment)
        .bind(&request.week4_date)
        .bind(&request.week4_comment)
        .bind(&request.week5_date)
        .bind(&request.week5_comment)
        .bind(&request.week6_date)
        .bind(&request.week6_comment)
        .bind(&request.week7_date)
        .bind(&request.week7_comment)
        .bind(&request.week8_date)
        .bind(&request.week8_comment)
        .bind(&request.overall_comment)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        self.get_by_new_comer(request.new_comer_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Education row missing after upsert"))
    }

    /// Get the education row for a registrant
    pub async fn get_by_new_comer(&self, new_comer_id: i64) -> Result<Option<EducationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, new_comer_id,
                   week1_date, week1_comment, week2_date, week2_comment,
                   week3_date, week3_comment, week4_date, week4_comment,
                   week5_date, week5_comment, week6_date, week6_comment,
                   week7_date, week7_comment, week8_date, week8_comment,
                   overall_comment, created_at, updated_at
            FROM new_comer_education
            WHERE new_comer_id = ?
            "#,
        )
        .bind(new_comer_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| row_to_education(&r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::connection::DbConnection;

    async fn setup_test() -> EducationRepository {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        EducationRepository::new(db)
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates_in_place() {
        let repo = setup_test().await;

        let mut request = UpsertEducationRequest {
            new_comer_id: 42,
            week1_date: Some("2025-03-02".to_string()),
            week1_comment: Some("First meeting".to_string()),
            ..Default::default()
        };

        let first = repo.upsert(&request).await.expect("Failed to insert");
        assert_eq!(first.new_comer_id, 42);
        assert_eq!(first.week1_comment.as_deref(), Some("First meeting"));
        assert!(first.week2_date.is_none());

        request.week2_date = Some("2025-03-09".to_string());
        request.week1_comment = Some("Revised comment".to_string());
        let second = repo.upsert(&request).await.expect("Failed to update");

        // Same row, latest data
        assert_eq!(second.id, first.id);
        assert_eq!(second.week1_comment.as_deref(), Some("Revised comment"));
        assert_eq!(second.week2_date.as_deref(), Some("2025-03-09"));
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_registrant() {
        let repo = setup_test().await;

        let request = UpsertEducationRequest {
            new_comer_id: 7,
            overall_comment: Some("Attentive".to_string()),
            ..Default::default()
        };
        repo.upsert(&request).await.unwrap();
        repo.upsert(&request).await.unwrap();

        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM new_comer_education WHERE new_comer_id = 7")
            .fetch_one(repo.db.pool())
            .await
            .unwrap();
        let count: i64 = row.get("cnt");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_get_missing_row() {
        let repo = setup_test().await;
        let row = repo.get_by_new_comer(999).await.unwrap();
        assert!(row.is_none());
    }
}
