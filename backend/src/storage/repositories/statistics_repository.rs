use anyhow::Result;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{BelieverType, MonthlyAgeStatisticsRow, YearlyStatisticsRow};

/// Repository for the denormalized statistics snapshot tables and the
/// aggregate queries that feed them. Snapshots are never source-of-truth;
/// they are wiped and rebuilt per year by the calculate endpoint.
#[derive(Clone)]
pub struct StatisticsRepository {
    db: DbConnection,
}

impl StatisticsRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Registration and completion counts per (month, believer type) for a
    /// year. The month comes from the registration date, falling back to
    /// the row's creation timestamp.
    pub async fn monthly_registration_counts(
        &self,
        year: i32,
    ) -> Result<Vec<(u32, BelieverType, i64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(substr(COALESCE(register_date, created_at), 6, 2) AS INTEGER) AS month,
                   believer_type,
                   COUNT(*) AS registered,
                   SUM(CASE WHEN education_type = 'completed' THEN 1 ELSE 0 END) AS completed
            FROM new_comers
            WHERE year = ?
            GROUP BY month, believer_type
            ORDER BY month ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.db.pool())
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let month: i64 = row.get("month");
            let believer_type: String = row.get("believer_type");
            let believer_type = BelieverType::parse(&believer_type)
                .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?;
            counts.push((
                month as u32,
                believer_type,
                row.get("registered"),
                row.get("completed"),
            ));
        }
        Ok(counts)
    }

    /// Promotion counts per (month, believer type), keyed by the month the
    /// graduate row was created.
    pub async fn monthly_graduated_counts(
        &self,
        year: i32,
    ) -> Result<Vec<(u32, BelieverType, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(substr(created_at, 6, 2) AS INTEGER) AS month,
                   believer_type,
                   COUNT(*) AS graduated
            FROM new_comer_graduates
            WHERE year = ?
            GROUP BY month, believer_type
            ORDER BY month ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.db.pool())
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let month: i64 = row.get("month");
            let believer_type: String = row.get("believer_type");
            let believer_type = BelieverType::parse(&believer_type)
                .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?;
            counts.push((month as u32, believer_type, row.get("graduated")));
        }
        Ok(counts)
    }

    /// Raw (month, believer type, birth date) rows for the age breakdown;
    /// age-group bucketing happens in the domain layer.
    pub async fn registrant_birth_rows(
        &self,
        year: i32,
    ) -> Result<Vec<(u32, BelieverType, Option<String>)>> {
        let rows = sqlx::query(
            r#"
            SELECT CAST(substr(COALESCE(register_date, created_at), 6, 2) AS INTEGER) AS month,
                   believer_type,
                   birth_date
            FROM new_comers
            WHERE year = ?
            "#,
        )
        .bind(year)
        .fetch_all(self.db.pool())
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let month: i64 = row.get("month");
            let believer_type: String = row.get("believer_type");
            let believer_type = BelieverType::parse(&believer_type)
                .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?;
            result.push((month as u32, believer_type, row.get("birth_date")));
        }
        Ok(result)
    }

    /// Replace both snapshot tables for a year in one transaction
    pub async fn replace_for_year(
        &self,
        year: i32,
        yearly: &[YearlyStatisticsRow],
        monthly_age: &[MonthlyAgeStatisticsRow],
    ) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM yearly_statistics WHERE year = ?")
            .bind(year)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM monthly_age_statistics WHERE year = ?")
            .bind(year)
            .execute(&mut *tx)
            .await?;

        for row in yearly {
            sqlx::query(
                r#"
                INSERT INTO yearly_statistics
                    (year, month, believer_type, registered_count, completed_count, graduated_count, calculated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.year)
            .bind(row.month)
            .bind(row.believer_type.as_str())
            .bind(row.registered_count)
            .bind(row.completed_count)
            .bind(row.graduated_count)
            .bind(&row.calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        for row in monthly_age {
            sqlx::query(
                r#"
                INSERT INTO monthly_age_statistics
                    (year, month, age_group, believer_type, count, calculated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.year)
            .bind(row.month)
            .bind(&row.age_group)
            .bind(row.believer_type.as_str())
            .bind(row.count)
            .bind(&row.calculated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn yearly(&self, year: i32) -> Result<Vec<YearlyStatisticsRow>> {
        let rows = sqlx::query(
            r#"
            SELECT year, month, believer_type, registered_count, completed_count,
                   graduated_count, calculated_at
            FROM yearly_statistics
            WHERE year = ?
            ORDER BY month ASC, believer_type ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.db.pool())
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let believer_type: String = row.get("believer_type");
            let month: i64 = row.get("month");
            result.push(YearlyStatisticsRow {
                year: row.get("year"),
                month: month as u32,
                believer_type: BelieverType::parse(&believer_type)
                    .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?,
                registered_count: row.get("registered_count"),
                completed_count: row.get("completed_count"),
                graduated_count: row.get("graduated_count"),
                calculated_at: row.get("calculated_at"),
            });
        }
        Ok(result)
    }

    pub async fn monthly_age(&self, year: i32) -> Result<Vec<MonthlyAgeStatisticsRow>> {
        let rows = sqlx::query(
            r#"
            SELECT year, month, age_group, believer_type, count, calculated_at
            FROM monthly_age_statistics
            WHERE year = ?
            ORDER BY month ASC, age_group ASC, believer_type ASC
            "#,
        )
        .bind(year)
        .fetch_all(self.db.pool())
        .await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let believer_type: String = row.get("believer_type");
            let month: i64 = row.get("month");
            result.push(MonthlyAgeStatisticsRow {
                year: row.get("year"),
                month: month as u32,
                age_group: row.get("age_group"),
                believer_type: BelieverType::parse(&believer_type)
                    .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?,
                count: row.get("count"),
                calculated_at: row.get("calculated_at"),
            });
        }
        Ok(result)
    }
}
