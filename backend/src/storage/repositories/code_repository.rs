use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::storage::connection::DbConnection;
use shared::{CodeDetail, CodeGroup};

/// Repository for reference code groups and their detail codes.
#[derive(Clone)]
pub struct CodeRepository {
    db: DbConnection,
}

fn row_to_group(row: &SqliteRow) -> CodeGroup {
    CodeGroup {
        id: row.get("id"),
        group_code: row.get("group_code"),
        group_name: row.get("group_name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_detail(row: &SqliteRow) -> CodeDetail {
    CodeDetail {
        id: row.get("id"),
        group_id: row.get("group_id"),
        code_value: row.get("code_value"),
        code_name: row.get("code_name"),
        sort_order: row.get("sort_order"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl CodeRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub async fn create_group(
        &self,
        group_code: &str,
        group_name: &str,
        description: Option<&str>,
    ) -> Result<CodeGroup> {
        // Check the natural key first so the caller gets a clean message;
        // the UNIQUE constraint backs this up
        let taken = sqlx::query("SELECT 1 FROM code_groups WHERE group_code = ?")
            .bind(group_code)
            .fetch_optional(self.db.pool())
            .await?
            .is_some();
        if taken {
            return Err(anyhow::anyhow!("Code group already exists: {}", group_code));
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO code_groups (group_code, group_name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(group_code)
        .bind(group_name)
        .bind(description)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        Ok(CodeGroup {
            id: result.last_insert_rowid(),
            group_code: group_code.to_string(),
            group_name: group_name.to_string(),
            description: description.map(|d| d.to_string()),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn get_group(&self, id: i64) -> Result<Option<CodeGroup>> {
        let row = sqlx::query(
            r#"
            SELECT id, group_code, group_name, description, created_at, updated_at
            FROM code_groups
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| row_to_group(&r)))
    }

    pub async fn list_groups(&self) -> Result<Vec<CodeGroup>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_code, group_name, description, created_at, updated_at
            FROM code_groups
            ORDER BY group_code ASC
            "#,
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_group).collect())
    }

    pub async fn update_group(&self, group: &CodeGroup) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE code_groups
            SET group_name = ?, description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&group.group_name)
        .bind(&group.description)
        .bind(&group.updated_at)
        .bind(group.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Delete a group and its detail codes together
    pub async fn delete_group(&self, id: i64) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM code_details WHERE group_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM code_groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn create_detail(
        &self,
        group_id: i64,
        code_value: &str,
        code_name: &str,
        sort_order: i64,
        is_active: bool,
    ) -> Result<CodeDetail> {
        let taken = sqlx::query("SELECT 1 FROM code_details WHERE group_id = ? AND code_value = ?")
            .bind(group_id)
            .bind(code_value)
            .fetch_optional(self.db.pool())
            .await?
            .is_some();
        if taken {
            return Err(anyhow::anyhow!(
                "Code value already exists in group: {}",
                code_value
            ));
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO code_details (group_id, code_value, code_name, sort_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(group_id)
        .bind(code_value)
        .bind(code_name)
        .bind(sort_order)
        .bind(is_active)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        Ok(CodeDetail {
            id: result.last_insert_rowid(),
            group_id,
            code_value: code_value.to_string(),
            code_name: code_name.to_string(),
            sort_order,
            is_active,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn get_detail(&self, id: i64) -> Result<Option<CodeDetail>> {
        let row = sqlx::query(
            r#"
            SELECT id, group_id, code_value, code_name, sort_order, is_active, created_at, updated_at
            FROM code_details
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|r| row_to_detail(&r)))
    }

    pub async fn list_details(&self, group_id: i64) -> Result<Vec<CodeDetail>> {
        let rows = sqlx::query(
            r#"
            SELECT id, group_id, code_value, code_name, sort_order, is_active, created_at, updated_at
            FROM code_details
            WHERE group_id = ?
            ORDER BY sort_order ASC, code_value ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(row_to_detail).collect())
    }

    pub async fn update_detail(&self, detail: &CodeDetail) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE code_details
            SET code_name = ?, sort_order = ?, is_active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&detail.code_name)
        .bind(detail.sort_order)
        .bind(detail.is_active)
        .bind(&detail.updated_at)
        .bind(detail.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_detail(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM code_details WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::connection::DbConnection;

    async fn setup_test() -> CodeRepository {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        CodeRepository::new(db)
    }

    #[tokio::test]
    async fn test_duplicate_group_code_rejected() {
        let repo = setup_test().await;

        repo.create_group("GENDER", "Gender", None).await.unwrap();
        let result = repo.create_group("GENDER", "Gender again", None).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_code_value_unique_within_group_only() {
        let repo = setup_test().await;

        let gender = repo.create_group("GENDER", "Gender", None).await.unwrap();
        let marital = repo.create_group("MARITAL", "Marital status", None).await.unwrap();

        repo.create_detail(gender.id, "M", "Male", 1, true).await.unwrap();
        // Same value in another group is fine
        repo.create_detail(marital.id, "M", "Married", 1, true).await.unwrap();
        // Same value in the same group is not
        let result = repo.create_detail(gender.id, "M", "Duplicate", 2, true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_group_removes_details() {
        let repo = setup_test().await;

        let group = repo.create_group("DEPT", "Departments", None).await.unwrap();
        repo.create_detail(group.id, "D1", "First", 1, true).await.unwrap();
        repo.create_detail(group.id, "D2", "Second", 2, true).await.unwrap();

        repo.delete_group(group.id).await.unwrap();

        assert!(repo.get_group(group.id).await.unwrap().is_none());
        assert!(repo.list_details(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_details_ordered_by_sort_order() {
        let repo = setup_test().await;

        let group = repo.create_group("DEPT", "Departments", None).await.unwrap();
        repo.create_detail(group.id, "Z", "Last", 9, true).await.unwrap();
        repo.create_detail(group.id, "A", "First", 1, true).await.unwrap();

        let details = repo.list_details(group.id).await.unwrap();
        assert_eq!(details[0].code_value, "A");
        assert_eq!(details[1].code_value, "Z");
    }
}
