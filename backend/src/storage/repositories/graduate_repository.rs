use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::storage::connection::DbConnection;
use shared::{
    format_display_number, BelieverType, EducationType, Graduate, GraduateTransferStatus, NewComer,
};

/// Repository for the graduates table, which carries its own display-number
/// sequence independent of the registrant table.
#[derive(Clone)]
pub struct GraduateRepository {
    db: DbConnection,
}

/// Allocate the next graduate number for (department, believer_type, year)
/// on an open transaction. Same format as registrant numbers, counted over
/// the graduates table only.
async fn next_graduate_number_in_tx(
    conn: &mut SqliteConnection,
    department: &str,
    believer_type: BelieverType,
    year: i32,
) -> Result<String> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS cnt
        FROM new_comer_graduates
        WHERE department = ? AND believer_type = ? AND year = ?
        "#,
    )
    .bind(department)
    .bind(believer_type.as_str())
    .bind(year)
    .fetch_one(&mut *conn)
    .await?;

    let count: i64 = row.get("cnt");
    Ok(format_display_number(year, count as u32 + 1))
}

fn row_to_graduate(row: &SqliteRow) -> Result<Graduate> {
    let believer_type: String = row.get("believer_type");

    Ok(Graduate {
        id: row.get("id"),
        new_comer_id: row.get("new_comer_id"),
        graduate_number: row.get("graduate_number"),
        department: row.get("department"),
        believer_type: BelieverType::parse(&believer_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?,
        year: row.get("year"),
        name: row.get("name"),
        gender: row.get("gender"),
        birth_date: row.get("birth_date"),
        phone: row.get("phone"),
        address: row.get("address"),
        teacher: row.get("teacher"),
        register_date: row.get("register_date"),
        education_start_date: row.get("education_start_date"),
        education_end_date: row.get("education_end_date"),
        print_count: row.get("print_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const SELECT_COLUMNS: &str = r#"
    id, new_comer_id, graduate_number, department, believer_type, year, name,
    gender, birth_date, phone, address, teacher, register_date,
    education_start_date, education_end_date, print_count, created_at,
    updated_at
"#;

impl GraduateRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Promote a registrant: copy its fields into a graduate row with a
    /// freshly allocated graduate number and flip the source row to
    /// completed/sent. Insert and update commit together; a graduate row
    /// can never exist alongside an unflipped source row.
    ///
    /// The person snapshot is the row as read by the caller in this same
    /// request; one graduate per registrant is enforced here by a
    /// check-before-insert rather than a uniqueness constraint, so deleting
    /// a mistaken graduate re-enables promotion.
    pub async fn promote(&self, person: &NewComer) -> Result<Graduate> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db.pool().begin().await?;

        let existing = sqlx::query("SELECT id FROM new_comer_graduates WHERE new_comer_id = ?")
            .bind(person.id)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            return Err(anyhow::anyhow!(
                "Registrant already promoted to graduate: {}",
                person.id
            ));
        }

        let graduate_number = next_graduate_number_in_tx(
            &mut tx,
            &person.department,
            person.believer_type,
            person.year,
        )
        .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO new_comer_graduates (
                new_comer_id, graduate_number, department, believer_type,
                year, name, gender, birth_date, phone, address, teacher,
                register_date, education_start_date, education_end_date,
                print_count, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(person.id)
        .bind(&graduate_number)
        .bind(&person.department)
        .bind(person.believer_type.as_str())
        .bind(person.year)
        .bind(&person.name)
        .bind(&person.gender)
        .bind(&person.birth_date)
        .bind(&person.phone)
        .bind(&person.address)
        .bind(&person.teacher)
        .bind(&person.register_date)
        .bind(&person.education_start_date)
        .bind(&person.education_end_date)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        sqlx::query(
            r#"
            UPDATE new_comers
            SET education_type = ?, graduate_transfer_status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(EducationType::Completed.as_str())
        .bind(GraduateTransferStatus::Sent.as_str())
        .bind(&now)
        .bind(person.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Graduate {
            id,
            new_comer_id: person.id,
            graduate_number,
            department: person.department.clone(),
            believer_type: person.believer_type,
            year: person.year,
            name: person.name.clone(),
            gender: person.gender.clone(),
            birth_date: person.birth_date.clone(),
            phone: person.phone.clone(),
            address: person.address.clone(),
            teacher: person.teacher.clone(),
            register_date: person.register_date.clone(),
            education_start_date: person.education_start_date.clone(),
            education_end_date: person.education_end_date.clone(),
            print_count: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a graduate by ID
    pub async fn get(&self, id: i64) -> Result<Option<Graduate>> {
        let query = format!("SELECT {} FROM new_comer_graduates WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&query).bind(id).fetch_optional(self.db.pool()).await?;

        match row {
            Some(r) => Ok(Some(row_to_graduate(&r)?)),
            None => Ok(None),
        }
    }

    /// Look up the graduate row for a registrant, if one exists
    pub async fn find_by_new_comer(&self, new_comer_id: i64) -> Result<Option<Graduate>> {
        let query = format!(
            "SELECT {} FROM new_comer_graduates WHERE new_comer_id = ?",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(new_comer_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_graduate(&r)?)),
            None => Ok(None),
        }
    }

    /// List graduates of one believer type with optional filters
    pub async fn list(
        &self,
        believer_type: BelieverType,
        year: Option<i32>,
        department: Option<&str>,
    ) -> Result<Vec<Graduate>> {
        let query = format!(
            r#"
            SELECT {}
            FROM new_comer_graduates
            WHERE believer_type = ?
              AND (? IS NULL OR year = ?)
              AND (? IS NULL OR department = ?)
            ORDER BY year DESC, department ASC, id ASC
            "#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(believer_type.as_str())
            .bind(year)
            .bind(year)
            .bind(department)
            .bind(department)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(row_to_graduate).collect()
    }

    /// Best-effort duplicate probe by name and birth date
    pub async fn find_by_name_and_birth_date(
        &self,
        name: &str,
        birth_date: &str,
    ) -> Result<Vec<Graduate>> {
        let query = format!(
            "SELECT {} FROM new_comer_graduates WHERE name = ? AND birth_date = ? ORDER BY id ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(name)
            .bind(birth_date)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(row_to_graduate).collect()
    }

    /// Record a certificate print and return the updated row
    pub async fn increment_print_count(&self, id: i64) -> Result<Option<Graduate>> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE new_comer_graduates
            SET print_count = print_count + 1, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&now)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        self.get(id).await
    }

    /// Delete a graduate row. The source registrant is left untouched; this
    /// is the correction path that re-enables promotion.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM new_comer_graduates WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}
