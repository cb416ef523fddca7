use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::storage::connection::DbConnection;
use shared::{
    format_display_number, BelieverType, EducationType, GraduateTransferStatus, NewComer,
};

/// Repository for registrant rows and their display-number sequences.
///
/// Number allocation, renumbering, and believer-type transitions all run on
/// the same transaction as the row mutation they belong to, so a sequence can
/// never observe a half-applied change.
#[derive(Clone)]
pub struct NewComerRepository {
    db: DbConnection,
}

/// Allocate the next display number for (department, believer_type, year) on
/// an open transaction: count the existing rows, next sequence = count + 1.
pub(crate) async fn next_number_in_tx(
    conn: &mut SqliteConnection,
    department: &str,
    believer_type: BelieverType,
    year: i32,
) -> Result<String> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS cnt
        FROM new_comers
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

/// Rewrite the numbers of every row matching (year, department,
/// believer_type) to a gapless 001..N in creation (id) order. Returns the
/// number of rows walked.
pub(crate) async fn reorder_in_tx(
    conn: &mut SqliteConnection,
    year: i32,
    department: &str,
    believer_type: BelieverType,
) -> Result<usize> {
    let rows = sqlx::query(
        r#"
        SELECT id
        FROM new_comers
        WHERE year = ? AND department = ? AND believer_type = ?
        ORDER BY id ASC
        "#,
    )
    .bind(year)
    .bind(department)
    .bind(believer_type.as_str())
    .fetch_all(&mut *conn)
    .await?;

    let now = Utc::now().to_rfc3339();
    for (index, row) in rows.iter().enumerate() {
        let id: i64 = row.get("id");
        let number = format_display_number(year, index as u32 + 1);
        sqlx::query(
            r#"
            UPDATE new_comers SET number = ?, updated_at = ? WHERE id = ?
            "#,
        )
        .bind(&number)
        .bind(&now)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(rows.len())
}

fn row_to_new_comer(row: &SqliteRow) -> Result<NewComer> {
    let believer_type: String = row.get("believer_type");
    let education_type: String = row.get("education_type");
    let transfer_status: String = row.get("graduate_transfer_status");

    Ok(NewComer {
        id: row.get("id"),
        department: row.get("department"),
        believer_type: BelieverType::parse(&believer_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown believer type: {}", believer_type))?,
        year: row.get("year"),
        number: row.get("number"),
        name: row.get("name"),
        gender: row.get("gender"),
        marital_status: row.get("marital_status"),
        birth_date: row.get("birth_date"),
        address: row.get("address"),
        phone: row.get("phone"),
        teacher: row.get("teacher"),
        register_date: row.get("register_date"),
        affiliation: row.get("affiliation"),
        belong: row.get("belong"),
        identity_verified: row.get("identity_verified"),
        previous_church: row.get("previous_church"),
        comment: row.get("comment"),
        education_type: EducationType::parse(&education_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown education type: {}", education_type))?,
        education_start_date: row.get("education_start_date"),
        education_end_date: row.get("education_end_date"),
        graduate_transfer_status: GraduateTransferStatus::parse(&transfer_status)
            .ok_or_else(|| anyhow::anyhow!("Unknown transfer status: {}", transfer_status))?,
        file_id: row.get("file_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const SELECT_COLUMNS: &str = r#"
    id, department, believer_type, year, number, name, gender, marital_status,
    birth_date, address, phone, teacher, register_date, affiliation, belong,
    identity_verified, previous_church, comment, education_type,
    education_start_date, education_end_date, graduate_transfer_status,
    file_id, created_at, updated_at
"#;

impl NewComerRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Insert a registrant, allocating its display number in the same
    /// transaction. The caller supplies the row with placeholder id/number;
    /// the stored copy comes back with both assigned.
    pub async fn create(&self, person: &NewComer) -> Result<NewComer> {
        let mut tx = self.db.pool().begin().await?;

        let number =
            next_number_in_tx(&mut tx, &person.department, person.believer_type, person.year)
                .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO new_comers (
                department, believer_type, year, number, name, gender,
                marital_status, birth_date, address, phone, teacher,
                register_date, affiliation, belong, identity_verified,
                previous_church, comment, education_type, education_start_date,
                education_end_date, graduate_transfer_status, file_id,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&person.department)
        .bind(person.believer_type.as_str())
        .bind(person.year)
        .bind(&number)
        .bind(&person.name)
        .bind(&person.gender)
        .bind(&person.marital_status)
        .bind(&person.birth_date)
        .bind(&person.address)
        .bind(&person.phone)
        .bind(&person.teacher)
        .bind(&person.register_date)
        .bind(&person.affiliation)
        .bind(&person.belong)
        .bind(person.identity_verified)
        .bind(&person.previous_church)
        .bind(&person.comment)
        .bind(person.education_type.as_str())
        .bind(&person.education_start_date)
        .bind(&person.education_end_date)
        .bind(person.graduate_transfer_status.as_str())
        .bind(person.file_id)
        .bind(&person.created_at)
        .bind(&person.updated_at)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        tx.commit().await?;

        let mut stored = person.clone();
        stored.id = id;
        stored.number = number;
        Ok(stored)
    }

    /// Get a registrant by ID
    pub async fn get(&self, id: i64) -> Result<Option<NewComer>> {
        let query = format!(
            "SELECT {} FROM new_comers WHERE id = ?",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query).bind(id).fetch_optional(self.db.pool()).await?;

        match row {
            Some(r) => Ok(Some(row_to_new_comer(&r)?)),
            None => Ok(None),
        }
    }

    /// List registrants of one believer type with optional filters
    pub async fn list(
        &self,
        believer_type: BelieverType,
        year: Option<i32>,
        department: Option<&str>,
        education_type: Option<EducationType>,
        name: Option<&str>,
    ) -> Result<Vec<NewComer>> {
        let query = format!(
            r#"
            SELECT {}
            FROM new_comers
            WHERE believer_type = ?
              AND (? IS NULL OR year = ?)
              AND (? IS NULL OR department = ?)
              AND (? IS NULL OR education_type = ?)
              AND (? IS NULL OR name LIKE '%' || ? || '%')
            ORDER BY year DESC, department ASC, id ASC
            "#,
            SELECT_COLUMNS
        );

        let education_type = education_type.map(|e| e.as_str());
        let rows = sqlx::query(&query)
            .bind(believer_type.as_str())
            .bind(year)
            .bind(year)
            .bind(department)
            .bind(department)
            .bind(education_type)
            .bind(education_type)
            .bind(name)
            .bind(name)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(row_to_new_comer).collect()
    }

    /// All registrants for one year, grouped for the number audit
    pub async fn list_for_year(&self, year: i32) -> Result<Vec<NewComer>> {
        let query = format!(
            r#"
            SELECT {}
            FROM new_comers
            WHERE year = ?
            ORDER BY department ASC, believer_type ASC, id ASC
            "#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query).bind(year).fetch_all(self.db.pool()).await?;

        rows.iter().map(row_to_new_comer).collect()
    }

    /// Update a registrant without a believer-type change. The display
    /// number is left untouched.
    pub async fn update(&self, person: &NewComer) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE new_comers SET
                department = ?, name = ?, gender = ?, marital_status = ?,
                birth_date = ?, address = ?, phone = ?, teacher = ?,
                register_date = ?, affiliation = ?, belong = ?,
                identity_verified = ?, previous_church = ?, comment = ?,
                education_type = ?, education_start_date = ?,
                education_end_date = ?, graduate_transfer_status = ?,
                file_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&person.department)
        .bind(&person.name)
        .bind(&person.gender)
        .bind(&person.marital_status)
        .bind(&person.birth_date)
        .bind(&person.address)
        .bind(&person.phone)
        .bind(&person.teacher)
        .bind(&person.register_date)
        .bind(&person.affiliation)
        .bind(&person.belong)
        .bind(person.identity_verified)
        .bind(&person.previous_church)
        .bind(&person.comment)
        .bind(person.education_type.as_str())
        .bind(&person.education_start_date)
        .bind(&person.education_end_date)
        .bind(person.graduate_transfer_status.as_str())
        .bind(person.file_id)
        .bind(&person.updated_at)
        .bind(person.id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Apply a believer-type transition: allocate a fresh number in the
    /// target sequence, rewrite the row, and renumber the source sequence
    /// the row left behind — all in one transaction. Returns the fresh
    /// number and the size of the reordered source sequence.
    pub async fn update_with_transition(
        &self,
        previous: &NewComer,
        updated: &NewComer,
    ) -> Result<(String, usize)> {
        let mut tx = self.db.pool().begin().await?;

        let number = next_number_in_tx(
            &mut tx,
            &updated.department,
            updated.believer_type,
            updated.year,
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE new_comers SET
                department = ?, believer_type = ?, number = ?, name = ?,
                gender = ?, marital_status = ?, birth_date = ?, address = ?,
                phone = ?, teacher = ?, register_date = ?, affiliation = ?,
                belong = ?, identity_verified = ?, previous_church = ?,
                comment = ?, education_type = ?, education_start_date = ?,
                education_end_date = ?, graduate_transfer_status = ?,
                file_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&updated.department)
        .bind(updated.believer_type.as_str())
        .bind(&number)
        .bind(&updated.name)
        .bind(&updated.gender)
        .bind(&updated.marital_status)
        .bind(&updated.birth_date)
        .bind(&updated.address)
        .bind(&updated.phone)
        .bind(&updated.teacher)
        .bind(&updated.register_date)
        .bind(&updated.affiliation)
        .bind(&updated.belong)
        .bind(updated.identity_verified)
        .bind(&updated.previous_church)
        .bind(&updated.comment)
        .bind(updated.education_type.as_str())
        .bind(&updated.education_start_date)
        .bind(&updated.education_end_date)
        .bind(updated.graduate_transfer_status.as_str())
        .bind(updated.file_id)
        .bind(&updated.updated_at)
        .bind(updated.id)
        .execute(&mut *tx)
        .await?;

        // The row no longer matches its old sequence; close the gap it left
        let reordered = reorder_in_tx(
            &mut tx,
            previous.year,
            &previous.department,
            previous.believer_type,
        )
        .await?;

        tx.commit().await?;
        Ok((number, reordered))
    }

    /// Delete a registrant (and its education row) and renumber the sequence
    /// it belonged to, atomically.
    pub async fn delete_and_reorder(&self, person: &NewComer) -> Result<usize> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM new_comer_education WHERE new_comer_id = ?")
            .bind(person.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM new_comers WHERE id = ?")
            .bind(person.id)
            .execute(&mut *tx)
            .await?;

        let reordered = reorder_in_tx(
            &mut tx,
            person.year,
            &person.department,
            person.believer_type,
        )
        .await?;

        tx.commit().await?;
        Ok(reordered)
    }

    /// Manual renumbering pass over one sequence
    pub async fn reorder_numbers(
        &self,
        year: i32,
        department: &str,
        believer_type: BelieverType,
    ) -> Result<usize> {
        let mut tx = self.db.pool().begin().await?;
        let reordered = reorder_in_tx(&mut tx, year, department, believer_type).await?;
        tx.commit().await?;
        Ok(reordered)
    }

    /// Preview the next display number without reserving it
    pub async fn next_number_preview(
        &self,
        department: &str,
        believer_type: BelieverType,
        year: i32,
    ) -> Result<String> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt
            FROM new_comers
            WHERE department = ? AND believer_type = ? AND year = ?
            "#,
        )
        .bind(department)
        .bind(believer_type.as_str())
        .bind(year)
        .fetch_one(self.db.pool())
        .await?;

        let count: i64 = row.get("cnt");
        Ok(format_display_number(year, count as u32 + 1))
    }
}
