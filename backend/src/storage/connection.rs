use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:newfamily.db";

/// DbConnection manages the SQLite pool and schema bootstrap
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;

        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name for tests
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS new_comers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                department TEXT NOT NULL,
                believer_type TEXT NOT NULL,
                year INTEGER NOT NULL,
                number TEXT NOT NULL,
                name TEXT NOT NULL,
                gender TEXT,
                marital_status TEXT,
                birth_date TEXT,
                address TEXT,
                phone TEXT,
                teacher TEXT,
                register_date TEXT,
                affiliation TEXT,
                belong TEXT,
                identity_verified INTEGER NOT NULL DEFAULT 0,
                previous_church TEXT,
                comment TEXT,
                education_type TEXT NOT NULL DEFAULT 'in_progress',
                education_start_date TEXT,
                education_end_date TEXT,
                graduate_transfer_status TEXT NOT NULL DEFAULT 'pending',
                file_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Sequence generation and reorder both scan this triple
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_new_comers_sequence
            ON new_comers(department, believer_type, year, id);
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS new_comer_education (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                new_comer_id INTEGER NOT NULL UNIQUE,
                week1_date TEXT, week1_comment TEXT,
                week2_date TEXT, week2_comment TEXT,
                week3_date TEXT, week3_comment TEXT,
                week4_date TEXT, week4_comment TEXT,
                week5_date TEXT, week5_comment TEXT,
                week6_date TEXT, week6_comment TEXT,
                week7_date TEXT, week7_comment TEXT,
                week8_date TEXT, week8_comment TEXT,
                overall_comment TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        // new_comer_id is a weak back-reference on purpose: deleting the
        // source registrant must not cascade into the graduates table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS new_comer_graduates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                new_comer_id INTEGER NOT NULL,
                graduate_number TEXT NOT NULL,
                department TEXT NOT NULL,
                believer_type TEXT NOT NULL,
                year INTEGER NOT NULL,
                name TEXT NOT NULL,
                gender TEXT,
                birth_date TEXT,
                phone TEXT,
                address TEXT,
                teacher TEXT,
                register_date TEXT,
                education_start_date TEXT,
                education_end_date TEXT,
                print_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_graduates_sequence
            ON new_comer_graduates(department, believer_type, year, id);
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS code_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_code TEXT NOT NULL UNIQUE,
                group_name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS code_details (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                group_id INTEGER NOT NULL,
                code_value TEXT NOT NULL,
                code_name TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(group_id, code_value)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS yearly_statistics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                believer_type TEXT NOT NULL,
                registered_count INTEGER NOT NULL,
                completed_count INTEGER NOT NULL,
                graduated_count INTEGER NOT NULL,
                calculated_at TEXT NOT NULL,
                UNIQUE(year, month, believer_type)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monthly_age_statistics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                age_group TEXT NOT NULL,
                believer_type TEXT NOT NULL,
                count INTEGER NOT NULL,
                calculated_at TEXT NOT NULL,
                UNIQUE(year, month, age_group, believer_type)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}
