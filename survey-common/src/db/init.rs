//! Database initialization
//!
//! Creates the database on first run and applies the (idempotent) schema:
//! `respondents`, `personality_factors` and `categorizations`, with the two
//! score tables referencing `respondents` via `ON DELETE CASCADE`.

use crate::db::models::{Category, PersonalityFactor};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys is a per-connection pragma; setting it on the connect
    // options applies it to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_respondents_table(&pool).await?;
    create_personality_factors_table(&pool).await?;
    create_categorizations_table(&pool).await?;

    Ok(pool)
}

async fn create_respondents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS respondents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            gender TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // name is the import dedup key but deliberately not UNIQUE
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_respondents_name ON respondents(name)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_personality_factors_table(pool: &SqlitePool) -> Result<()> {
    let columns: Vec<&str> = PersonalityFactor::ALL.iter().map(|f| f.column()).collect();
    create_score_table(pool, "personality_factors", &columns).await
}

async fn create_categorizations_table(pool: &SqlitePool) -> Result<()> {
    let columns: Vec<&str> = Category::ALL.iter().map(|c| c.column()).collect();
    create_score_table(pool, "categorizations", &columns).await
}

/// Score tables share one shape: id, respondent link, nullable REAL columns
async fn create_score_table(pool: &SqlitePool, table: &str, columns: &[&str]) -> Result<()> {
    sqlx::query(&score_table_ddl(table, columns))
        .execute(pool)
        .await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_respondent ON {table}(respondent_id)"
    );
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}

fn score_table_ddl(table: &str, columns: &[&str]) -> String {
    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n    \
         id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
         respondent_id INTEGER NOT NULL REFERENCES respondents(id) ON DELETE CASCADE"
    );
    for column in columns {
        ddl.push_str(&format!(",\n    {column} REAL"));
    }
    ddl.push_str("\n)");
    ddl
}
