//! SQLite adapter for [`SurveyStore`]

use super::SurveyStore;
use crate::db::models::{
    Categorization, Category, CategoryScores, FieldPair, NewRespondent, PersonalityFactor,
    PersonalityFactors, PersonalityScores, Respondent,
};
use crate::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

const PERSONALITY_TABLE: &str = "personality_factors";
const CATEGORIZATION_TABLE: &str = "categorizations";

/// [`SurveyStore`] over a borrowed SQLite connection.
///
/// Borrowing lets the same adapter run on a pooled connection for reads or
/// inside a transaction for imports:
///
/// ```rust,ignore
/// let mut tx = pool.begin().await?;
/// let mut store = SqliteSurveyStore::new(&mut tx);
/// import_table(&mut store, &table).await?;
/// tx.commit().await?;
/// ```
pub struct SqliteSurveyStore<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SqliteSurveyStore<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SurveyStore for SqliteSurveyStore<'_> {
    async fn count_respondents(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM respondents")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }

    async fn upsert_respondent(&mut self, respondent: &NewRespondent) -> Result<i64> {
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM respondents WHERE name = ? ORDER BY id LIMIT 1")
                .bind(&respondent.name)
                .fetch_optional(&mut *self.conn)
                .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE respondents SET age = ?, gender = ? WHERE id = ?")
                    .bind(respondent.age)
                    .bind(&respondent.gender)
                    .bind(id)
                    .execute(&mut *self.conn)
                    .await?;
                debug!(id, name = %respondent.name, "Updated respondent");
                Ok(id)
            }
            None => {
                let id = insert_respondent(self.conn, respondent).await?;
                debug!(id, name = %respondent.name, "Inserted respondent");
                Ok(id)
            }
        }
    }

    async fn upsert_personality_factors(
        &mut self,
        respondent_id: i64,
        scores: &PersonalityScores,
    ) -> Result<()> {
        let values: Vec<_> = scores.iter().map(|(f, v)| (f.column(), v)).collect();
        upsert_score_sheet(self.conn, PERSONALITY_TABLE, respondent_id, &values).await
    }

    async fn upsert_categorization(
        &mut self,
        respondent_id: i64,
        scores: &CategoryScores,
    ) -> Result<()> {
        let values: Vec<_> = scores.iter().map(|(c, v)| (c.column(), v)).collect();
        upsert_score_sheet(self.conn, CATEGORIZATION_TABLE, respondent_id, &values).await
    }

    async fn list_respondents(&mut self) -> Result<Vec<Respondent>> {
        let respondents =
            sqlx::query_as::<_, Respondent>("SELECT id, name, age, gender FROM respondents ORDER BY id")
                .fetch_all(&mut *self.conn)
                .await?;
        Ok(respondents)
    }

    async fn get_respondent(&mut self, id: i64) -> Result<Option<Respondent>> {
        let respondent =
            sqlx::query_as::<_, Respondent>("SELECT id, name, age, gender FROM respondents WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;
        Ok(respondent)
    }

    async fn create_respondent(&mut self, respondent: &NewRespondent) -> Result<Respondent> {
        let id = insert_respondent(self.conn, respondent).await?;
        Ok(Respondent {
            id,
            name: respondent.name.clone(),
            age: respondent.age,
            gender: respondent.gender.clone(),
        })
    }

    async fn delete_respondent(&mut self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM respondents WHERE id = ?")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn personality_factors_for(
        &mut self,
        respondent_id: i64,
    ) -> Result<Vec<PersonalityFactors>> {
        let columns: Vec<&str> = PersonalityFactor::ALL.iter().map(|f| f.column()).collect();
        let rows = select_score_sheets(self.conn, PERSONALITY_TABLE, &columns, respondent_id).await?;

        rows.iter()
            .map(|row| -> Result<PersonalityFactors> {
                let mut scores = PersonalityScores::default();
                for factor in PersonalityFactor::ALL {
                    scores.set(*factor, row.try_get(factor.column())?);
                }
                Ok(PersonalityFactors {
                    id: row.try_get("id")?,
                    respondent_id: row.try_get("respondent_id")?,
                    respondent: row.try_get("respondent_name")?,
                    scores,
                })
            })
            .collect()
    }

    async fn categorizations_for(&mut self, respondent_id: i64) -> Result<Vec<Categorization>> {
        let columns: Vec<&str> = Category::ALL.iter().map(|c| c.column()).collect();
        let rows =
            select_score_sheets(self.conn, CATEGORIZATION_TABLE, &columns, respondent_id).await?;

        rows.iter()
            .map(|row| -> Result<Categorization> {
                let mut scores = CategoryScores::default();
                for category in Category::ALL {
                    scores.set(*category, row.try_get(category.column())?);
                }
                Ok(Categorization {
                    id: row.try_get("id")?,
                    respondent_id: row.try_get("respondent_id")?,
                    respondent: row.try_get("respondent_name")?,
                    scores,
                })
            })
            .collect()
    }

    async fn personality_factor_pairs(
        &mut self,
        first: PersonalityFactor,
        second: PersonalityFactor,
        respondent_id: Option<i64>,
    ) -> Result<Vec<FieldPair>> {
        select_field_pairs(
            self.conn,
            PERSONALITY_TABLE,
            first.column(),
            second.column(),
            respondent_id,
        )
        .await
    }

    async fn category_pairs(
        &mut self,
        first: Category,
        second: Category,
        respondent_id: Option<i64>,
    ) -> Result<Vec<FieldPair>> {
        select_field_pairs(
            self.conn,
            CATEGORIZATION_TABLE,
            first.column(),
            second.column(),
            respondent_id,
        )
        .await
    }
}

async fn insert_respondent(conn: &mut SqliteConnection, respondent: &NewRespondent) -> Result<i64> {
    let result = sqlx::query("INSERT INTO respondents (name, age, gender) VALUES (?, ?, ?)")
        .bind(&respondent.name)
        .bind(respondent.age)
        .bind(&respondent.gender)
        .execute(conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Update the respondent's sheet (lowest id if several) or insert a new one.
///
/// `table` and the column names come from the closed vocabularies, never
/// from request input.
async fn upsert_score_sheet(
    conn: &mut SqliteConnection,
    table: &str,
    respondent_id: i64,
    values: &[(&'static str, Option<f64>)],
) -> Result<()> {
    let existing: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT id FROM {table} WHERE respondent_id = ? ORDER BY id LIMIT 1"
    ))
    .bind(respondent_id)
    .fetch_optional(&mut *conn)
    .await?;

    let sql = match existing {
        Some(id) => {
            let assignments: Vec<String> =
                values.iter().map(|(column, _)| format!("{column} = ?")).collect();
            format!("UPDATE {table} SET {} WHERE id = {id}", assignments.join(", "))
        }
        None => {
            let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
            let placeholders = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {table} (respondent_id, {}) VALUES (?, {placeholders})",
                columns.join(", ")
            )
        }
    };

    let mut query = sqlx::query(&sql);
    if existing.is_none() {
        query = query.bind(respondent_id);
    }
    for (_, value) in values {
        query = query.bind(*value);
    }
    query.execute(&mut *conn).await?;

    debug!(table, respondent_id, updated = existing.is_some(), "Upserted score sheet");
    Ok(())
}

async fn select_score_sheets(
    conn: &mut SqliteConnection,
    table: &str,
    columns: &[&str],
    respondent_id: i64,
) -> Result<Vec<SqliteRow>> {
    let score_columns: Vec<String> = columns.iter().map(|c| format!("s.{c}")).collect();
    let sql = format!(
        "SELECT s.id, s.respondent_id, r.name AS respondent_name, {}
         FROM {table} s
         JOIN respondents r ON r.id = s.respondent_id
         WHERE s.respondent_id = ?
         ORDER BY s.id",
        score_columns.join(", ")
    );

    let rows = sqlx::query(&sql)
        .bind(respondent_id)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

async fn select_field_pairs(
    conn: &mut SqliteConnection,
    table: &str,
    first_column: &str,
    second_column: &str,
    respondent_id: Option<i64>,
) -> Result<Vec<FieldPair>> {
    let filter = if respondent_id.is_some() {
        "WHERE respondent_id = ?"
    } else {
        ""
    };
    let sql = format!(
        "SELECT respondent_id, {first_column} AS first_value, {second_column} AS second_value
         FROM {table} {filter}
         ORDER BY id"
    );

    let mut query = sqlx::query(&sql);
    if let Some(id) = respondent_id {
        query = query.bind(id);
    }

    let rows = query.fetch_all(conn).await?;
    rows.iter()
        .map(|row| -> Result<FieldPair> {
            Ok(FieldPair {
                respondent_id: row.try_get("respondent_id")?,
                first: row.try_get("first_value")?,
                second: row.try_get("second_value")?,
            })
        })
        .collect()
}
