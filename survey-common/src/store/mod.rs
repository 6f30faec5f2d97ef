//! Persistence port for respondents and their score sheets
//!
//! The ingestion normalizer and the HTTP handlers only talk to
//! [`SurveyStore`]; [`SqliteSurveyStore`] is the production adapter.

mod sqlite;

pub use sqlite::SqliteSurveyStore;

use crate::db::models::{
    Categorization, Category, CategoryScores, FieldPair, NewRespondent, PersonalityFactor,
    PersonalityFactors, PersonalityScores, Respondent,
};
use crate::Result;
use async_trait::async_trait;

/// Upsert-by-key, filter-by-field-pair, get-by-id and list operations over
/// the three survey entities
#[async_trait]
pub trait SurveyStore: Send {
    /// Number of stored respondents
    async fn count_respondents(&mut self) -> Result<i64>;

    /// Insert or update the respondent keyed by exact (case-sensitive) name.
    ///
    /// Returns the respondent id. If several rows share the name, the one
    /// with the lowest id is updated.
    async fn upsert_respondent(&mut self, respondent: &NewRespondent) -> Result<i64>;

    /// Insert or replace the personality sheet of a respondent
    async fn upsert_personality_factors(
        &mut self,
        respondent_id: i64,
        scores: &PersonalityScores,
    ) -> Result<()>;

    /// Insert or replace the categorization sheet of a respondent
    async fn upsert_categorization(
        &mut self,
        respondent_id: i64,
        scores: &CategoryScores,
    ) -> Result<()>;

    async fn list_respondents(&mut self) -> Result<Vec<Respondent>>;

    async fn get_respondent(&mut self, id: i64) -> Result<Option<Respondent>>;

    /// Always inserts a new row, even if the name already exists
    async fn create_respondent(&mut self, respondent: &NewRespondent) -> Result<Respondent>;

    /// Delete a respondent and (by cascade) its score sheets.
    ///
    /// Returns `false` if no such respondent existed.
    async fn delete_respondent(&mut self, id: i64) -> Result<bool>;

    async fn personality_factors_for(&mut self, respondent_id: i64)
        -> Result<Vec<PersonalityFactors>>;

    async fn categorizations_for(&mut self, respondent_id: i64) -> Result<Vec<Categorization>>;

    /// Two selected factor values for every personality sheet, ordered by row id
    async fn personality_factor_pairs(
        &mut self,
        first: PersonalityFactor,
        second: PersonalityFactor,
        respondent_id: Option<i64>,
    ) -> Result<Vec<FieldPair>>;

    /// Two selected category values for every categorization, ordered by row id
    async fn category_pairs(
        &mut self,
        first: Category,
        second: Category,
        respondent_id: Option<i64>,
    ) -> Result<Vec<FieldPair>>;
}
