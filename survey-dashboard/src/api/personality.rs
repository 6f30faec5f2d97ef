//! Personality factor endpoints
//!
//! GET /api/personality-factors/:respondent_id
//! GET /api/personality-factors-filter?factor1=A&factor2=B[&respondent_id=N]

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use survey_common::db::models::{PersonalityFactor, PersonalityFactors};
use survey_common::{SqliteSurveyStore, SurveyStore};

use super::filters::{parse_respondent_id, parse_selectors, SelectorParams};
use crate::{error::ApiResult, AppState};

const FACTOR_SELECTORS: SelectorParams = SelectorParams {
    first_param: "factor1",
    second_param: "factor2",
    noun: "factors",
};

/// Query parameters for the factor filter
#[derive(Debug, Deserialize)]
pub struct FactorFilterQuery {
    pub factor1: Option<String>,
    pub factor2: Option<String>,
    pub respondent_id: Option<String>,
}

/// One row of the factor filter result
#[derive(Debug, Serialize)]
pub struct FactorPair {
    pub respondent_id: i64,
    pub factor1: Option<f64>,
    pub factor2: Option<f64>,
}

/// GET /api/personality-factors/:respondent_id
///
/// Unknown respondents yield an empty list.
pub async fn personality_factors_by_respondent(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
) -> ApiResult<Json<Vec<PersonalityFactors>>> {
    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    Ok(Json(store.personality_factors_for(respondent_id).await?))
}

/// GET /api/personality-factors-filter
///
/// Returns `{respondent_id, factor1, factor2}` for every personality sheet,
/// optionally narrowed to one respondent. No matches is an empty list.
pub async fn filter_personality_factors(
    State(state): State<AppState>,
    Query(query): Query<FactorFilterQuery>,
) -> ApiResult<Json<Vec<FactorPair>>> {
    let (first, second) = parse_selectors::<PersonalityFactor>(
        &FACTOR_SELECTORS,
        query.factor1.as_deref(),
        query.factor2.as_deref(),
        PersonalityFactor::valid_codes,
    )?;
    let respondent_id = parse_respondent_id(query.respondent_id.as_deref())?;

    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    let pairs = store
        .personality_factor_pairs(first, second, respondent_id)
        .await?;

    tracing::debug!(%first, %second, ?respondent_id, results = pairs.len(), "Factor filter");

    Ok(Json(
        pairs
            .into_iter()
            .map(|p| FactorPair {
                respondent_id: p.respondent_id,
                factor1: p.first,
                factor2: p.second,
            })
            .collect(),
    ))
}
