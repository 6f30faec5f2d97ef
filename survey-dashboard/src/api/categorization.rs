//! Categorization endpoints
//!
//! GET /api/categorization/:respondent_id
//! GET /api/categorization-filter?category1=An&category2=Ex[&respondent_id=N]

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use survey_common::db::models::{Categorization, Category};
use survey_common::{SqliteSurveyStore, SurveyStore};

use super::filters::{parse_respondent_id, parse_selectors, SelectorParams};
use crate::{error::ApiResult, AppState};

const CATEGORY_SELECTORS: SelectorParams = SelectorParams {
    first_param: "category1",
    second_param: "category2",
    noun: "categories",
};

/// Query parameters for the category filter
#[derive(Debug, Deserialize)]
pub struct CategoryFilterQuery {
    pub category1: Option<String>,
    pub category2: Option<String>,
    pub respondent_id: Option<String>,
}

/// One row of the category filter result
#[derive(Debug, Serialize)]
pub struct CategoryPair {
    pub respondent_id: i64,
    pub category1: Option<f64>,
    pub category2: Option<f64>,
}

/// GET /api/categorization/:respondent_id
pub async fn categorization_by_respondent(
    State(state): State<AppState>,
    Path(respondent_id): Path<i64>,
) -> ApiResult<Json<Vec<Categorization>>> {
    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    Ok(Json(store.categorizations_for(respondent_id).await?))
}

/// GET /api/categorization-filter
pub async fn filter_categorization(
    State(state): State<AppState>,
    Query(query): Query<CategoryFilterQuery>,
) -> ApiResult<Json<Vec<CategoryPair>>> {
    let (first, second) = parse_selectors::<Category>(
        &CATEGORY_SELECTORS,
        query.category1.as_deref(),
        query.category2.as_deref(),
        Category::valid_codes,
    )?;
    let respondent_id = parse_respondent_id(query.respondent_id.as_deref())?;

    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    let pairs = store.category_pairs(first, second, respondent_id).await?;

    Ok(Json(
        pairs
            .into_iter()
            .map(|p| CategoryPair {
                respondent_id: p.respondent_id,
                category1: p.first,
                category2: p.second,
            })
            .collect(),
    ))
}
