//! Respondent endpoints
//!
//! GET/POST /api/respondents, GET/DELETE /api/respondents/:id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use survey_common::db::models::{NewRespondent, Respondent};
use survey_common::ingest::{normalize_gender, validate_age};
use survey_common::{SqliteSurveyStore, SurveyStore};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// GET /api/respondents
pub async fn list_respondents(State(state): State<AppState>) -> ApiResult<Json<Vec<Respondent>>> {
    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    Ok(Json(store.list_respondents().await?))
}

/// GET /api/respondents/:id
pub async fn get_respondent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Respondent>> {
    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    store
        .get_respondent(id)
        .await?
        .map(Json)
        .ok_or(ApiError::Common(survey_common::Error::RespondentNotFound(id)))
}

/// POST /api/respondents
///
/// Direct write: always creates a new row, even for an existing name.
/// Gender goes through the same normalization as imports.
pub async fn create_respondent(
    State(state): State<AppState>,
    Json(request): Json<NewRespondent>,
) -> ApiResult<(StatusCode, Json<Respondent>)> {
    let respondent = validate_new_respondent(request)?;

    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);
    let created = store.create_respondent(&respondent).await?;

    info!(id = created.id, name = %created.name, "Respondent created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/respondents/:id
///
/// Score sheets of the respondent are removed by cascade.
pub async fn delete_respondent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut conn = state.db.acquire().await?;
    let mut store = SqliteSurveyStore::new(&mut conn);

    if !store.delete_respondent(id).await? {
        return Err(survey_common::Error::RespondentNotFound(id).into());
    }

    info!(id, "Respondent deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn validate_new_respondent(request: NewRespondent) -> ApiResult<NewRespondent> {
    if request.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    validate_age(request.age).map_err(|message| invalid(&message))?;
    if request.gender.trim().is_empty() {
        return Err(invalid("gender must not be empty"));
    }

    Ok(NewRespondent {
        gender: normalize_gender(&request.gender),
        ..request
    })
}

fn invalid(message: &str) -> ApiError {
    survey_common::Error::InvalidInput(message.to_string()).into()
}
