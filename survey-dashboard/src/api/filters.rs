//! Query-parameter validation shared by the two-field filter endpoints
//!
//! Both filters take two selectors from a closed field vocabulary plus an
//! optional respondent id. Blank parameters count as absent.

use std::str::FromStr;

use crate::error::{ApiError, ApiResult};

/// Parameter names and wording for one filter endpoint
pub struct SelectorParams {
    pub first_param: &'static str,
    pub second_param: &'static str,
    /// Plural noun used in the invalid-field message ("factors")
    pub noun: &'static str,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate both selectors.
///
/// Absence of either is reported before vocabulary membership, and one bad
/// selector fails the request regardless of the other.
pub fn parse_selectors<F: FromStr>(
    spec: &SelectorParams,
    first: Option<&str>,
    second: Option<&str>,
    valid_codes: impl FnOnce() -> String,
) -> ApiResult<(F, F)> {
    let (Some(first), Some(second)) = (present(first), present(second)) else {
        return Err(ApiError::BadRequest(format!(
            "Both '{}' and '{}' query parameters are required.",
            spec.first_param, spec.second_param
        )));
    };

    match (first.parse::<F>(), second.parse::<F>()) {
        (Ok(first), Ok(second)) => Ok((first, second)),
        _ => Err(ApiError::BadRequest(format!(
            "Invalid {noun}. Valid {noun} are: {}.",
            valid_codes(),
            noun = spec.noun
        ))),
    }
}

/// Optional `respondent_id` narrowing; must be an integer when given
pub fn parse_respondent_id(raw: Option<&str>) -> ApiResult<Option<i64>> {
    match present(raw) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            ApiError::BadRequest(format!("Invalid respondent_id (must be an integer): {raw}"))
        }),
    }
}
