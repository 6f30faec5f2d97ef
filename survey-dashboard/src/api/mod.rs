//! HTTP API handlers for survey-dashboard

pub mod buildinfo;
pub mod categorization;
pub mod filters;
pub mod health;
pub mod personality;
pub mod respondents;
pub mod upload;

pub use buildinfo::get_build_info;
pub use categorization::{categorization_by_respondent, filter_categorization};
pub use health::health_routes;
pub use personality::{filter_personality_factors, personality_factors_by_respondent};
pub use respondents::{create_respondent, delete_respondent, get_respondent, list_respondents};
pub use upload::upload_spreadsheet;
