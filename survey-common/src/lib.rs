//! # Survey Common Library
//!
//! Shared code for the survey dashboard service including:
//! - Database initialization and entity records
//! - Field vocabularies for personality factors and categorizations
//! - The `SurveyStore` persistence port and its SQLite adapter
//! - Spreadsheet ingestion (tabular readers + import normalizer)
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod store;

pub use error::{Error, Result};
pub use store::{SqliteSurveyStore, SurveyStore};
