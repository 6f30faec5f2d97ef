//! Spreadsheet upload
//!
//! POST /api/upload (multipart/form-data, field `file`)
//!
//! The file is parsed on a blocking thread, then imported inside a single
//! transaction: any rejection leaves the database untouched.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use survey_common::ingest::{import_table, Table};
use survey_common::SqliteSurveyStore;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// Multipart field carrying the spreadsheet
pub const FILE_FIELD: &str = "file";

/// POST /api/upload success response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub rows_processed: usize,
    pub placeholder_names: usize,
}

struct UploadedFile {
    file_name: Option<String>,
    bytes: Vec<u8>,
}

/// POST /api/upload
pub async fn upload_spreadsheet(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let upload = read_file_field(multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    info!(
        file_name = upload.file_name.as_deref().unwrap_or("<unnamed>"),
        size = upload.bytes.len(),
        "Spreadsheet upload received"
    );

    let table = tokio::task::spawn_blocking(move || {
        Table::from_upload(upload.file_name.as_deref(), &upload.bytes)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Spreadsheet parser task failed: {e}")))??;

    let mut tx = state.db.begin().await?;
    let summary = {
        let mut store = SqliteSurveyStore::new(&mut tx);
        import_table(&mut store, &table).await?
    };
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Spreadsheet data processed successfully".to_string(),
            rows_processed: summary.rows_processed,
            placeholder_names: summary.placeholder_names,
        }),
    ))
}

/// First `file` field of the form, if any
async fn read_file_field(mut multipart: Multipart) -> ApiResult<Option<UploadedFile>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read uploaded file: {e}")))?;

        return Ok(Some(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}
