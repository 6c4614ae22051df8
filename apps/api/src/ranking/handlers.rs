//! Axum route handlers for the ranking API.

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::documents::UploadedDocument;
use crate::errors::AppError;
use crate::ranking::pipeline::{criteria_from_document, rank_resumes};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CriteriaResponse {
    pub criteria: Vec<String>,
}

/// POST /job/extract-criteria
///
/// Multipart: one `file` field holding a PDF or DOCX job description.
pub async fn handle_extract_criteria(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CriteriaResponse>, AppError> {
    let mut document = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            document = Some(read_document(field).await?);
        }
    }

    let document = document
        .ok_or_else(|| AppError::Validation("multipart field 'file' is required".to_string()))?;
    info!("Extracting criteria from '{}'", document.filename);

    let criteria = criteria_from_document(document, state.llm.as_ref()).await?;
    Ok(Json(CriteriaResponse { criteria }))
}

/// POST /resume/score-resumes
///
/// Multipart: repeated `criteria` text fields (in ranking order) and repeated `files`
/// fields (resumes, in submission order). Returns the ranked report as CSV.
pub async fn handle_score_resumes(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut criteria = Vec::new();
    let mut resumes = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("criteria") => criteria.push(field.text().await.map_err(multipart_error)?),
            Some("files") => resumes.push(read_document(field).await?),
            _ => {}
        }
    }

    if resumes.is_empty() {
        return Err(AppError::Validation(
            "at least one 'files' field is required".to_string(),
        ));
    }

    let table = rank_resumes(
        &criteria,
        resumes,
        state.llm.as_ref(),
        state.config.scoring_concurrency,
    )
    .await?;
    let csv = table
        .to_csv()
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=data.csv"),
        ],
        csv,
    ))
}

async fn read_document(field: Field<'_>) -> Result<UploadedDocument, AppError> {
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("uploaded file has no filename".to_string()))?;
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(UploadedDocument::new(filename, bytes))
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::Validation(format!("invalid multipart body: {}", err.body_text()))
}
