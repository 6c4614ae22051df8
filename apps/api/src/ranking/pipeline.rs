//! Resume ranking pipeline: orchestrates one request end to end.
//!
//! Flow: validate formats → resolve header titles (barrier) →
//!       extract + score each resume on a bounded worker pool → aggregate.
//!
//! The batch either fully succeeds or fails on the first error; no partial report is built.
//! Dropping the returned future (client gone) cancels any in-flight scoring calls.

use futures_util::{stream, StreamExt, TryStreamExt};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::documents::UploadedDocument;
use crate::errors::AppError;
use crate::llm_client::ReasoningService;
use crate::ranking::aggregator::aggregate;
use crate::ranking::criteria::extract_criteria;
use crate::ranking::headers::HeaderTitleResolver;
use crate::ranking::models::ReportTable;
use crate::ranking::scorer::score_resume;

/// Extracts a job description document's text and derives its ranking criteria.
pub async fn criteria_from_document(
    document: UploadedDocument,
    llm: &dyn ReasoningService,
) -> Result<Vec<String>, AppError> {
    document.format()?;
    let filename = document.filename.clone();
    let jd_text = document_text(document).await?;

    if jd_text.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "'{filename}' contains no extractable text"
        )));
    }

    extract_criteria(&jd_text, llm).await
}

/// Scores every resume against `criteria` and returns the ranked report.
///
/// Every resume's format is checked before the first reasoning-service call, and header
/// titles for all criteria are resolved before the first resume is scored.
pub async fn rank_resumes(
    criteria: &[String],
    resumes: Vec<UploadedDocument>,
    llm: &dyn ReasoningService,
    concurrency: usize,
) -> Result<ReportTable, AppError> {
    let batch_id = Uuid::new_v4();
    let span = info_span!(
        "score_batch",
        %batch_id,
        resumes = resumes.len(),
        criteria = criteria.len()
    );

    async move {
        for resume in &resumes {
            resume.format()?;
        }

        let labels = HeaderTitleResolver::new(llm).resolve_all(criteria).await?;
        info!("Resolved {} header titles", labels.len());

        let labels = &labels;
        let records = stream::iter(resumes)
            .map(|resume| async move {
                let filename = resume.filename.clone();
                let resume_text = document_text(resume).await?;
                if resume_text.trim().is_empty() {
                    warn!("'{filename}' contains no extractable text; scoring anyway");
                }

                let record = score_resume(&resume_text, criteria, labels, llm).await?;
                info!(
                    "Scored '{}' as '{}': total {}",
                    filename, record.candidate_name, record.total_score
                );
                Ok::<_, AppError>(record)
            })
            .buffered(concurrency.max(1))
            .try_collect::<Vec<_>>()
            .await?;

        let table = aggregate(records, labels, criteria)?;
        info!("Ranked {} resumes", table.rows.len());
        Ok::<_, AppError>(table)
    }
    .instrument(span)
    .await
}

/// Runs CPU-bound document parsing off the async executor.
async fn document_text(document: UploadedDocument) -> Result<String, AppError> {
    let filename = document.filename.clone();
    tokio::task::spawn_blocking(move || document.extract_text())
        .await
        .map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "text extraction for '{filename}' did not complete: {e}"
            ))
        })?
        .map_err(AppError::from)
}
