//! Criteria extraction: derives the ranking criteria for one job description.

use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::llm_client::prompts::json_system;
use crate::llm_client::{parse_json, ReasoningService};
use crate::ranking::prompts::{CRITERIA_PROMPT_TEMPLATE, CRITERIA_SYSTEM};

#[derive(Debug, Deserialize)]
struct CriteriaReply {
    criteria: Vec<String>,
}

/// Asks the reasoning service for the job description's ranking criteria.
///
/// The returned list is passed through verbatim: no dedup, reordering or quality checks.
pub async fn extract_criteria(
    jd_text: &str,
    llm: &dyn ReasoningService,
) -> Result<Vec<String>, AppError> {
    let prompt = CRITERIA_PROMPT_TEMPLATE.replace("{jd_text}", jd_text);
    let reply = llm.complete(&json_system(CRITERIA_SYSTEM), &prompt).await?;

    let parsed: CriteriaReply =
        parse_json(&reply).map_err(|e| AppError::Extraction(format!("criteria reply: {e}")))?;

    info!("Extracted {} ranking criteria", parsed.criteria.len());
    Ok(parsed.criteria)
}
