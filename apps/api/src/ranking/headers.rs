//! Header titles: one short display label per distinct criterion, cached for the request.

use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm_client::{strip_json_fences, ReasoningService};
use crate::ranking::models::HeaderLabels;
use crate::ranking::prompts::{HEADER_PROMPT_TEMPLATE, HEADER_SYSTEM};

/// Resolves criterion labels through the reasoning service, at most once per distinct text.
pub struct HeaderTitleResolver<'a> {
    llm: &'a dyn ReasoningService,
    labels: HeaderLabels,
}

impl<'a> HeaderTitleResolver<'a> {
    pub fn new(llm: &'a dyn ReasoningService) -> Self {
        Self {
            llm,
            labels: HeaderLabels::default(),
        }
    }

    /// Returns the cached label, or asks the reasoning service and caches the answer.
    pub async fn resolve(&mut self, criterion: &str) -> Result<String, AppError> {
        if let Some(label) = self.labels.get(criterion) {
            debug!("Header cache hit for criterion '{criterion}'");
            return Ok(label.to_string());
        }

        let prompt = HEADER_PROMPT_TEMPLATE.replace("{criterion}", criterion);
        let reply = self.llm.complete(HEADER_SYSTEM, &prompt).await?;
        let label = clean_label(&reply).ok_or_else(|| {
            AppError::Extraction(format!("empty header title for criterion '{criterion}'"))
        })?;

        self.labels.insert(criterion, label.clone());
        Ok(label)
    }

    /// Resolves every criterion. Completes before any resume is scored.
    pub async fn resolve_all(mut self, criteria: &[String]) -> Result<HeaderLabels, AppError> {
        let mut seen_labels: Vec<String> = Vec::new();
        for criterion in criteria {
            let already_known = self.labels.contains(criterion);
            let label = self.resolve(criterion).await?;
            if !already_known {
                if seen_labels.iter().any(|l| l == &label) {
                    warn!("Distinct criteria share the header title '{label}'");
                }
                seen_labels.push(label);
            }
        }
        Ok(self.labels)
    }
}

/// Strips fences, whitespace and wrapping quotes. `None` when nothing is left.
fn clean_label(reply: &str) -> Option<String> {
    let label = strip_json_fences(reply)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    (!label.is_empty()).then(|| label.to_string())
}
