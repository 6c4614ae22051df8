use crate::errors::AppError;
use crate::ranking::models::{HeaderLabels, ReportTable, ScoreRecord};

pub const NAME_COLUMN: &str = "Name";
pub const TOTAL_COLUMN: &str = "Total_Score";

/// Ranks score records by total, highest first. Ties keep submission order.
pub fn aggregate(
    mut records: Vec<ScoreRecord>,
    labels: &HeaderLabels,
    criteria: &[String],
) -> Result<ReportTable, AppError> {
    let ordered = labels.ordered(criteria).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("report needs a label for every criterion"))
    })?;

    let header = std::iter::once(NAME_COLUMN)
        .chain(ordered)
        .chain(std::iter::once(TOTAL_COLUMN))
        .map(str::to_string)
        .collect();

    // `sort_by` is stable, which is what keeps tied candidates in upload order.
    records.sort_by(|a, b| b.total_score.cmp(&a.total_score));

    Ok(ReportTable {
        header,
        rows: records,
    })
}
