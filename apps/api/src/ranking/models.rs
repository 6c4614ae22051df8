use std::collections::HashMap;

/// Highest score the reasoning service may assign to one criterion.
pub const MAX_CRITERION_SCORE: u8 = 10;

/// One resume's evaluation across all criteria, in caller-supplied criterion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    pub candidate_name: String,
    pub scores: Vec<u8>,
    pub total_score: u32,
}

impl ScoreRecord {
    /// Builds a record whose total is always the sum of its scores.
    pub fn new(candidate_name: impl Into<String>, scores: Vec<u8>) -> Self {
        let total_score = scores.iter().map(|&s| u32::from(s)).sum();
        Self {
            candidate_name: candidate_name.into(),
            scores,
            total_score,
        }
    }
}

/// Criterion text → display label, resolved once per request and then read-only.
#[derive(Debug, Clone, Default)]
pub struct HeaderLabels {
    labels: HashMap<String, String>,
}

impl HeaderLabels {
    pub fn insert(&mut self, criterion: &str, label: String) {
        self.labels.insert(criterion.to_string(), label);
    }

    pub fn get(&self, criterion: &str) -> Option<&str> {
        self.labels.get(criterion).map(String::as_str)
    }

    pub fn contains(&self, criterion: &str) -> bool {
        self.labels.contains_key(criterion)
    }

    /// Number of distinct criteria with a resolved label.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels for `criteria` in the given order. `None` if any criterion is unresolved.
    pub fn ordered<'a>(&'a self, criteria: &[String]) -> Option<Vec<&'a str>> {
        criteria.iter().map(|c| self.get(c)).collect()
    }
}

/// Final ranked output: a header row followed by one row per resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub header: Vec<String>,
    pub rows: Vec<ScoreRecord>,
}

impl ReportTable {
    /// Every row as strings, header first.
    pub fn string_rows(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone())
            .chain(self.rows.iter().map(|record| {
                std::iter::once(record.candidate_name.clone())
                    .chain(record.scores.iter().map(u8::to_string))
                    .chain(std::iter::once(record.total_score.to_string()))
                    .collect()
            }))
            .collect()
    }

    /// Renders the table as comma-delimited UTF-8 CSV with `\n` line endings.
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for row in self.string_rows() {
            writer.write_record(&row)?;
        }
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}
