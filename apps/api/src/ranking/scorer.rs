//! Resume scoring: one reasoning-service call per resume, reconciled back onto the
//! caller's criterion order.
//!
//! The reply is keyed by header labels that came from a separate, non-deterministic call,
//! so keys are looked up exactly first and then by a normalized form (case, spacing,
//! underscores, surrounding punctuation). A label that cannot be found, or matches more than
//! one key, fails the resume with `SchemaMismatch`. Nothing is defaulted or reordered.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::json_system;
use crate::llm_client::{parse_json, ReasoningService};
use crate::ranking::models::{HeaderLabels, ScoreRecord, MAX_CRITERION_SCORE};
use crate::ranking::prompts::{
    CANDIDATE_NAME_FIELD, SCORING_PROMPT_TEMPLATE, SCORING_SYSTEM, TOTAL_SCORE_FIELD,
};

/// Keys accepted for the candidate name, in preference order. No bare "Name": a header
/// label may resolve to that.
const NAME_FIELDS: [&str; 2] = [CANDIDATE_NAME_FIELD, "Candidate Name"];

/// Keys accepted for the self-reported total, in preference order.
const TOTAL_FIELDS: [&str; 3] = [TOTAL_SCORE_FIELD, "Total_Score", "Total"];

/// Scores one resume against every criterion in a single call.
///
/// `labels` must already hold a label for every criterion.
pub async fn score_resume(
    resume_text: &str,
    criteria: &[String],
    labels: &HeaderLabels,
    llm: &dyn ReasoningService,
) -> Result<ScoreRecord, AppError> {
    let ordered_labels = labels.ordered(criteria).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "header labels must be resolved before scoring"
        ))
    })?;

    let prompt = build_scoring_prompt(resume_text, criteria, &ordered_labels);
    let reply = llm.complete(&json_system(SCORING_SYSTEM), &prompt).await?;

    let fields: Map<String, Value> = parse_json(&reply).map_err(|e| {
        AppError::SchemaMismatch(format!("scoring reply is not a JSON object: {e}"))
    })?;

    reconcile(&fields, &ordered_labels)
}

fn build_scoring_prompt(resume_text: &str, criteria: &[String], labels: &[&str]) -> String {
    let mut listed = HashSet::new();
    let criteria_text = criteria
        .iter()
        .zip(labels)
        .filter(|(criterion, _)| listed.insert(criterion.to_string()))
        .map(|(criterion, label)| format!("- {label} : {criterion}"))
        .collect::<Vec<_>>()
        .join("\n");

    SCORING_PROMPT_TEMPLATE
        .replace("{criteria_text}", &criteria_text)
        .replace("{resume_text}", resume_text)
}

/// Maps reply fields onto the expected labels, in label order.
fn reconcile(fields: &Map<String, Value>, labels: &[&str]) -> Result<ScoreRecord, AppError> {
    let reply = ReplyFields::new(fields);

    let candidate_name = reply
        .first_of(&NAME_FIELDS)?
        .ok_or_else(|| AppError::SchemaMismatch("reply has no candidate name field".to_string()))?;
    let candidate_name = candidate_name
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AppError::SchemaMismatch("candidate name is not a string".to_string()))?;

    let scores = labels
        .iter()
        .map(|label| {
            let value = reply.lookup(label)?.ok_or_else(|| {
                AppError::SchemaMismatch(format!("reply has no score for header '{label}'"))
            })?;
            coerce_score(value).ok_or_else(|| {
                AppError::SchemaMismatch(format!(
                    "score for header '{label}' is not an integer in 0..={MAX_CRITERION_SCORE}: {value}"
                ))
            })
        })
        .collect::<Result<Vec<u8>, AppError>>()?;

    let record = ScoreRecord::new(candidate_name, scores);

    // The reply's own total is advisory only; the record always carries the real sum.
    let reported = reply.first_of(&TOTAL_FIELDS).unwrap_or_else(|e| {
        warn!("Ignoring reported total for '{}': {e}", record.candidate_name);
        None
    });
    match reported.and_then(coerce_total) {
        Some(reported) if reported != record.total_score => warn!(
            "Reported total {} for '{}' disagrees with score sum {}; using the sum",
            reported, record.candidate_name, record.total_score
        ),
        Some(_) => {}
        None => debug!("Reply for '{}' has no usable total", record.candidate_name),
    }

    Ok(record)
}

/// Reply object indexed for exact and normalized key lookup.
struct ReplyFields<'a> {
    fields: &'a Map<String, Value>,
    normalized: Vec<(String, &'a str)>,
}

impl<'a> ReplyFields<'a> {
    fn new(fields: &'a Map<String, Value>) -> Self {
        let normalized = fields
            .keys()
            .map(|key| (normalize_key(key), key.as_str()))
            .collect();
        Self { fields, normalized }
    }

    /// `Ok(None)` when absent; `Err` when several keys normalize to the same label.
    fn lookup(&self, expected: &str) -> Result<Option<&'a Value>, AppError> {
        if let Some(value) = self.fields.get(expected) {
            return Ok(Some(value));
        }

        let wanted = normalize_key(expected);
        let matches: Vec<&str> = self
            .normalized
            .iter()
            .filter(|(norm, _)| *norm == wanted)
            .map(|(_, key)| *key)
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [key] => Ok(self.fields.get(*key)),
            several => Err(AppError::SchemaMismatch(format!(
                "header '{expected}' matches several reply fields: {several:?}"
            ))),
        }
    }

    fn first_of(&self, candidates: &[&str]) -> Result<Option<&'a Value>, AppError> {
        for key in candidates {
            if let Some(value) = self.lookup(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

fn normalize_key(key: &str) -> String {
    key.replace(['_', '\u{a0}'], " ")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | ':' | '.' | '*' | '-'))
        .to_lowercase()
}

/// Accepts integers, integral floats and integer strings within the score domain.
fn coerce_score(value: &Value) -> Option<u8> {
    let n = coerce_integer(value)?;
    u8::try_from(n).ok().filter(|score| *score <= MAX_CRITERION_SCORE)
}

fn coerce_total(value: &Value) -> Option<u32> {
    coerce_integer(value).and_then(|n| u32::try_from(n).ok())
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::llm_client::testing::ScriptedLlm;

    fn labels(pairs: &[(&str, &str)]) -> (Vec<String>, HeaderLabels) {
        let mut labels = HeaderLabels::default();
        for (criterion, label) in pairs {
            labels.insert(criterion, label.to_string());
        }
        (pairs.iter().map(|(c, _)| c.to_string()).collect(), labels)
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_scores_follow_criteria_order_not_reply_order() {
        let (criteria, labels) = labels(&[
            ("5+ years of Python experience", "Python Experience"),
            ("AWS certification", "AWS"),
        ]);
        let llm = ScriptedLlm::replying(
            r#"{"AWS": 9, "Candidate's Name": "Bob", "Python Experience": 4, "Total Score": 13}"#,
        );

        let record = score_resume("Bob's resume", &criteria, &labels, &llm)
            .await
            .unwrap();

        assert_eq!(record, ScoreRecord::new("Bob", vec![4, 9]));
        assert_eq!(record.total_score, 13);
    }

    #[tokio::test]
    async fn test_prompt_pairs_labels_with_criteria_and_includes_resume() {
        let (criteria, labels) = labels(&[("AWS certification", "AWS"), ("Go", "Golang")]);
        let llm = ScriptedLlm::replying(
            r#"{"Candidate's Name": "Alice", "AWS": 8, "Golang": 2, "Total Score": 10}"#,
        );

        score_resume("ALICE RESUME BODY", &criteria, &labels, &llm)
            .await
            .unwrap();

        let prompt = &llm.user_prompts()[0];
        assert!(prompt.contains("- AWS : AWS certification\n- Golang : Go"));
        assert!(prompt.contains("ALICE RESUME BODY"));
    }

    #[tokio::test]
    async fn test_fenced_reply_is_accepted() {
        let (criteria, labels) = labels(&[("AWS certification", "AWS")]);
        let llm = ScriptedLlm::replying(
            "```json\n{\"Candidate's Name\": \"Alice\", \"AWS\": 8, \"Total Score\": 8}\n```",
        );
        let record = score_resume("resume", &criteria, &labels, &llm)
            .await
            .unwrap();
        assert_eq!(record, ScoreRecord::new("Alice", vec![8]));
    }

    #[tokio::test]
    async fn test_missing_header_is_schema_mismatch() {
        let (criteria, labels) = labels(&[("AWS certification", "AWS"), ("Go", "Golang")]);
        let llm = ScriptedLlm::replying(r#"{"Candidate's Name": "Alice", "AWS": 8}"#);
        let err = score_resume("resume", &criteria, &labels, &llm)
            .await
            .unwrap_err();
        match err {
            AppError::SchemaMismatch(msg) => assert!(msg.contains("Golang")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_reply_is_schema_mismatch() {
        let (criteria, labels) = labels(&[("AWS certification", "AWS")]);
        let llm = ScriptedLlm::replying("Alice scored 8 on AWS.");
        let err = score_resume("resume", &criteria, &labels, &llm)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn test_zero_criteria_scores_only_the_name() {
        let llm = ScriptedLlm::replying(r#"{"Candidate's Name": "Alice", "Total Score": 0}"#);
        let record = score_resume("resume", &[], &HeaderLabels::default(), &llm)
            .await
            .unwrap();
        assert_eq!(record, ScoreRecord::new("Alice", vec![]));
    }

    #[tokio::test]
    async fn test_unresolved_labels_fail_before_calling_service() {
        let llm = ScriptedLlm::replying("{}");
        let criteria = vec!["AWS certification".to_string()];
        let err = score_resume("resume", &criteria, &HeaderLabels::default(), &llm)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_reconcile_tolerates_case_and_spacing_drift() {
        let fields = object(json!({
            "candidate's  name": "Alice",
            "rag & vector  databases": 7,
            " Azure_Certifications ": "5",
        }));
        let record = reconcile(&fields, &["RAG & Vector Databases", "Azure Certifications"]).unwrap();
        assert_eq!(record, ScoreRecord::new("Alice", vec![7, 5]));
    }

    #[test]
    fn test_exact_key_wins_over_normalized_duplicates() {
        let fields = object(json!({
            "Candidate's Name": "Alice",
            "AWS": 6,
            "aws": 2,
        }));
        let record = reconcile(&fields, &["AWS"]).unwrap();
        assert_eq!(record.scores, vec![6]);
    }

    #[test]
    fn test_ambiguous_normalized_match_is_schema_mismatch() {
        let fields = object(json!({
            "Candidate Name": "Alice",
            "aws": 6,
            "AWS ": 2,
        }));
        assert!(matches!(
            reconcile(&fields, &["Aws"]),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_missing_candidate_name_is_schema_mismatch() {
        let fields = object(json!({"AWS": 6}));
        assert!(matches!(
            reconcile(&fields, &["AWS"]),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_reported_total_is_replaced_by_sum() {
        let fields = object(json!({
            "Candidate's Name": "Alice",
            "AWS": 8,
            "Python": 3,
            "Total Score": 42,
        }));
        let record = reconcile(&fields, &["AWS", "Python"]).unwrap();
        assert_eq!(record.total_score, 11);
    }

    #[test]
    fn test_ambiguous_reported_total_is_ignored() {
        let fields = object(json!({
            "Candidate's Name": "Alice",
            "AWS": 8,
            "total score": 8,
            "Total_Score": 8,
        }));
        let record = reconcile(&fields, &["AWS"]).unwrap();
        assert_eq!(record, ScoreRecord::new("Alice", vec![8]));
    }

    #[test]
    fn test_label_called_name_is_not_read_as_candidate_name() {
        let fields = object(json!({
            "Candidate's Name": "Alice",
            "Name": 7,
            "Candidate": 4,
        }));
        let record = reconcile(&fields, &["Name", "Candidate"]).unwrap();
        assert_eq!(record, ScoreRecord::new("Alice", vec![7, 4]));
    }

    #[test]
    fn test_bare_name_key_is_not_a_candidate_name() {
        let fields = object(json!({"Name": "Alice", "AWS": 6}));
        assert!(matches!(
            reconcile(&fields, &["AWS"]),
            Err(AppError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_score_coercion_bounds() {
        assert_eq!(coerce_score(&json!(0)), Some(0));
        assert_eq!(coerce_score(&json!(10)), Some(10));
        assert_eq!(coerce_score(&json!(8.0)), Some(8));
        assert_eq!(coerce_score(&json!(" 7 ")), Some(7));
        assert_eq!(coerce_score(&json!(11)), None);
        assert_eq!(coerce_score(&json!(-1)), None);
        assert_eq!(coerce_score(&json!(7.5)), None);
        assert_eq!(coerce_score(&json!("seven")), None);
        assert_eq!(coerce_score(&json!(null)), None);
        assert_eq!(coerce_score(&json!(true)), None);
    }

    #[test]
    fn test_out_of_range_score_names_the_header() {
        let fields = object(json!({"Candidate's Name": "Alice", "AWS": 12}));
        match reconcile(&fields, &["AWS"]) {
            Err(AppError::SchemaMismatch(msg)) => assert!(msg.contains("'AWS'")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Total_Score "), "total score");
        assert_eq!(normalize_key("Candidate\u{2019}s Name:"), "candidate's name");
        assert_eq!(normalize_key("**RAG   & Vector DBs**"), "rag & vector dbs");
    }
}
