// All LLM prompt constants for the ranking pipeline.
// JSON-only replies get `llm_client::prompts::json_system` wrapped around their role prompt.

/// Role prompt for criteria extraction.
pub const CRITERIA_SYSTEM: &str = r#"You are an expert HR assistant with extensive experience in evaluating job descriptions.
Your task is to analyze a job description and extract all key ranking criteria that employers use
to evaluate candidates. These criteria should include required skills, certifications, years of experience,
educational qualifications, and any other important attributes that can help rank a candidate.
Your response must be a JSON object with one field, "criteria", which is a list of criteria strings.
Sample output:
{
  "criteria": [
    "Must have certification XYZ",
    "5+ years of experience in Python development",
    "Strong background in Machine Learning"
  ]
}"#;

/// Criteria extraction prompt. Replace `{jd_text}` before sending.
pub const CRITERIA_PROMPT_TEMPLATE: &str =
    "Extract the key ranking criteria from this job description:\n{jd_text}";

/// System prompt for header labels. The reply is a bare label, not JSON.
pub const HEADER_SYSTEM: &str = r#"You are an expert HR evaluator. Your task is to extract a concise header title for a given candidate evaluation criterion.
Here is an example:
input: "Proficient in RAG implementations and vector database operations"
output: RAG & Vector Databases"#;

/// Header label prompt. Replace `{criterion}` before sending.
pub const HEADER_PROMPT_TEMPLATE: &str = "Extract a concise header title for the following candidate evaluation criterion: {criterion}\n\
    Respond with only the header title. Do not add any extra words, quotes or lines before or after the header title.";

/// Role prompt for resume scoring.
pub const SCORING_SYSTEM: &str = r#"You are an expert HR evaluator. Your job is to evaluate a candidate's resume against a list of evaluation criteria.
Extract the candidate's full name from the resume, assign an integer score between 0 and 10 for each criterion,
calculate the total score, and return the result as a JSON object.
Use exactly the same header names as provided in the criteria input, character for character.
Example of how to replicate the criteria headers in the output JSON:

input (criteria):
- RAG & Vector Databases : Proficient in RAG implementations and vector database operations
- Azure Certifications : Azure Certifications such as Microsoft Certified: Azure AI Engineer Associate
- Team Communication : Foster open communication within the team

output:
{
  "Candidate's Name": "John Doe",
  "RAG & Vector Databases": 8,
  "Azure Certifications": 5,
  "Team Communication": 0,
  "Total Score": 13
}"#;

/// Resume scoring prompt. Replace `{criteria_text}` then `{resume_text}` before sending.
pub const SCORING_PROMPT_TEMPLATE: &str = r#"Here are the evaluation criteria:
{criteria_text}

Here is the resume text:
{resume_text}"#;

/// Field the scoring reply uses for the candidate's name.
pub const CANDIDATE_NAME_FIELD: &str = "Candidate's Name";

/// Field the scoring reply uses for its self-reported total.
pub const TOTAL_SCORE_FIELD: &str = "Total Score";
