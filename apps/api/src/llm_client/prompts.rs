// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every system prompt whose reply is parsed as JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT include explanations or apologies.";

/// Builds a system prompt that demands a JSON-only reply.
pub fn json_system(role_prompt: &str) -> String {
    format!("{}\n\n{}", role_prompt.trim(), JSON_ONLY_INSTRUCTION)
}
