// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "Always respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT include explanations or apologies.";

/// Instruction appended to every generation prompt.
pub const TRUTHFULNESS_INSTRUCTION: &str = "\
    CRITICAL: Use only facts present in the resume. \
    Do NOT invent employers, dates, titles, metrics or certifications. \
    If the resume does not support a claim, omit it.";

/// Builds a system prompt from a persona sentence plus the JSON-only fragment.
pub fn json_system(persona: &str) -> String {
    format!("{persona} {JSON_ONLY_SYSTEM}")
}
