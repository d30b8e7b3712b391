// Paid tier: payment verification, then a tailored resume and cover letter
// generated from the session's analysis.
// All LLM calls go through llm_client; no direct API calls here.

pub mod generator;
pub mod handlers;
pub mod payment;
pub mod prompts;
