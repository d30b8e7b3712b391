// Analysis layer: content fingerprints, the dedup cache over the record
// store, and the gateway to the completion service.
// All LLM calls go through llm_client; no direct API calls here.

pub mod cache;
pub mod fingerprint;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod store;
