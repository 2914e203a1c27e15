// Gap analysis: an LLM critique of a resume against a job description.
// The orchestrator owns retries; parser, formatter and emptiness detector are
// pure functions over the raw text. Every response carries all five fields.

pub mod coverage;
pub mod emptiness;
pub mod formatter;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod parser;
