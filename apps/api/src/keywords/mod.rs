// Keyword extraction: pulls the screening keywords out of a job description.
// Two LLM rounds run concurrently; their agreement decides which keywords survive,
// then the standardizer normalises the spelling.

pub mod extraction;
pub mod handlers;
pub mod intersection;
pub mod parsing;
