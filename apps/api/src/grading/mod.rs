// Grading and companion engine.
// Implements: prompt building, completion parsing, Q/A segmentation, and the
// Grader facade that the HTTP handlers call.
// All model calls go through llm_client::CompletionProvider — no vendor calls here.

pub mod grader;
pub mod handlers;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod segmenter;
