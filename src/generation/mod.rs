//! Post text generation.

pub mod llm;
mod pipeline;
mod prompts;

pub use pipeline::{GenerationError, GenerationPipeline, TextGenerator};
pub use prompts::PromptBuilder;
