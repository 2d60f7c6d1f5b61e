//! Advisory layer: generative-text prompts for inspectors, with static fallbacks.

mod advisor;
pub mod prompts;

pub use advisor::{Advisor, AdvisorError, DEFAULT_ENDPOINT, DEFAULT_MODEL};
