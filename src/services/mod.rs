//! Services layer for the content pipeline
//!
//! Provides agent integration for drafting, refinement and annotation.

pub mod agent;
pub mod annotator;
pub mod status;

pub use agent::{AgentClient, AgentConfig, CompletionBackend, GenerationPayload};
pub use annotator::AnnotatorService;
pub use status::HttpStatusSource;
