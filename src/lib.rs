//! Calliope - Asynchronous Content Generation and Semantic Highlighting
//!
//! A Rust content pipeline that drafts, refines, and annotates editorial
//! content with an agent:
//! - Draft generation and instruction-driven refinement
//! - Background semantic highlighting over a closed tag vocabulary
//! - Epoch-guarded annotation status that never clobbers user edits
//! - Reconciliation polling for clients without an event stream
//! - Server-Sent Events for live editor updates
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (ContentItem, HighlightStatus, etc.)
//! - **Normalize**: Payload normalization and text sanitization
//! - **Highlight**: Tag vocabulary, markup codec, display spans, cache
//! - **Pipeline**: Status machine, orchestrator, poller, auto-saver
//! - **Services**: Agent client, annotator, remote status source
//! - **Storage**: Content stores
//! - **Api**: HTTP server and event broadcasting
//!
//! # Example
//!
//! ```ignore
//! use calliope_core::{
//!     AgentClient, AnnotatorService, GenerationOrchestrator, GenerationSpec, MemoryStore,
//! };
//! use calliope_core::api::EventBroadcaster;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let agent = Arc::new(AgentClient::with_default()?);
//!     let annotator = Arc::new(AnnotatorService::new(agent.clone()));
//!     let orchestrator = GenerationOrchestrator::new(
//!         store,
//!         agent,
//!         annotator,
//!         EventBroadcaster::default(),
//!     );
//!
//!     // Draft a new item; highlighting runs in the background
//!     let item = orchestrator
//!         .generate(GenerationSpec {
//!             brief: "Announce the Q3 release".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("drafted {}", item.id);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod highlight;
pub mod normalize;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::CalliopeConfig;
pub use error::{CalliopeError, Result};
pub use pipeline::{GenerationOrchestrator, PollSettings, ReconciliationPoller};
pub use services::{AgentClient, AnnotatorService};
pub use storage::{memory::MemoryStore, ContentStore};
pub use types::{
    AnnotationContext, ContentId, ContentItem, GenerationSpec, HighlightStatus, LifecycleStatus,
};
