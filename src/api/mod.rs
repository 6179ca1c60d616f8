//! HTTP API for the content pipeline
//!
//! Provides:
//! - Content generation, refinement and annotation endpoints
//! - Server-Sent Events (SSE) for pipeline updates
//! - Item views with decoded display spans

pub mod events;
pub mod server;

pub use events::{ContentEvent, Event, EventBroadcaster};
pub use server::{ApiServer, ApiServerConfig};
