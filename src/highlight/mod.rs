//! Semantic highlight markup handling
//!
//! The annotation pass wraps spans of generated content in a closed vocabulary
//! of category tags. This module owns that vocabulary and everything that
//! interprets it:
//! - **tags**: the recognized tag set and its patterns
//! - **codec**: markup to display spans, fallback rules, HTML rendering
//! - **cache**: TTL-bounded LRU for annotation results
//!
//! The codec is total: malformed or unknown markup is preserved as literal
//! text, never rejected. A bad annotation can degrade the view but cannot
//! lose content.

pub mod cache;
pub mod codec;
pub mod tags;

// Re-exports
pub use cache::{AnnotationCache, AnnotationKey};
pub use codec::{
    display_content, has_annotations, plain_display, to_display_form, DisplayFragment, DisplaySpan,
};
pub use tags::HighlightTag;
