//! Annotation service
//!
//! Sends content to the agent together with the closed tag vocabulary and any
//! guidance entities, and returns highlight markup. Results are cached by
//! content and context so a repeated request skips the API round-trip.

use crate::error::Result;
use crate::highlight::{AnnotationCache, AnnotationKey, HighlightTag};
use crate::services::agent::{context_lines, extract_json, CompletionBackend};
use crate::types::AnnotationContext;
use std::sync::Arc;
use tracing::debug;

/// Produces highlight markup for content items
pub struct AnnotatorService {
    backend: Arc<dyn CompletionBackend>,
    cache: AnnotationCache,
}

impl AnnotatorService {
    /// Create an annotator with the default cache
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            cache: AnnotationCache::default(),
        }
    }

    /// Create an annotator with a custom cache
    pub fn with_cache(backend: Arc<dyn CompletionBackend>, cache: AnnotationCache) -> Self {
        Self { backend, cache }
    }

    /// Annotate content, returning markup over the unchanged text
    ///
    /// The markup is the content with recognized tags added; whether it
    /// actually contains any tags is the status machine's concern, not ours.
    pub async fn annotate(&self, content: &str, context: &AnnotationContext) -> Result<String> {
        let key = AnnotationKey::from_request(content, context);
        if let Some(markup) = self.cache.get(&key) {
            debug!("Annotation cache hit");
            return Ok(markup);
        }

        let prompt = annotation_prompt(content, context);
        let response = self.backend.complete(&prompt).await?;
        // Agents sometimes fence markup the way they fence JSON
        let markup = extract_json(&response).to_string();

        self.cache.insert(key, markup.clone());
        Ok(markup)
    }

    /// Number of cached annotation results
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }
}

/// Build the annotation prompt for a piece of content
pub fn annotation_prompt(content: &str, context: &AnnotationContext) -> String {
    let mut tag_list = String::new();
    for tag in HighlightTag::ALL {
        tag_list.push_str(&format!(
            "- <{0}>...</{0}>: {1}\n",
            tag.as_str(),
            tag.guidance()
        ));
    }

    let mut prompt = format!(
        r#"You are annotating outbound marketing content with semantic highlight tags.

Wrap meaningful spans with exactly these XML-style tags:
{}"#,
        tag_list
    );

    if !context.is_empty() {
        prompt.push_str("\nEntities known for this content:\n");
        prompt.push_str(&context_lines(context));
    }

    prompt.push_str(&format!(
        r#"
Rules:
- Return the content exactly as given, adding only tags
- Never rewrite, reorder, or summarize the text
- Never nest one tag inside another
- Tag only spans that clearly match a category
- If nothing matches, return the content unchanged

Example:
Input: Book a demo today and see how TechCorp helps IT leaders cut release delays.
Output: <cta>Book a demo today</cta> and see how <personalized>TechCorp</personalized> helps <persona>IT leaders</persona> <outcome>cut release delays</outcome>.

Content to annotate:
{}"#,
        content
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedBackend {
        response: String,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    fn ctx(personas: &[&str]) -> AnnotationContext {
        AnnotationContext {
            personas: personas.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_annotate_returns_markup() {
        let backend = ScriptedBackend::new("<cta>Book a demo</cta> with us");
        let annotator = AnnotatorService::new(backend);

        let markup = annotator
            .annotate("Book a demo with us", &AnnotationContext::default())
            .await
            .unwrap();
        assert_eq!(markup, "<cta>Book a demo</cta> with us");
    }

    #[tokio::test]
    async fn test_prompt_carries_content_and_context() {
        let backend = ScriptedBackend::new("irrelevant");
        let annotator = AnnotatorService::new(backend.clone());

        annotator
            .annotate("Meet our VP of Engineering", &ctx(&["VP of Engineering"]))
            .await
            .unwrap();

        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].contains("Meet our VP of Engineering"));
        assert!(prompts[0].contains("Personas: VP of Engineering"));
        assert!(prompts[0].contains("<persona>...</persona>"));
        assert!(prompts[0].contains("<personalized>...</personalized>"));
    }

    #[tokio::test]
    async fn test_cache_short_circuits_repeat_requests() {
        let backend = ScriptedBackend::new("<cta>Go</cta>");
        let annotator = AnnotatorService::new(backend.clone());
        let context = ctx(&["VP"]);

        annotator.annotate("Go", &context).await.unwrap();
        annotator.annotate("Go", &context).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(annotator.cached_results(), 1);
    }

    #[tokio::test]
    async fn test_different_context_misses_cache() {
        let backend = ScriptedBackend::new("<cta>Go</cta>");
        let annotator = AnnotatorService::new(backend.clone());

        annotator.annotate("Go", &ctx(&["VP"])).await.unwrap();
        annotator.annotate("Go", &ctx(&["CTO"])).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fenced_response_is_cleaned() {
        let backend = ScriptedBackend::new("```\n<cta>Go</cta> now\n```");
        let annotator = AnnotatorService::new(backend);

        let markup = annotator
            .annotate("Go now", &AnnotationContext::default())
            .await
            .unwrap();
        assert_eq!(markup, "<cta>Go</cta> now");
    }
}
