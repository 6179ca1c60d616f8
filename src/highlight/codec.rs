//! Codec between annotated markup and renderer-facing display spans
//!
//! Markup is plain text with recognized category tags wrapped around spans.
//! The codec never alters literal text: decoding produces an ordered span list
//! whose concatenated text reconstructs the input minus the tag markers.
//! Malformed or unknown markup is preserved as literal text rather than
//! rejected.

use crate::highlight::tags::{open_tag_pattern, tag_pair_pattern, HighlightTag};
use crate::types::ContentItem;
use serde::{Deserialize, Serialize};

/// One element of a decoded display fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DisplaySpan {
    /// Literal text, exactly as authored
    Text { text: String },

    /// Text wrapped by a recognized category tag
    Highlighted { tag: HighlightTag, text: String },

    /// An explicit line break (a newline in the source)
    LineBreak,
}

/// Ordered span list a renderer can walk without further parsing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFragment {
    pub spans: Vec<DisplaySpan>,
}

impl DisplayFragment {
    /// Reconstruct the literal text carried by this fragment
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                DisplaySpan::Text { text } => out.push_str(text),
                DisplaySpan::Highlighted { text, .. } => out.push_str(text),
                DisplaySpan::LineBreak => out.push('\n'),
            }
        }
        out
    }

    /// Whether any span carries a category tag
    pub fn has_highlighted_spans(&self) -> bool {
        self.spans
            .iter()
            .any(|span| matches!(span, DisplaySpan::Highlighted { .. }))
    }

    /// Render as HTML with one span element per highlighted run
    ///
    /// Convenience for HTML consumers; the span list is the contract.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                DisplaySpan::Text { text } => out.push_str(&escape_html(text)),
                DisplaySpan::Highlighted { tag, text } => {
                    out.push_str(&format!(
                        "<span class=\"hl-{}\" title=\"{}\">{}</span>",
                        tag.as_str(),
                        tag.label(),
                        escape_html(text)
                    ));
                }
                DisplaySpan::LineBreak => out.push_str("<br/>"),
            }
        }
        out
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Whether markup contains at least one recognized category tag
///
/// Matches open tags only, case-insensitive. Unknown tags never count.
pub fn has_annotations(markup: &str) -> bool {
    open_tag_pattern().is_match(markup)
}

/// Decode annotated markup into display spans
///
/// Walks well-formed tag pairs left to right, emitting literal text for the
/// gaps between them. Anything that is not a well-formed pair of a recognized
/// tag stays literal text.
pub fn to_display_form(markup: &str) -> DisplayFragment {
    let mut spans = Vec::new();
    let mut last_end = 0;

    for cap in tag_pair_pattern().captures_iter(markup) {
        let full = cap.get(0).unwrap();

        // Raw text between the previous match and this tag
        if full.start() > last_end {
            push_text(&mut spans, &markup[last_end..full.start()], None);
        }

        // Exactly one branch group is set; its index names the tag
        for (idx, tag) in HighlightTag::ALL.iter().enumerate() {
            if let Some(inner) = cap.get(idx + 1) {
                push_text(&mut spans, inner.as_str(), Some(*tag));
                break;
            }
        }

        last_end = full.end();
    }

    if last_end < markup.len() {
        push_text(&mut spans, &markup[last_end..], None);
    }

    DisplayFragment { spans }
}

/// Fallback display path: newline to line break only, no tag processing
pub fn plain_display(raw: &str) -> DisplayFragment {
    let mut spans = Vec::new();
    push_text(&mut spans, raw, None);
    DisplayFragment { spans }
}

/// The display decision for a content item
///
/// The annotated view is used only when highlights are enabled, markup is
/// present, and the markup actually contains recognized tags. Every other
/// combination falls back to the plain raw content.
pub fn display_content(item: &ContentItem, highlights_enabled: bool) -> DisplayFragment {
    if highlights_enabled {
        if let Some(markup) = item.highlighted_markup.as_deref() {
            if has_annotations(markup) {
                return to_display_form(markup);
            }
        }
    }
    plain_display(&item.raw_content)
}

/// Split text on newlines into spans, tagging each text run if requested
fn push_text(spans: &mut Vec<DisplaySpan>, text: &str, tag: Option<HighlightTag>) {
    for (i, part) in text.split('\n').enumerate() {
        if i > 0 {
            spans.push(DisplaySpan::LineBreak);
        }
        if part.is_empty() {
            continue;
        }
        match tag {
            Some(tag) => spans.push(DisplaySpan::Highlighted {
                tag,
                text: part.to_string(),
            }),
            None => spans.push(DisplaySpan::Text {
                text: part.to_string(),
            }),
        }
    }
}
